//! Command-line interface for the `dawt` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Transcribe audio with dialect detection and translation enhancement
#[derive(Parser, Debug)]
#[command(name = "dawt", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Transcribe a URL or local file and print the result. Nothing is stored.
    Transcribe {
        /// Remote media URL
        #[arg(long, value_name = "URL")]
        url: Option<String>,

        /// Local audio file
        #[arg(long, value_name = "PATH")]
        path: Option<PathBuf>,

        #[arg(long, short, value_name = "LANG", default_value = "en")]
        language: String,
    },

    /// Queue a remote source and print its job id
    Submit {
        url: String,

        #[arg(long, short, value_name = "LANG", default_value = "en")]
        language: String,

        /// Poll until the job finishes and print its result
        #[arg(long)]
        wait: bool,

        #[arg(long, value_name = "MS", default_value = "1000")]
        poll_interval_ms: u64,
    },

    /// Print a job's status
    Status { job_id: String },

    /// Print a job's result, error or in-progress state
    Results { job_id: String },

    /// Record a correction for a completed job
    Correct {
        job_id: String,

        /// Corrected full text
        #[arg(long)]
        text: String,

        /// JSON array of `{start, end, text}` segments
        #[arg(long, value_name = "JSON")]
        segments: String,
    },

    /// Print training pairs from every corrected job
    Export,

    /// List recent jobs, newest first
    Jobs {
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Manage the session credential used for authenticated sources
    Credential {
        #[command(subcommand)]
        action: CredentialAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum CredentialAction {
    /// Store a new credential, replacing the active one. Reads the token
    /// from stdin unless `--token-env` names a variable holding it.
    Set {
        #[arg(long, value_name = "VAR")]
        token_env: Option<String>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Show whether a credential is active. Never prints the token.
    Status,

    /// Deactivate the stored credential
    Clear,
}
