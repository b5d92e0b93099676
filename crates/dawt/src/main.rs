use std::io::{BufRead, Write};
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use secrecy::SecretString;
use serde::Serialize;
use serde_json::json;

use dawt::cli::{Cli, Commands, CredentialAction};
use dawt::jobs::JobOutcome;
use dawt::logging::init_logging;
use dawt::{
    load_config, Config, DawtError, JobError, JobId, Segment, TranscribeRequest,
    TranscriptionService,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => return report(&e),
    };
    if let Err(e) = init_logging(&config.logging) {
        eprintln!("warning: {}", e);
    }

    let service = match TranscriptionService::from_config(&config) {
        Ok(service) => service,
        Err(e) => return report(&e),
    };

    let outcome = run(&service, cli.command).await;
    service.shutdown().await;

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report(&e),
    }
}

fn load(path: Option<&Path>) -> Result<Config, DawtError> {
    match path {
        Some(path) => Ok(load_config(path)?),
        None => Ok(Config::default()),
    }
}

async fn run(service: &TranscriptionService, command: Commands) -> Result<(), DawtError> {
    match command {
        Commands::Transcribe { url, path, language } => {
            let request = TranscribeRequest {
                url,
                path,
                language: Some(language),
            };
            print_json(&service.transcribe_sync(&request).await?)
        }
        Commands::Submit {
            url,
            language,
            wait,
            poll_interval_ms,
        } => {
            let id = service.submit(&url, &language).await?;
            print_json(&json!({ "jobId": id }))?;
            if wait {
                let outcome = wait_for(service, &id, Duration::from_millis(poll_interval_ms)).await?;
                print_json(&outcome)?;
            }
            Ok(())
        }
        Commands::Status { job_id } => print_json(&service.status(&JobId::from(job_id)).await?),
        Commands::Results { job_id } => print_json(&service.results(&JobId::from(job_id)).await?),
        Commands::Correct {
            job_id,
            text,
            segments,
        } => {
            let segments: Vec<Segment> = serde_json::from_str(&segments).map_err(|e| {
                JobError::new(
                    dawt::ErrorKind::MissingInput,
                    format!("Segments must be a JSON array: {}", e),
                )
            })?;
            service
                .record_correction(&JobId::from(job_id), &text, segments)
                .await?;
            print_json(&json!({ "ok": true }))
        }
        Commands::Export => print_json(&service.export_training_pairs().await?),
        Commands::Jobs { limit } => print_json(&service.list_jobs(limit).await?),
        Commands::Credential { action } => match action {
            CredentialAction::Set { token_env, notes } => {
                let token = read_token(token_env.as_deref())?;
                service.set_credential(token, notes).await?;
                print_json(&json!({ "ok": true }))
            }
            CredentialAction::Status => print_json(&service.credential_status().await?),
            CredentialAction::Clear => {
                service.clear_credential().await?;
                print_json(&json!({ "ok": true }))
            }
        },
    }
}

async fn wait_for(
    service: &TranscriptionService,
    id: &JobId,
    interval: Duration,
) -> Result<JobOutcome, DawtError> {
    loop {
        match service.results(id).await? {
            JobOutcome::InProgress { .. } => tokio::time::sleep(interval).await,
            terminal => return Ok(terminal),
        }
    }
}

fn read_token(env_var: Option<&str>) -> Result<SecretString, DawtError> {
    let value = match env_var {
        Some(name) => std::env::var(name).map_err(|_| {
            JobError::new(
                dawt::ErrorKind::MissingInput,
                format!("Environment variable {} not set", name),
            )
        })?,
        None => {
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            line
        }
    };
    let value = value.trim();
    if value.is_empty() {
        return Err(JobError::new(dawt::ErrorKind::MissingInput, "Empty credential").into());
    }
    Ok(SecretString::from(value.to_string()))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), DawtError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|e| JobError::internal(format!("Cannot render output: {}", e)))?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", rendered)?;
    stdout.flush()?;
    Ok(())
}

fn report(error: &DawtError) -> ExitCode {
    let body = json!({
        "error": { "kind": error.kind().as_str(), "message": error.to_string() }
    });
    eprintln!("{}", body);
    ExitCode::FAILURE
}
