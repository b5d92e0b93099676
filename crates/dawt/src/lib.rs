pub mod acquisition;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod db;
pub mod engine;
pub mod error;
pub mod jobs;
pub mod language;
pub mod logging;
pub mod orchestrator;
pub mod pipeline;
pub mod sanitize;
pub mod secrets;

pub use config::{load_config, load_config_from_str, Config};
pub use credentials::{CredentialStatus, CredentialStore};
pub use error::{DawtError, ErrorKind, JobError, Result, WorkerError};
pub use jobs::{
    Job, JobId, JobOutcome, JobRepository, JobSource, JobStatus, JobStatusView, Segment,
    TrainingPair, Transcript,
};
pub use language::Language;
pub use orchestrator::{TranscribeRequest, TranscriptionService};
pub use pipeline::Pipeline;
pub use secrets::{resolve_secret, resolve_secret_optional, SecretError, TokenEncryptor};
