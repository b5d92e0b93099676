use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of every failure a caller can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MissingInput,
    InvalidSource,
    InvalidLanguage,
    DownloadFailed,
    TooLong,
    AuthRequired,
    RateLimited,
    ContentRestricted,
    CredentialInvalid,
    NotAccessible,
    TranscriptionFailed,
    TranslationFailed,
    NotFound,
    NotCompleted,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MissingInput => "missing_input",
            ErrorKind::InvalidSource => "invalid_source",
            ErrorKind::InvalidLanguage => "invalid_language",
            ErrorKind::DownloadFailed => "download_failed",
            ErrorKind::TooLong => "too_long",
            ErrorKind::AuthRequired => "auth_required",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::ContentRestricted => "content_restricted",
            ErrorKind::CredentialInvalid => "credential_invalid",
            ErrorKind::NotAccessible => "not_accessible",
            ErrorKind::TranscriptionFailed => "transcription_failed",
            ErrorKind::TranslationFailed => "translation_failed",
            ErrorKind::NotFound => "not_found",
            ErrorKind::NotCompleted => "not_completed",
            ErrorKind::Internal => "internal",
        }
    }
}

impl FromStr for ErrorKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "missing_input" => Ok(ErrorKind::MissingInput),
            "invalid_source" => Ok(ErrorKind::InvalidSource),
            "invalid_language" => Ok(ErrorKind::InvalidLanguage),
            "download_failed" => Ok(ErrorKind::DownloadFailed),
            "too_long" => Ok(ErrorKind::TooLong),
            "auth_required" => Ok(ErrorKind::AuthRequired),
            "rate_limited" => Ok(ErrorKind::RateLimited),
            "content_restricted" => Ok(ErrorKind::ContentRestricted),
            "credential_invalid" => Ok(ErrorKind::CredentialInvalid),
            "not_accessible" => Ok(ErrorKind::NotAccessible),
            "transcription_failed" => Ok(ErrorKind::TranscriptionFailed),
            "translation_failed" => Ok(ErrorKind::TranslationFailed),
            "not_found" => Ok(ErrorKind::NotFound),
            "not_completed" => Ok(ErrorKind::NotCompleted),
            "internal" => Ok(ErrorKind::Internal),
            other => Err(format!("Invalid error kind: {}", other)),
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified, user-facing failure. This is what gets recorded on a
/// failed job and returned from the synchronous path.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message}")]
pub struct JobError {
    pub kind: ErrorKind,
    pub message: String,
}

impl JobError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn missing_input() -> Self {
        Self::new(
            ErrorKind::MissingInput,
            "Provide a source URL or a local file path",
        )
    }

    pub fn invalid_language(value: &str) -> Self {
        Self::new(
            ErrorKind::InvalidLanguage,
            format!("Unsupported language '{}'", value),
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Worker queue closed")]
    ChannelClosed,

    #[error("Worker pool is shutting down")]
    ShuttingDown,
}

#[derive(Error, Debug)]
pub enum DawtError {
    #[error(transparent)]
    Job(#[from] JobError),

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job {0} has no stored result")]
    NotCompleted(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Credential error: {0}")]
    Credential(#[from] crate::credentials::CredentialError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DawtError {
    /// Maps any failure onto the caller-facing taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DawtError::Job(e) => e.kind,
            DawtError::NotFound(_) => ErrorKind::NotFound,
            DawtError::NotCompleted(_) => ErrorKind::NotCompleted,
            DawtError::Credential(crate::credentials::CredentialError::Secret(_)) => {
                ErrorKind::CredentialInvalid
            }
            DawtError::Config(_)
            | DawtError::Database(_)
            | DawtError::Credential(_)
            | DawtError::Worker(_)
            | DawtError::Io(_) => ErrorKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, DawtError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_string_roundtrip() {
        for kind in [
            ErrorKind::MissingInput,
            ErrorKind::TooLong,
            ErrorKind::RateLimited,
            ErrorKind::TranslationFailed,
            ErrorKind::Internal,
        ] {
            assert_eq!(kind.as_str().parse::<ErrorKind>().unwrap(), kind);
        }
        assert!("bogus".parse::<ErrorKind>().is_err());
    }

    #[test]
    fn test_job_error_display_is_message() {
        let err = JobError::new(ErrorKind::TooLong, "Video is too long");
        assert_eq!(err.to_string(), "Video is too long");
    }

    #[test]
    fn test_dawt_error_kind_mapping() {
        assert_eq!(
            DawtError::NotFound("x".to_string()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            DawtError::from(JobError::invalid_language("klingon")).kind(),
            ErrorKind::InvalidLanguage
        );
        assert_eq!(
            DawtError::Worker(WorkerError::ChannelClosed).kind(),
            ErrorKind::Internal
        );
    }
}
