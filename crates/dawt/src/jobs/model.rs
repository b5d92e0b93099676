use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use super::transcript::{Correction, Transcript};
use crate::error::JobError;
use crate::language::Language;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a job.
///
/// `Pending -> Processing -> (Completed | Failed)`; terminal states never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(format!("Invalid job status: {}", s)),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the audio comes from. Exactly one of URL or local path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum JobSource {
    Remote(String),
    Local(PathBuf),
}

impl JobSource {
    pub fn url(&self) -> Option<&str> {
        match self {
            JobSource::Remote(url) => Some(url),
            JobSource::Local(_) => None,
        }
    }

    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            JobSource::Remote(_) => None,
            JobSource::Local(path) => Some(path),
        }
    }

    /// Loggable form with secrets and directories stripped.
    pub fn redacted(&self) -> String {
        match self {
            JobSource::Remote(url) => crate::sanitize::redact_url(url),
            JobSource::Local(path) => crate::sanitize::redact_path(path),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub source: JobSource,
    pub requested_language: Language,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Transcript>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correction: Option<Correction>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new_pending(source: JobSource, requested_language: Language) -> Self {
        Self {
            id: JobId::new(),
            source,
            requested_language,
            status: JobStatus::Pending,
            result: None,
            error: None,
            correction: None,
            // Microsecond precision survives a storage round trip.
            created_at: Utc::now().trunc_subsecs(6),
            completed_at: None,
        }
    }

    /// Checks the record-level invariants: result/error exclusivity, each
    /// implying its terminal status, and `completed_at` set iff terminal.
    pub fn is_consistent(&self) -> bool {
        let shape_ok = match self.status {
            JobStatus::Pending | JobStatus::Processing => {
                self.result.is_none() && self.error.is_none()
            }
            JobStatus::Completed => self.result.is_some() && self.error.is_none(),
            JobStatus::Failed => self.result.is_none() && self.error.is_some(),
        };
        shape_ok && self.completed_at.is_some() == self.status.is_terminal()
    }

    /// Wall time spent processing, available once terminal.
    pub fn processing_time(&self) -> Option<f64> {
        if let Some(result) = &self.result {
            return Some(result.processing_time);
        }
        self.completed_at
            .map(|done| (done - self.created_at).num_milliseconds() as f64 / 1000.0)
    }
}

/// Lightweight status view returned by polling.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusView {
    pub job_id: JobId,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<f64>,
}

impl From<&Job> for JobStatusView {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id.clone(),
            status: job.status,
            created_at: job.created_at,
            completed_at: job.completed_at,
            processing_time: job.processing_time(),
        }
    }
}

/// What a results query yields. Never a half-populated result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobOutcome {
    InProgress { status: JobStatus },
    Completed { job: Box<Job> },
    Failed { error: JobError },
}

impl JobOutcome {
    pub fn from_job(job: Job) -> Self {
        match job.status {
            JobStatus::Pending | JobStatus::Processing => JobOutcome::InProgress { status: job.status },
            JobStatus::Completed => JobOutcome::Completed { job: Box::new(job) },
            JobStatus::Failed => JobOutcome::Failed {
                error: job
                    .error
                    .unwrap_or_else(|| JobError::internal("Job failed without a recorded error")),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn remote() -> JobSource {
        JobSource::Remote("https://example.com/clip".to_string())
    }

    #[test]
    fn test_transition_rules() {
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Processing));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Completed));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Failed));

        assert!(!JobStatus::Pending.can_transition_to(JobStatus::Completed));
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Failed));
        assert!(!JobStatus::Failed.can_transition_to(JobStatus::Processing));
        assert!(!JobStatus::Processing.can_transition_to(JobStatus::Processing));
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert!("cancelled".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_new_pending_job_is_consistent() {
        let job = Job::new_pending(remote(), Language::En);
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.is_consistent());
        assert!(job.processing_time().is_none());
    }

    #[test]
    fn test_inconsistent_shapes_detected() {
        let mut job = Job::new_pending(remote(), Language::En);
        job.status = JobStatus::Failed;
        assert!(!job.is_consistent());

        job.error = Some(JobError::new(ErrorKind::DownloadFailed, "nope"));
        job.completed_at = Some(Utc::now());
        assert!(job.is_consistent());
    }

    #[test]
    fn test_outcome_for_in_progress_has_no_data() {
        let job = Job::new_pending(remote(), Language::En);
        assert_eq!(
            JobOutcome::from_job(job),
            JobOutcome::InProgress {
                status: JobStatus::Pending
            }
        );
    }

    #[test]
    fn test_source_redaction() {
        let source = JobSource::Remote("https://user:pw@example.com/v?token=1".to_string());
        assert_eq!(source.redacted(), "https://example.com/v");
        let local = JobSource::Local(PathBuf::from("/home/me/audio/clip.mp3"));
        assert_eq!(local.redacted(), "clip.mp3");
    }
}
