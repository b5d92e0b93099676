use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use futures_util::FutureExt;
use tracing::{error, info, info_span, warn, Instrument};

use crate::acquisition::AudioSource;
use crate::db::DatabaseError;
use crate::error::JobError;
use crate::jobs::{Job, JobId, JobRepository, JobStatus, Transcript};
use crate::pipeline::Pipeline;

const RESULT_NOT_STORED_MESSAGE: &str =
    "The transcription finished but its result could not be saved";

/// Drives one persisted job from `pending` to a terminal state.
#[derive(Clone)]
pub struct JobExecutor {
    repo: Arc<dyn JobRepository>,
    pipeline: Arc<Pipeline>,
}

impl JobExecutor {
    pub fn new(repo: Arc<dyn JobRepository>, pipeline: Arc<Pipeline>) -> Self {
        Self { repo, pipeline }
    }

    /// Runs the job and records its outcome. Returns the terminal status,
    /// or `None` when there was nothing to run.
    ///
    /// Any failure after pickup, including a result that cannot be stored,
    /// ends as `failed`. Only storage errors that prevent recording any
    /// outcome are returned.
    pub async fn execute(&self, id: &JobId) -> Result<Option<JobStatus>, DatabaseError> {
        let Some(job) = self.repo.get(id).await? else {
            warn!(job_id = %id, "Queued job no longer exists");
            return Ok(None);
        };
        if job.status != JobStatus::Pending {
            warn!(job_id = %id, status = %job.status, "Skipping job that is not pending");
            return Ok(None);
        }

        let span = info_span!("job", job_id = %id, source = %job.source.redacted());
        self.run_job(id, job).instrument(span).await
    }

    async fn run_job(&self, id: &JobId, job: Job) -> Result<Option<JobStatus>, DatabaseError> {
        self.repo.mark_processing(id).await?;
        info!("Job processing");

        let outcome = match AssertUnwindSafe(self.run_pipeline(&job)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => {
                let detail = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!("Job execution panicked: {}", detail);
                Err(JobError::internal("Unexpected error while processing the job"))
            }
        };

        match outcome {
            Ok(transcript) => match self.repo.complete(id, &transcript, Utc::now()).await {
                Ok(()) => {
                    info!(
                        processing_time = transcript.processing_time,
                        "Job completed"
                    );
                    Ok(Some(JobStatus::Completed))
                }
                Err(e) => {
                    error!("Could not store job result: {}", e);
                    self.record_failure(id, JobError::internal(RESULT_NOT_STORED_MESSAGE))
                        .await
                }
            },
            Err(e) => self.record_failure(id, e).await,
        }
    }

    async fn record_failure(
        &self,
        id: &JobId,
        e: JobError,
    ) -> Result<Option<JobStatus>, DatabaseError> {
        self.repo.fail(id, &e, Utc::now()).await?;
        warn!(kind = e.kind.as_str(), "Job failed: {}", e);
        Ok(Some(JobStatus::Failed))
    }

    async fn run_pipeline(&self, job: &Job) -> Result<Transcript, JobError> {
        let source = AudioSource::from_job_source(&job.source)?;
        self.pipeline.run(&source, job.requested_language).await
    }
}
