use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use secrecy::SecretString;
use tracing::{info, info_span, warn, Instrument};

use super::executor::JobExecutor;
use super::export::training_pairs;
use super::pool::WorkerPool;
use crate::acquisition::{Acquirer, AudioSource, YtDlpFetcher};
use crate::config::Config;
use crate::credentials::{CredentialError, CredentialStatus, CredentialStore};
use crate::db::Database;
use crate::engine::{speech_to_text_from_config, translator_from_config, SpeechToText, Translator};
use crate::error::{DawtError, JobError, Result};
use crate::jobs::{
    Correction, Job, JobId, JobOutcome, JobRepository, JobSource, JobStatusView, Segment,
    SqliteJobRepository, TrainingPair, Transcript,
};
use crate::language::Language;
use crate::pipeline::Pipeline;
use crate::secrets::{SecretError, TokenEncryptor, TOKEN_KEY_ENV_VAR};

/// Input of the synchronous path. A URL wins over a path when both are set.
#[derive(Debug, Clone, Default)]
pub struct TranscribeRequest {
    pub url: Option<String>,
    pub path: Option<PathBuf>,
    pub language: Option<String>,
}

impl TranscribeRequest {
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    fn source(&self) -> std::result::Result<JobSource, JobError> {
        match (&self.url, &self.path) {
            (Some(url), _) if !url.trim().is_empty() => Ok(JobSource::Remote(url.clone())),
            (_, Some(path)) if !path.as_os_str().is_empty() => Ok(JobSource::Local(path.clone())),
            _ => Err(JobError::missing_input()),
        }
    }
}

/// Entry point for every caller-facing operation.
pub struct TranscriptionService {
    repo: Arc<dyn JobRepository>,
    pipeline: Arc<Pipeline>,
    pool: WorkerPool,
    credentials: Option<CredentialStore>,
}

impl TranscriptionService {
    /// Wires the service from its parts and starts the worker pool. Must be
    /// called inside a tokio runtime.
    pub fn new(
        repo: Arc<dyn JobRepository>,
        pipeline: Arc<Pipeline>,
        credentials: Option<CredentialStore>,
        worker_count: usize,
        queue_capacity: usize,
    ) -> Self {
        let executor = JobExecutor::new(Arc::clone(&repo), Arc::clone(&pipeline));
        let pool = WorkerPool::start(executor, worker_count.max(1), queue_capacity.max(1));
        Self {
            repo,
            pipeline,
            pool,
            credentials,
        }
    }

    /// Production wiring: SQLite store, yt-dlp acquisition and HTTP engines.
    pub fn from_config(config: &Config) -> Result<Self> {
        let db = Database::open(&config.resolved_database_path())?;

        let credentials = match TokenEncryptor::from_env() {
            Ok(encryptor) => Some(CredentialStore::new(db.clone(), encryptor)),
            Err(e) => {
                warn!("Credential store disabled: {}", e);
                None
            }
        };

        let fetcher = Arc::new(YtDlpFetcher::new(&config.acquisition.yt_dlp_path));
        let mut acquirer = Acquirer::new(fetcher, config.acquisition.clone())?;
        if let Some(store) = &credentials {
            acquirer = acquirer.with_credentials(store.clone());
        }

        let stt: Arc<dyn SpeechToText> = Arc::new(speech_to_text_from_config(&config.transcription));
        let translator = translator_from_config(&config.translation)
            .map(|t| Arc::new(t) as Arc<dyn Translator>);
        let pipeline = Arc::new(Pipeline::new(Arc::new(acquirer), stt, translator));

        Ok(Self::new(
            Arc::new(SqliteJobRepository::new(db)),
            pipeline,
            credentials,
            config.worker_count,
            config.queue_capacity,
        ))
    }

    /// Validates and persists a `pending` job, then queues it.
    ///
    /// The queue slot is claimed before the record is written, so a job
    /// that exists as `pending` always has a worker coming for it.
    pub async fn submit(&self, source: &str, language: &str) -> Result<JobId> {
        let language = Language::parse_requested(language)?;
        let url = AudioSource::parse_remote(source)?;
        let slot = self.pool.reserve().await?;

        let job = Job::new_pending(JobSource::Remote(url.to_string()), language);
        let id = job.id.clone();
        self.repo.create(&job).await?;
        info!(job_id = %id, source = %job.source.redacted(), language = %language, "Job submitted");

        slot.send(id.clone());
        Ok(id)
    }

    pub async fn status(&self, id: &JobId) -> Result<JobStatusView> {
        let job = self.find(id).await?;
        Ok(JobStatusView::from(&job))
    }

    pub async fn results(&self, id: &JobId) -> Result<JobOutcome> {
        let job = self.find(id).await?;
        Ok(JobOutcome::from_job(job))
    }

    /// Runs the pipeline inline. Nothing is persisted.
    pub async fn transcribe_sync(&self, request: &TranscribeRequest) -> Result<Transcript> {
        let language = match &request.language {
            Some(value) => Language::parse_requested(value)?,
            None => Language::default(),
        };
        let source = AudioSource::from_job_source(&request.source()?)?;

        let span = info_span!("transcribe_sync", language = %language);
        let transcript = self.pipeline.run(&source, language).instrument(span).await?;
        Ok(transcript)
    }

    /// Overwrites the correction slot of a completed job.
    pub async fn record_correction(
        &self,
        id: &JobId,
        text: &str,
        segments: Vec<Segment>,
    ) -> Result<()> {
        let job = self.find(id).await?;
        if job.result.is_none() {
            return Err(DawtError::NotCompleted(id.to_string()));
        }

        let correction = Correction {
            text: text.to_string(),
            segments,
            corrected_at: Utc::now(),
        };
        if !self.repo.set_correction(id, &correction).await? {
            return Err(DawtError::NotCompleted(id.to_string()));
        }
        info!(job_id = %id, segments = correction.segments.len(), "Correction recorded");
        Ok(())
    }

    pub async fn export_training_pairs(&self) -> Result<Vec<TrainingPair>> {
        let jobs = self.repo.list_corrected().await?;
        Ok(jobs.iter().flat_map(training_pairs).collect())
    }

    /// Most recent jobs, newest first.
    pub async fn list_jobs(&self, limit: usize) -> Result<Vec<JobStatusView>> {
        let jobs = self.repo.list_recent(limit).await?;
        Ok(jobs.iter().map(JobStatusView::from).collect())
    }

    pub async fn set_credential(&self, token: SecretString, notes: Option<String>) -> Result<()> {
        let store = self.credential_store()?;
        run_credential_op(move || store.set_active(&token, notes.as_deref())).await
    }

    pub async fn credential_status(&self) -> Result<CredentialStatus> {
        let store = self.credential_store()?;
        run_credential_op(move || store.status()).await
    }

    pub async fn clear_credential(&self) -> Result<()> {
        let store = self.credential_store()?;
        run_credential_op(move || store.clear()).await
    }

    /// Stops accepting jobs and waits for queued ones to finish.
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }

    async fn find(&self, id: &JobId) -> Result<Job> {
        self.repo
            .get(id)
            .await?
            .ok_or_else(|| DawtError::NotFound(id.to_string()))
    }

    fn credential_store(&self) -> Result<CredentialStore> {
        self.credentials.clone().ok_or_else(|| {
            CredentialError::Secret(SecretError::InvalidKey(format!(
                "Environment variable {} not set",
                TOKEN_KEY_ENV_VAR
            )))
            .into()
        })
    }
}

async fn run_credential_op<T, F>(op: F) -> Result<T>
where
    F: FnOnce() -> std::result::Result<T, CredentialError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| JobError::internal(format!("Credential task failed: {}", e)))?
        .map_err(DawtError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_request_prefers_url() {
        let request = TranscribeRequest {
            url: Some("https://example.com/a".into()),
            path: Some("/tmp/a.wav".into()),
            language: None,
        };
        assert!(matches!(request.source(), Ok(JobSource::Remote(_))));
    }

    #[test]
    fn test_request_falls_back_to_path_when_url_blank() {
        let request = TranscribeRequest {
            url: Some("  ".into()),
            path: Some("/tmp/a.wav".into()),
            language: None,
        };
        assert!(matches!(request.source(), Ok(JobSource::Local(_))));
    }

    #[test]
    fn test_empty_request_is_missing_input() {
        let err = TranscribeRequest::default().source().unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingInput);
    }
}
