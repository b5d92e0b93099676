//! Turns a job source into audio on local disk.
//!
//! Remote sources go through a [`MediaFetcher`] with bounded, backed-off
//! retries and a duration ceiling checked before any download. Everything
//! downloaded lands in a process-scoped scratch directory, one
//! subdirectory per acquisition, released by [`AcquiredAudio`] on drop.

mod cookies;
pub mod error;
mod fetcher;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use tempfile::TempDir;

pub use cookies::{CookieJar, SessionAuth};
pub use error::{classify, FailureClass, FetchError};
pub use fetcher::{MediaFetcher, MediaInfo, YtDlpFetcher};

use crate::config::AcquisitionConfig;
use crate::credentials::CredentialStore;
use crate::error::{ErrorKind, JobError};
use crate::jobs::JobSource;

/// A validated source reference.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioSource {
    Remote(Url),
    Local(PathBuf),
}

impl AudioSource {
    /// Validates a caller-supplied URL: non-empty, parseable, http(s).
    pub fn parse_remote(raw: &str) -> Result<Url, JobError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(JobError::missing_input());
        }
        let url = Url::parse(raw).map_err(|e| {
            JobError::new(ErrorKind::InvalidSource, format!("Malformed source URL: {}", e))
        })?;
        match url.scheme() {
            "http" | "https" if url.host_str().is_some() => Ok(url),
            scheme => Err(JobError::new(
                ErrorKind::InvalidSource,
                format!("Unsupported source URL scheme '{}'", scheme),
            )),
        }
    }

    pub fn from_job_source(source: &JobSource) -> Result<Self, JobError> {
        match source {
            JobSource::Remote(url) => Self::parse_remote(url).map(AudioSource::Remote),
            JobSource::Local(path) if path.as_os_str().is_empty() => {
                Err(JobError::missing_input())
            }
            JobSource::Local(path) => Ok(AudioSource::Local(path.clone())),
        }
    }
}

/// Audio ready for transcription.
///
/// For downloads, owns the per-acquisition directory and deletes it on
/// drop. Caller-supplied local files are never touched.
#[derive(Debug)]
pub struct AcquiredAudio {
    path: PathBuf,
    scratch: Option<PathBuf>,
}

impl AcquiredAudio {
    fn local(path: PathBuf) -> Self {
        Self {
            path,
            scratch: None,
        }
    }

    fn downloaded(path: PathBuf, scratch: PathBuf) -> Self {
        Self {
            path,
            scratch: Some(scratch),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for AcquiredAudio {
    fn drop(&mut self) {
        if let Some(dir) = self.scratch.take() {
            match std::fs::remove_dir_all(&dir) {
                Ok(()) => tracing::debug!("Released acquisition scratch directory"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!("Failed to clean up downloaded audio: {}", e),
            }
        }
    }
}

/// Guards a per-acquisition directory until ownership passes to [`AcquiredAudio`].
struct ScratchGuard(Option<PathBuf>);

impl ScratchGuard {
    fn disarm(mut self) -> PathBuf {
        self.0.take().unwrap_or_default()
    }
}

impl Drop for ScratchGuard {
    fn drop(&mut self) {
        if let Some(dir) = self.0.take() {
            if let Err(e) = std::fs::remove_dir_all(&dir) {
                tracing::warn!("Failed to clean up partial download: {}", e);
            }
        }
    }
}

pub struct Acquirer {
    fetcher: Arc<dyn MediaFetcher>,
    settings: AcquisitionConfig,
    credentials: Option<CredentialStore>,
    scratch_root: TempDir,
}

impl Acquirer {
    pub fn new(
        fetcher: Arc<dyn MediaFetcher>,
        settings: AcquisitionConfig,
    ) -> std::io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("dawt-audio-");
        let scratch_root = match &settings.scratch_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                builder.tempdir_in(dir)?
            }
            None => builder.tempdir()?,
        };

        Ok(Self {
            fetcher,
            settings,
            credentials: None,
            scratch_root,
        })
    }

    pub fn with_credentials(mut self, credentials: CredentialStore) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn scratch_root(&self) -> &Path {
        self.scratch_root.path()
    }

    /// Resolves `source` to a local audio file.
    pub async fn acquire(&self, source: &AudioSource) -> Result<AcquiredAudio, JobError> {
        match source {
            AudioSource::Local(path) => self.check_local(path).await,
            AudioSource::Remote(url) => self.fetch_remote(url).await,
        }
    }

    async fn check_local(&self, path: &Path) -> Result<AcquiredAudio, JobError> {
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => Ok(AcquiredAudio::local(path.to_path_buf())),
            _ => {
                tracing::warn!(
                    path = %crate::sanitize::redact_path(path),
                    "Local audio file not accessible"
                );
                Err(JobError::new(
                    ErrorKind::NotAccessible,
                    "Audio file not accessible",
                ))
            }
        }
    }

    async fn fetch_remote(&self, url: &Url) -> Result<AcquiredAudio, JobError> {
        let auth = self.session_for(url).await?;
        let auth = auth.as_ref();

        let info = self
            .with_retries("probe", || self.fetcher.probe(url, auth))
            .await
            .map_err(|e| {
                tracing::warn!("Probe failed: {}", e);
                e.to_job_error()
            })?;

        self.check_duration(&info)?;

        let dir = self
            .scratch_root
            .path()
            .join(uuid::Uuid::new_v4().simple().to_string());
        tokio::fs::create_dir(&dir).await.map_err(|e| {
            JobError::internal(format!("Cannot create download directory: {}", e))
        })?;
        let guard = ScratchGuard(Some(dir.clone()));

        let path = self
            .with_retries("download", || self.fetcher.download(url, auth, &dir))
            .await
            .map_err(|e| {
                tracing::warn!("Download failed: {}", e);
                e.to_job_error()
            })?;

        let is_file = tokio::fs::metadata(&path)
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false);
        if !is_file {
            return Err(JobError::new(
                ErrorKind::DownloadFailed,
                FailureClass::Unknown.user_message(),
            ));
        }

        tracing::info!(
            file = %crate::sanitize::redact_path(&path),
            duration = info.duration,
            "Audio acquired"
        );
        Ok(AcquiredAudio::downloaded(path, guard.disarm()))
    }

    fn check_duration(&self, info: &MediaInfo) -> Result<(), JobError> {
        let max = self.settings.max_duration_secs;
        match info.duration {
            Some(duration) if duration > max as f64 => {
                tracing::info!(duration, max, "Source exceeds duration ceiling");
                Err(JobError::new(
                    ErrorKind::TooLong,
                    format!(
                        "Media is too long ({:.0} min). Maximum is {} min.",
                        (duration / 60.0).ceil(),
                        max / 60
                    ),
                ))
            }
            Some(_) => Ok(()),
            None => {
                tracing::debug!("Source declares no duration; ceiling not applied");
                Ok(())
            }
        }
    }

    /// Session credential for `url` if its host is an authenticated domain
    /// and a credential is active.
    async fn session_for(&self, url: &Url) -> Result<Option<SessionAuth>, JobError> {
        let Some(domain) = self.auth_domain_for(url) else {
            return Ok(None);
        };
        let Some(store) = self.credentials.clone() else {
            return Ok(None);
        };

        let token = tokio::task::spawn_blocking(move || store.get_active())
            .await
            .map_err(|e| JobError::internal(format!("Credential lookup aborted: {}", e)))?
            .map_err(|e| {
                tracing::error!("Active credential unusable: {}", e);
                JobError::new(
                    ErrorKind::CredentialInvalid,
                    "The stored session credential cannot be used. Set it again.",
                )
            })?;

        match token {
            Some(token) => {
                tracing::debug!(domain = %domain, "Attaching session credential");
                Ok(Some(SessionAuth {
                    domain,
                    cookie_name: self.settings.session_cookie_name.clone(),
                    token,
                }))
            }
            None => {
                tracing::debug!(domain = %domain, "No active credential; fetching unauthenticated");
                Ok(None)
            }
        }
    }

    fn auth_domain_for(&self, url: &Url) -> Option<String> {
        let host = url.host_str()?.to_ascii_lowercase();
        self.settings
            .auth_domains
            .iter()
            .map(|d| d.trim_start_matches('.').to_ascii_lowercase())
            .find(|domain| host == *domain || host.ends_with(&format!(".{}", domain)))
    }

    /// Runs `op` with a per-attempt timeout, retrying transient failures
    /// with exponential backoff up to `max_attempts` total attempts.
    async fn with_retries<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let max_attempts = self.settings.max_attempts.max(1);
        let timeout = Duration::from_secs(self.settings.attempt_timeout_secs.max(1));
        let base_delay = self.settings.retry_base_delay_ms;

        let mut attempt = 1;
        loop {
            let result = match tokio::time::timeout(timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(FetchError::Timeout(timeout)),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = base_delay.saturating_mul(1 << (attempt - 1).min(16));
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay,
                        "{} failed with retryable error: {}",
                        what,
                        e
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
