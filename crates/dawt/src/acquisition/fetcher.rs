//! Remote media resolution through `yt-dlp`.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use tokio::process::Command;

use super::cookies::{CookieJar, SessionAuth};
use super::error::FetchError;

/// Metadata declared by the source before anything is downloaded.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MediaInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub extractor: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    /// Seconds. Absent for live streams and some platforms.
    #[serde(default)]
    pub duration: Option<f64>,
}

/// Resolves a remote reference into audio on disk.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Reads the source's metadata without downloading media.
    async fn probe(&self, url: &Url, auth: Option<&SessionAuth>) -> Result<MediaInfo, FetchError>;

    /// Downloads the best audio stream into `dest_dir`, returning the file path.
    async fn download(
        &self,
        url: &Url,
        auth: Option<&SessionAuth>,
        dest_dir: &Path,
    ) -> Result<PathBuf, FetchError>;
}

/// [`MediaFetcher`] backed by the `yt-dlp` executable.
#[derive(Debug, Clone)]
pub struct YtDlpFetcher {
    program: PathBuf,
}

impl YtDlpFetcher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn base_command(&self, jar: Option<&CookieJar>) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(["--no-playlist", "--no-warnings", "--no-progress"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(jar) = jar {
            cmd.arg("--cookies").arg(jar.path());
        }
        cmd
    }

    async fn run(&self, mut cmd: Command) -> Result<String, FetchError> {
        let output = cmd.output().await.map_err(|source| FetchError::Spawn {
            program: self.program.display().to_string(),
            source,
        })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::debug!(status = ?output.status, "yt-dlp exited with failure");
            Err(FetchError::from_stderr(&stderr))
        }
    }
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    async fn probe(&self, url: &Url, auth: Option<&SessionAuth>) -> Result<MediaInfo, FetchError> {
        let scratch = tempfile::tempdir()?;
        let jar = auth
            .map(|a| CookieJar::write(scratch.path(), a))
            .transpose()?;

        let mut cmd = self.base_command(jar.as_ref());
        cmd.args(["--dump-single-json", "--skip-download"])
            .arg(url.as_str());

        let stdout = self.run(cmd).await?;
        serde_json::from_str(&stdout).map_err(|e| FetchError::Metadata(e.to_string()))
    }

    async fn download(
        &self,
        url: &Url,
        auth: Option<&SessionAuth>,
        dest_dir: &Path,
    ) -> Result<PathBuf, FetchError> {
        let jar = auth.map(|a| CookieJar::write(dest_dir, a)).transpose()?;

        let template = dest_dir.join("%(extractor)s-%(id)s.%(ext)s");
        let mut cmd = self.base_command(jar.as_ref());
        cmd.args(["-f", "bestaudio/best", "--print", "after_move:filepath", "-o"])
            .arg(&template)
            .arg(url.as_str());

        let stdout = self.run(cmd).await?;
        let path = stdout
            .lines()
            .map(str::trim)
            .rfind(|line| !line.is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| FetchError::Metadata("yt-dlp did not report an output file".into()))?;

        if !path.exists() {
            return Err(FetchError::Metadata(format!(
                "reported output file is missing: {}",
                crate::sanitize::redact_path(&path)
            )));
        }
        Ok(path)
    }
}
