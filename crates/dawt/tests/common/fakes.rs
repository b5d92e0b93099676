//! Scripted stand-ins for the external collaborators.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Url;
use secrecy::ExposeSecret;
use tokio::sync::Notify;

use dawt::acquisition::{FetchError, MediaFetcher, MediaInfo, SessionAuth};
use dawt::db::DatabaseError;
use dawt::engine::{EngineError, RawSegment, RawTranscript, SpeechToText, Translator};
use dawt::jobs::{Correction, InMemoryJobRepository, JobRepository};
use dawt::{Job, JobError, JobId, Language, Transcript};

/// Fetcher that never touches the network.
#[derive(Default)]
pub struct FakeFetcher {
    /// Declared duration returned by every probe.
    pub duration: Option<f64>,
    /// When set, each download waits for one `notify_one`.
    pub gate: Option<Arc<Notify>>,
    /// Stderr texts returned by successive probes before they succeed.
    pub probe_failures: Mutex<VecDeque<String>>,
    pub probes: AtomicUsize,
    pub downloads: AtomicUsize,
    /// Token seen by the most recent call, if any.
    pub last_token: Mutex<Option<String>>,
}

impl FakeFetcher {
    pub fn with_duration(duration: f64) -> Self {
        Self {
            duration: Some(duration),
            ..Self::default()
        }
    }

    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn failing_probes(self, stderr: &[&str]) -> Self {
        *self.probe_failures.lock().unwrap() = stderr.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    fn record_auth(&self, auth: Option<&SessionAuth>) {
        *self.last_token.lock().unwrap() = auth.map(|a| a.token.expose_secret().to_string());
    }
}

#[async_trait]
impl MediaFetcher for FakeFetcher {
    async fn probe(&self, _url: &Url, auth: Option<&SessionAuth>) -> Result<MediaInfo, FetchError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.record_auth(auth);
        if let Some(stderr) = self.probe_failures.lock().unwrap().pop_front() {
            return Err(FetchError::from_stderr(&stderr));
        }
        Ok(MediaInfo {
            id: Some("clip".to_string()),
            extractor: Some("fake".to_string()),
            title: Some("Fake clip".to_string()),
            duration: self.duration,
        })
    }

    async fn download(
        &self,
        _url: &Url,
        auth: Option<&SessionAuth>,
        dest_dir: &Path,
    ) -> Result<PathBuf, FetchError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        self.record_auth(auth);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let path = dest_dir.join("fake-clip.m4a");
        tokio::fs::write(&path, b"not really audio").await?;
        Ok(path)
    }
}

/// Speech-to-text engine returning a fixed transcript.
pub struct FakeStt {
    pub text: String,
    pub segments: Vec<RawSegment>,
    pub fail: bool,
    pub calls: AtomicUsize,
    /// Audio paths seen, with whether the file existed at call time.
    pub seen: Mutex<Vec<(PathBuf, bool)>>,
    pub hints: Mutex<Vec<Option<String>>>,
}

impl FakeStt {
    pub fn saying(segments: &[(f64, f64, &str)]) -> Self {
        let segments: Vec<RawSegment> = segments
            .iter()
            .map(|(start, end, text)| RawSegment {
                start: *start,
                end: *end,
                text: format!(" {}", text),
            })
            .collect();
        let text = segments
            .iter()
            .map(|s| s.text.trim())
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            text,
            segments,
            fail: false,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            hints: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::saying(&[])
        }
    }

    pub fn seen_paths(&self) -> Vec<(PathBuf, bool)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechToText for FakeStt {
    async fn transcribe(
        &self,
        audio: &Path,
        language_hint: Option<&str>,
    ) -> Result<RawTranscript, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap()
            .push((audio.to_path_buf(), audio.exists()));
        self.hints
            .lock()
            .unwrap()
            .push(language_hint.map(str::to_string));
        if self.fail {
            return Err(EngineError::Api {
                status: 500,
                body: "model crashed".to_string(),
            });
        }
        Ok(RawTranscript {
            text: self.text.clone(),
            segments: self.segments.clone(),
            language: language_hint.unwrap_or("en").to_string(),
        })
    }
}

/// Translator that prefixes every text, leaving empty ones empty.
pub struct PrefixTranslator(pub &'static str);

#[async_trait]
impl Translator for PrefixTranslator {
    fn supports(&self, language: Language) -> bool {
        !language.is_default()
    }

    async fn translate(
        &self,
        texts: &[String],
        _language: Language,
    ) -> Result<Vec<String>, EngineError> {
        Ok(texts
            .iter()
            .map(|t| {
                if t.trim().is_empty() {
                    String::new()
                } else {
                    format!("{}{}", self.0, t)
                }
            })
            .collect())
    }
}

/// Translator whose every call fails.
pub struct FailingTranslator;

#[async_trait]
impl Translator for FailingTranslator {
    fn supports(&self, language: Language) -> bool {
        !language.is_default()
    }

    async fn translate(
        &self,
        _texts: &[String],
        _language: Language,
    ) -> Result<Vec<String>, EngineError> {
        Err(EngineError::Request("connection refused".to_string()))
    }
}

/// Translator that drops outputs, breaking positional alignment.
pub struct ShortTranslator;

#[async_trait]
impl Translator for ShortTranslator {
    fn supports(&self, language: Language) -> bool {
        !language.is_default()
    }

    async fn translate(
        &self,
        _texts: &[String],
        _language: Language,
    ) -> Result<Vec<String>, EngineError> {
        Ok(vec![])
    }
}

/// Speech-to-text engine that panics mid-job.
pub struct PanickingStt;

#[async_trait]
impl SpeechToText for PanickingStt {
    async fn transcribe(
        &self,
        _audio: &Path,
        _language_hint: Option<&str>,
    ) -> Result<RawTranscript, EngineError> {
        panic!("decoder blew up");
    }
}

/// Job store that accepts everything except a completed result.
#[derive(Default)]
pub struct UnstorableResultRepository {
    inner: InMemoryJobRepository,
}

#[async_trait]
impl JobRepository for UnstorableResultRepository {
    async fn create(&self, job: &Job) -> Result<(), DatabaseError> {
        self.inner.create(job).await
    }

    async fn get(&self, id: &JobId) -> Result<Option<Job>, DatabaseError> {
        self.inner.get(id).await
    }

    async fn mark_processing(&self, id: &JobId) -> Result<(), DatabaseError> {
        self.inner.mark_processing(id).await
    }

    async fn complete(
        &self,
        id: &JobId,
        _result: &Transcript,
        _completed_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        Err(DatabaseError::CorruptRow {
            id: id.to_string(),
            reason: "segments could not be encoded".to_string(),
        })
    }

    async fn fail(
        &self,
        id: &JobId,
        error: &JobError,
        completed_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        self.inner.fail(id, error, completed_at).await
    }

    async fn set_correction(
        &self,
        id: &JobId,
        correction: &Correction,
    ) -> Result<bool, DatabaseError> {
        self.inner.set_correction(id, correction).await
    }

    async fn list_corrected(&self) -> Result<Vec<Job>, DatabaseError> {
        self.inner.list_corrected().await
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<Job>, DatabaseError> {
        self.inner.list_recent(limit).await
    }
}
