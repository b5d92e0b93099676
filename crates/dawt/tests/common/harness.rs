//! Test harness for isolated service execution.
//!
//! `TestHarness` owns a fully wired `TranscriptionService` whose fetcher,
//! speech-to-text and translation engines are fakes, plus the temporary
//! directories it writes into.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use dawt::acquisition::Acquirer;
use dawt::config::AcquisitionConfig;
use dawt::credentials::CredentialStore;
use dawt::db::Database;
use dawt::engine::{SpeechToText, Translator};
use dawt::jobs::{InMemoryJobRepository, JobRepository, SqliteJobRepository};
use dawt::{JobId, JobStatus, JobStatusView, Pipeline, TokenEncryptor, TranscriptionService};

use super::fakes::{FakeFetcher, FakeStt};

pub const TEST_KEY: &str = "00112233445566778899aabbccddeeff00112233445566778899aabbccddeeff";

pub struct HarnessBuilder {
    fetcher: FakeFetcher,
    stt: FakeStt,
    stt_override: Option<Arc<dyn SpeechToText>>,
    translator: Option<Arc<dyn Translator>>,
    repo_override: Option<Arc<dyn JobRepository>>,
    sqlite: bool,
    credentials: bool,
    max_duration_secs: u64,
    workers: usize,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            fetcher: FakeFetcher::with_duration(60.0),
            stt: FakeStt::saying(&[(0.0, 2.0, "hello there")]),
            stt_override: None,
            translator: None,
            repo_override: None,
            sqlite: false,
            credentials: false,
            max_duration_secs: 21 * 60,
            workers: 2,
        }
    }

    pub fn fetcher(mut self, fetcher: FakeFetcher) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn stt(mut self, stt: FakeStt) -> Self {
        self.stt = stt;
        self
    }

    /// Replaces the recording fake with an arbitrary engine.
    pub fn engine(mut self, stt: Arc<dyn SpeechToText>) -> Self {
        self.stt_override = Some(stt);
        self
    }

    pub fn translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    /// Replaces the job store with an arbitrary repository.
    pub fn repository(mut self, repo: Arc<dyn JobRepository>) -> Self {
        self.repo_override = Some(repo);
        self
    }

    /// Use an in-memory SQLite store instead of the map-backed one.
    pub fn sqlite(mut self) -> Self {
        self.sqlite = true;
        self
    }

    pub fn with_credentials(mut self) -> Self {
        self.credentials = true;
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn build(self) -> TestHarness {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let settings = AcquisitionConfig {
            max_duration_secs: self.max_duration_secs,
            max_attempts: 3,
            retry_base_delay_ms: 1,
            attempt_timeout_secs: 5,
            scratch_dir: Some(temp_dir.path().join("scratch")),
            ..AcquisitionConfig::default()
        };

        let fetcher = Arc::new(self.fetcher);
        let stt = Arc::new(self.stt);

        let db = Database::open_in_memory().expect("Failed to open database");
        let credentials = self.credentials.then(|| {
            CredentialStore::new(
                db.clone(),
                TokenEncryptor::from_hex_key(TEST_KEY).expect("valid key"),
            )
        });

        let mut acquirer =
            Acquirer::new(fetcher.clone(), settings).expect("Failed to create acquirer");
        if let Some(store) = &credentials {
            acquirer = acquirer.with_credentials(store.clone());
        }
        let scratch_root = acquirer.scratch_root().to_path_buf();

        let repo: Arc<dyn JobRepository> = if let Some(repo) = self.repo_override {
            repo
        } else if self.sqlite {
            Arc::new(SqliteJobRepository::new(db))
        } else {
            Arc::new(InMemoryJobRepository::new())
        };

        let pipeline = Arc::new(Pipeline::new(
            Arc::new(acquirer),
            self.stt_override
                .unwrap_or_else(|| stt.clone() as Arc<dyn SpeechToText>),
            self.translator,
        ));
        let service = TranscriptionService::new(repo, pipeline, credentials, self.workers, 16);

        TestHarness {
            temp_dir,
            service,
            fetcher,
            stt,
            scratch_root,
        }
    }
}

pub struct TestHarness {
    temp_dir: TempDir,
    pub service: TranscriptionService,
    pub fetcher: Arc<FakeFetcher>,
    pub stt: Arc<FakeStt>,
    /// Process-scoped download directory of the acquirer.
    pub scratch_root: PathBuf,
}

impl TestHarness {
    pub fn new() -> Self {
        HarnessBuilder::new().build()
    }

    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::new()
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes a local "audio" file and returns its path.
    pub fn write_audio(&self, name: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        std::fs::write(&path, b"RIFF fake wav").expect("Failed to write audio file");
        path
    }

    /// Polls until the job is terminal.
    pub async fn wait_terminal(&self, id: &JobId) -> JobStatusView {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        loop {
            let view = self.service.status(id).await.expect("status");
            if view.status.is_terminal() {
                return view;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "job {} stuck in {}",
                id,
                view.status
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    pub async fn submit_and_wait(&self, url: &str, language: &str) -> (JobId, JobStatus) {
        let id = self.service.submit(url, language).await.expect("submit");
        let view = self.wait_terminal(&id).await;
        (id, view.status)
    }

    /// Files left inside the acquirer's scratch directory.
    pub fn leftover_downloads(&self) -> usize {
        walk(&self.scratch_root)
    }
}

fn walk(dir: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .flatten()
        .map(|entry| {
            let path = entry.path();
            if path.is_dir() {
                walk(&path)
            } else {
                1
            }
        })
        .sum()
}
