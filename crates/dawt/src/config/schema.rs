use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::language::Language;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    /// SQLite file. Defaults to `~/.dawt/data/dawt.db`.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
    #[serde(default)]
    pub transcription: TranscriptionConfig,
    #[serde(default)]
    pub translation: TranslationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            database_path: None,
            worker_count: default_worker_count(),
            queue_capacity: default_queue_capacity(),
            acquisition: AcquisitionConfig::default(),
            transcription: TranscriptionConfig::default(),
            translation: TranslationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    pub fn resolved_database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .or_else(crate::db::default_database_path)
            .unwrap_or_else(|| PathBuf::from("dawt.db"))
    }
}

/// Transcription is memory heavy; more than a handful of concurrent jobs
/// only thrashes.
fn default_worker_count() -> usize {
    num_cpus::get().clamp(1, 4)
}

fn default_queue_capacity() -> usize {
    64
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    #[serde(default = "default_yt_dlp_path")]
    pub yt_dlp_path: String,
    /// Sources declaring a longer duration are rejected before download.
    #[serde(default = "default_max_duration_secs")]
    pub max_duration_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,
    /// Domains that get the active session credential attached.
    #[serde(default = "default_auth_domains")]
    pub auth_domains: Vec<String>,
    #[serde(default = "default_session_cookie_name")]
    pub session_cookie_name: String,
    /// Parent for the process-scoped download directory. System temp if unset.
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,
}

fn default_yt_dlp_path() -> String {
    "yt-dlp".to_string()
}

fn default_max_duration_secs() -> u64 {
    21 * 60
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_attempt_timeout_secs() -> u64 {
    300
}

fn default_auth_domains() -> Vec<String> {
    vec!["instagram.com".to_string()]
}

fn default_session_cookie_name() -> String {
    "sessionid".to_string()
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            yt_dlp_path: default_yt_dlp_path(),
            max_duration_secs: default_max_duration_secs(),
            max_attempts: default_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            attempt_timeout_secs: default_attempt_timeout_secs(),
            auth_domains: default_auth_domains(),
            session_cookie_name: default_session_cookie_name(),
            scratch_dir: None,
        }
    }
}

/// OpenAI-compatible `/audio/transcriptions` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_transcription_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: Option<String>,
    #[serde(default = "default_transcription_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_transcription_model() -> String {
    "whisper-1".to_string()
}

fn default_api_key_env() -> Option<String> {
    Some("OPENAI_API_KEY".to_string())
}

fn default_transcription_timeout_secs() -> u64 {
    600
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_transcription_model(),
            api_key: None,
            api_key_file: None,
            api_key_env: default_api_key_env(),
            timeout_secs: default_transcription_timeout_secs(),
        }
    }
}

/// OpenAI-compatible chat endpoint used to rewrite dialect segments into English.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_translation_model")]
    pub model: String,
    /// Languages the engine is trusted with. Defaults to every non-English language.
    #[serde(default = "default_translation_languages")]
    pub languages: Vec<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: Option<String>,
    #[serde(default = "default_translation_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_translation_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_translation_languages() -> Vec<String> {
    Language::ALL
        .iter()
        .filter(|lang| !lang.is_default())
        .map(|lang| lang.as_str().to_string())
        .collect()
}

fn default_translation_timeout_secs() -> u64 {
    120
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_base_url(),
            model: default_translation_model(),
            languages: default_translation_languages(),
            api_key: None,
            api_key_file: None,
            api_key_env: default_api_key_env(),
            timeout_secs: default_translation_timeout_secs(),
        }
    }
}

impl TranslationConfig {
    /// Parsed language list. Unknown names are rejected at load time, so
    /// they are skipped here.
    pub fn supported_languages(&self) -> Vec<Language> {
        self.languages
            .iter()
            .filter_map(|name| name.parse().ok())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` overrides it.
    #[serde(default = "default_log_filter")]
    pub filter: String,
    #[serde(default)]
    pub json: bool,
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.version, "1.0");
        assert!(config.worker_count >= 1 && config.worker_count <= 4);
        assert_eq!(config.acquisition.max_duration_secs, 1260);
        assert_eq!(config.acquisition.max_attempts, 3);
        assert_eq!(config.acquisition.auth_domains, vec!["instagram.com"]);
        assert_eq!(config.acquisition.session_cookie_name, "sessionid");
        assert_eq!(config.translation.supported_languages().len(), 11);
    }

    #[test]
    fn test_resolved_database_path_prefers_explicit() {
        let config = Config {
            database_path: Some(PathBuf::from("/tmp/custom.db")),
            ..Config::default()
        };
        assert_eq!(config.resolved_database_path(), PathBuf::from("/tmp/custom.db"));
    }
}
