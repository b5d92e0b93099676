//! Speech-to-text and translation engines.
//!
//! The pipeline only sees [`SpeechToText`] and [`Translator`]. Concrete
//! engines talk to OpenAI-compatible HTTP endpoints and are wrapped in
//! [`LazyEngine`] so they are built once, on first use, and shared.

mod lazy;
mod translator;
mod whisper;

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use lazy::{LazyEngine, LazyTranslator};
pub use translator::HttpTranslator;
pub use whisper::WhisperHttpEngine;

use crate::config::{TranscriptionConfig, TranslationConfig};
use crate::language::Language;
use crate::secrets::resolve_secret_optional;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Engine unavailable: {0}")]
    Unavailable(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Engine returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Invalid engine response: {0}")]
    InvalidResponse(String),

    #[error("Expected {expected} translations, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A segment as returned by the speech-to-text engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTranscript {
    pub text: String,
    #[serde(default)]
    pub segments: Vec<RawSegment>,
    /// Engine-detected language code or name.
    #[serde(default)]
    pub language: String,
}

#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribes the audio file. `language_hint` is an engine code; `None`
    /// lets the engine detect the language.
    async fn transcribe(
        &self,
        audio: &Path,
        language_hint: Option<&str>,
    ) -> Result<RawTranscript, EngineError>;
}

#[async_trait]
pub trait Translator: Send + Sync {
    fn supports(&self, language: Language) -> bool;

    /// Rewrites each text into English. Output is positionally aligned
    /// with the input.
    async fn translate(
        &self,
        texts: &[String],
        language: Language,
    ) -> Result<Vec<String>, EngineError>;
}

/// Lazily-built speech-to-text engine from configuration.
pub fn speech_to_text_from_config(config: &TranscriptionConfig) -> LazyEngine<dyn SpeechToText> {
    let config = config.clone();
    LazyEngine::new("transcription", move || {
        let api_key = resolve_secret_optional(
            config.api_key.as_deref(),
            config.api_key_file.as_deref(),
            config.api_key_env.as_deref(),
        )
        .map_err(|e| EngineError::Unavailable(e.to_string()))?;
        let engine = WhisperHttpEngine::new(&config, api_key)?;
        Ok(std::sync::Arc::new(engine) as std::sync::Arc<dyn SpeechToText>)
    })
}

/// Lazily-built translator, or `None` when translation is disabled.
pub fn translator_from_config(config: &TranslationConfig) -> Option<LazyTranslator> {
    if !config.enabled {
        return None;
    }
    let languages = config.supported_languages();
    let config = config.clone();
    let engine = LazyEngine::new("translation", move || {
        let api_key = resolve_secret_optional(
            config.api_key.as_deref(),
            config.api_key_file.as_deref(),
            config.api_key_env.as_deref(),
        )
        .map_err(|e| EngineError::Unavailable(e.to_string()))?;
        let engine = HttpTranslator::new(&config, api_key)?;
        Ok(std::sync::Arc::new(engine) as std::sync::Arc<dyn Translator>)
    });
    Some(LazyTranslator::new(engine, languages))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_transcript_from_verbose_json() {
        let json = r#"{
            "task": "transcribe",
            "language": "english",
            "duration": 4.2,
            "text": "abeg come",
            "segments": [{"id": 0, "start": 0.0, "end": 4.2, "text": " abeg come", "avg_logprob": -0.2}]
        }"#;
        let transcript: RawTranscript = serde_json::from_str(json).unwrap();
        assert_eq!(transcript.language, "english");
        assert_eq!(transcript.segments.len(), 1);
        assert_eq!(transcript.segments[0].end, 4.2);
    }

    #[test]
    fn test_disabled_translation_yields_none() {
        let config = TranslationConfig {
            enabled: false,
            ..TranslationConfig::default()
        };
        assert!(translator_from_config(&config).is_none());
    }
}
