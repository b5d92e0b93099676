use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart;
use secrecy::{ExposeSecret, SecretString};

use super::{EngineError, RawTranscript, SpeechToText};
use crate::config::TranscriptionConfig;

/// Whisper behind an OpenAI-compatible `/audio/transcriptions` endpoint.
pub struct WhisperHttpEngine {
    client: reqwest::Client,
    api_key: Option<SecretString>,
    base_url: String,
    model: String,
}

impl WhisperHttpEngine {
    pub fn new(config: &TranscriptionConfig, api_key: Option<SecretString>) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EngineError::Unavailable(format!("http client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl SpeechToText for WhisperHttpEngine {
    async fn transcribe(
        &self,
        audio: &Path,
        language_hint: Option<&str>,
    ) -> Result<RawTranscript, EngineError> {
        let url = format!("{}/audio/transcriptions", self.base_url);

        let bytes = tokio::fs::read(audio).await?;
        let file_name = audio
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio")
            .to_string();
        let mime = mime_guess::from_path(audio).first_or_octet_stream();

        let file_part = multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime.essence_str())
            .map_err(|e| EngineError::Request(format!("mime: {}", e)))?;

        let mut form = multipart::Form::new()
            .text("model", self.model.clone())
            .text("response_format", "verbose_json")
            .part("file", file_part);
        if let Some(hint) = language_hint {
            form = form.text("language", hint.to_string());
        }

        tracing::debug!(model = %self.model, hint = ?language_hint, "Sending audio to transcription engine");

        let mut request = self.client.post(&url).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|e| EngineError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(EngineError::Api { status, body });
        }

        let transcript: RawTranscript = response
            .json()
            .await
            .map_err(|e| EngineError::InvalidResponse(e.to_string()))?;

        tracing::info!(
            segments = transcript.segments.len(),
            chars = transcript.text.len(),
            "Transcription completed"
        );

        Ok(transcript)
    }
}
