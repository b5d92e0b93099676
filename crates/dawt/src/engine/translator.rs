use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use super::{EngineError, Translator};
use crate::config::TranslationConfig;
use crate::language::Language;

/// Dialect-to-English rewriting through an OpenAI-compatible chat endpoint.
pub struct HttpTranslator {
    client: reqwest::Client,
    api_key: Option<SecretString>,
    base_url: String,
    model: String,
    languages: Vec<Language>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl HttpTranslator {
    pub fn new(config: &TranslationConfig, api_key: Option<SecretString>) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EngineError::Unavailable(format!("http client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            languages: config.supported_languages(),
        })
    }

    fn prompt(text: &str, language: Language) -> String {
        format!(
            "Translate to English and clarify {} ({}) pidgin/dialect: {}",
            language,
            language.translation_code().unwrap_or("und"),
            text
        )
    }

    async fn translate_one(&self, text: &str, language: Language) -> Result<String, EngineError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "temperature": 0,
            "messages": [{ "role": "user", "content": Self::prompt(text, language) }],
        });

        let mut request = self.client.post(&url).json(&body);
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

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| EngineError::InvalidResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| EngineError::InvalidResponse("no completion choices".to_string()))
    }
}

#[async_trait]
impl Translator for HttpTranslator {
    fn supports(&self, language: Language) -> bool {
        !language.is_default() && self.languages.contains(&language)
    }

    async fn translate(
        &self,
        texts: &[String],
        language: Language,
    ) -> Result<Vec<String>, EngineError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            if text.trim().is_empty() {
                out.push(String::new());
                continue;
            }
            out.push(self.translate_one(text, language).await?);
        }
        tracing::debug!(count = out.len(), language = %language, "Translated segments");
        Ok(out)
    }
}
