use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;

use super::{EngineError, RawTranscript, SpeechToText, Translator};
use crate::language::Language;

type Init<T> = Box<dyn Fn() -> Result<Arc<T>, EngineError> + Send + Sync>;

/// Engine built on first use and shared afterwards.
///
/// A failed build is not cached; the next call tries again.
pub struct LazyEngine<T: ?Sized> {
    name: &'static str,
    cell: OnceCell<Arc<T>>,
    init: Init<T>,
}

impl<T: ?Sized + Send + Sync> LazyEngine<T> {
    pub fn new<F>(name: &'static str, init: F) -> Self
    where
        F: Fn() -> Result<Arc<T>, EngineError> + Send + Sync + 'static,
    {
        Self {
            name,
            cell: OnceCell::new(),
            init: Box::new(init),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }

    pub async fn get(&self) -> Result<Arc<T>, EngineError> {
        let engine = self
            .cell
            .get_or_try_init(|| async {
                tracing::info!(engine = self.name, "Initializing engine");
                (self.init)()
            })
            .await
            .map_err(|e| {
                tracing::warn!(engine = self.name, "Engine initialization failed: {}", e);
                e
            })?;
        Ok(Arc::clone(engine))
    }
}

#[async_trait]
impl SpeechToText for LazyEngine<dyn SpeechToText> {
    async fn transcribe(
        &self,
        audio: &Path,
        language_hint: Option<&str>,
    ) -> Result<RawTranscript, EngineError> {
        self.get().await?.transcribe(audio, language_hint).await
    }
}

/// Lazy translator that knows its language coverage before it is built.
pub struct LazyTranslator {
    engine: LazyEngine<dyn Translator>,
    languages: Vec<Language>,
}

impl LazyTranslator {
    pub fn new(engine: LazyEngine<dyn Translator>, languages: Vec<Language>) -> Self {
        Self { engine, languages }
    }
}

#[async_trait]
impl Translator for LazyTranslator {
    fn supports(&self, language: Language) -> bool {
        !language.is_default() && self.languages.contains(&language)
    }

    async fn translate(
        &self,
        texts: &[String],
        language: Language,
    ) -> Result<Vec<String>, EngineError> {
        self.engine.get().await?.translate(texts, language).await
    }
}
