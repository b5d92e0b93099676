use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, info_span, warn, Instrument};

use crate::acquisition::{Acquirer, AudioSource};
use crate::engine::{EngineError, SpeechToText, Translator};
use crate::error::{ErrorKind, JobError};
use crate::jobs::Transcript;
use crate::language::Language;

use super::context::PipelineContext;
use super::error::PipelineWarning;
use super::stages;

const TRANSCRIPTION_FAILED_MESSAGE: &str =
    "Transcription failed. Please check your audio file or URL.";

/// Acquire, transcribe, classify and translate a single source.
///
/// Shared by the synchronous path and the worker pool. Holds no job state;
/// persisting the outcome is the caller's concern.
pub struct Pipeline {
    acquirer: Arc<Acquirer>,
    stt: Arc<dyn SpeechToText>,
    translator: Option<Arc<dyn Translator>>,
}

impl Pipeline {
    pub fn new(
        acquirer: Arc<Acquirer>,
        stt: Arc<dyn SpeechToText>,
        translator: Option<Arc<dyn Translator>>,
    ) -> Self {
        Self {
            acquirer,
            stt,
            translator,
        }
    }

    /// Run every stage for one source. Translation problems are absorbed;
    /// any other failure aborts the remaining stages.
    pub async fn run(
        &self,
        source: &AudioSource,
        requested: Language,
    ) -> Result<Transcript, JobError> {
        let started = Instant::now();

        // Step 1: Acquire
        let audio = self
            .acquirer
            .acquire(source)
            .instrument(info_span!("acquire"))
            .await?;

        // Step 2: Transcribe
        let raw = {
            let hint = requested.engine_hint();
            let result = self
                .stt
                .transcribe(audio.path(), hint)
                .instrument(info_span!("transcribe", hint = hint.unwrap_or("auto")))
                .await;
            // Temporary audio is not needed past this point.
            drop(audio);
            result.map_err(Self::transcription_error)?
        };
        let mut ctx = PipelineContext::from_raw(requested, raw);

        // Step 3: Classify
        {
            let _step = info_span!("classify").entered();
            self.step_classify(&mut ctx);
        }

        // Step 4: Translate
        let span = info_span!("translate", language = %ctx.detected_mt);
        self.step_translate(&mut ctx).instrument(span).await;

        for warning in &ctx.warnings {
            debug!(?warning, "Pipeline finished with warning");
        }

        let transcript = ctx.into_transcript(started.elapsed());
        info!(
            segments = transcript.segment_count,
            detected = %transcript.detected_mt,
            mt_enhanced = transcript.mt_enhanced,
            "Pipeline completed"
        );
        Ok(transcript)
    }

    fn transcription_error(e: EngineError) -> JobError {
        warn!("Transcription engine failed: {}", e);
        JobError::new(ErrorKind::TranscriptionFailed, TRANSCRIPTION_FAILED_MESSAGE)
    }

    fn step_classify(&self, ctx: &mut PipelineContext) {
        ctx.detected_mt = stages::classify(ctx.requested_language, &ctx.full_text);
        if ctx.detected_mt != ctx.requested_language {
            debug!(detected = %ctx.detected_mt, "Reclassified transcript language");
        }
    }

    async fn step_translate(&self, ctx: &mut PipelineContext) {
        let language = ctx.detected_mt;
        if language.is_default() {
            return;
        }
        let Some(translator) = &self.translator else {
            return;
        };
        if !translator.supports(language) {
            ctx.warnings
                .push(PipelineWarning::TranslationUnsupported { language });
            return;
        }

        let texts: Vec<String> = ctx.segments.iter().map(|s| s.text.clone()).collect();
        let outcome = match translator.translate(&texts, language).await {
            Ok(translated) if translated.len() != texts.len() => Err(EngineError::LengthMismatch {
                expected: texts.len(),
                actual: translated.len(),
            }),
            other => other,
        };

        match outcome {
            Ok(translated) => {
                let applied = stages::apply_translations(&mut ctx.segments, &translated);
                ctx.mt_enhanced = true;
                debug!(applied, "Attached enhanced text");
            }
            Err(e) => {
                warn!("Translation failed, continuing without enhancement: {}", e);
                ctx.warnings.push(PipelineWarning::TranslationFailed {
                    language,
                    error: e.to_string(),
                });
            }
        }
    }
}
