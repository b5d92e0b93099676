use std::time::Duration;

use crate::engine::RawTranscript;
use crate::jobs::{Segment, Transcript};
use crate::language::Language;

use super::error::PipelineWarning;

/// State threaded through the stages of a single run.
pub struct PipelineContext {
    pub requested_language: Language,

    // Transcribe results
    pub full_text: String,
    pub segments: Vec<Segment>,
    pub engine_language: String,

    // Classify result
    pub detected_mt: Language,

    // Translate result
    pub mt_enhanced: bool,

    pub warnings: Vec<PipelineWarning>,
}

impl PipelineContext {
    pub fn from_raw(requested_language: Language, raw: RawTranscript) -> Self {
        let segments: Vec<Segment> = raw
            .segments
            .into_iter()
            .map(|s| Segment::new(s.start, s.end, s.text.trim()))
            .collect();

        let mut full_text = raw.text.trim().to_string();
        if full_text.is_empty() && !segments.is_empty() {
            full_text = segments
                .iter()
                .map(|s| s.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
        }

        Self {
            requested_language,
            full_text,
            segments,
            engine_language: raw.language,
            detected_mt: requested_language,
            mt_enhanced: false,
            warnings: Vec::new(),
        }
    }

    pub fn into_transcript(self, elapsed: Duration) -> Transcript {
        Transcript {
            duration: Transcript::duration_of(&self.segments),
            segment_count: self.segments.len(),
            full_text: self.full_text,
            segments: self.segments,
            language: self.engine_language,
            detected_mt: self.detected_mt,
            mt_enhanced: self.mt_enhanced,
            processing_time: (elapsed.as_secs_f64() * 100.0).round() / 100.0,
        }
    }
}
