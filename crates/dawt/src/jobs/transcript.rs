use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::language::Language;

/// One timestamped piece of a transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
    /// Translated overlay. Absent when translation did not run or produced
    /// nothing useful.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enhanced_text: Option<String>,
}

impl Segment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
            enhanced_text: None,
        }
    }
}

/// The stored result of a completed job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transcript {
    pub full_text: String,
    pub segments: Vec<Segment>,
    /// Language code reported by the speech-to-text engine.
    pub language: String,
    /// Language after keyword classification.
    pub detected_mt: Language,
    /// True when the translation stage ran and succeeded.
    pub mt_enhanced: bool,
    /// Seconds of audio, taken from the end of the last segment.
    pub duration: f64,
    pub segment_count: usize,
    /// Wall-clock seconds spent producing this result.
    pub processing_time: f64,
}

impl Transcript {
    pub fn duration_of(segments: &[Segment]) -> f64 {
        segments.last().map(|s| s.end).unwrap_or(0.0)
    }
}

/// User-supplied overwrite layered on top of a [`Transcript`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Correction {
    pub text: String,
    pub segments: Vec<Segment>,
    pub corrected_at: DateTime<Utc>,
}

/// One original/corrected segment pair for training data export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingPair {
    pub job_id: String,
    pub segment_index: usize,
    pub original: String,
    pub corrected: String,
    pub language: Language,
    pub start: f64,
    pub end: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_is_end_of_last_segment() {
        let segments = vec![Segment::new(0.0, 2.5, "a"), Segment::new(2.5, 7.25, "b")];
        assert_eq!(Transcript::duration_of(&segments), 7.25);
        assert_eq!(Transcript::duration_of(&[]), 0.0);
    }

    #[test]
    fn test_segment_omits_missing_enhanced_text() {
        let json = serde_json::to_value(Segment::new(0.0, 1.0, "hi")).unwrap();
        assert!(json.get("enhancedText").is_none());

        let parsed: Segment =
            serde_json::from_str(r#"{"start":0.0,"end":1.0,"text":"hi"}"#).unwrap();
        assert!(parsed.enhanced_text.is_none());
    }
}
