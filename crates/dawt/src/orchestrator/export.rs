use crate::jobs::{Job, TrainingPair};

/// Original/corrected pairs for one job, paired by segment index.
///
/// Jobs whose corrected segment list differs in length from the stored one
/// are skipped: index pairing would misalign every segment after the first
/// insertion or deletion.
pub fn training_pairs(job: &Job) -> Vec<TrainingPair> {
    let (Some(result), Some(correction)) = (&job.result, &job.correction) else {
        return Vec::new();
    };

    if result.segments.len() != correction.segments.len() {
        tracing::warn!(
            job_id = %job.id,
            original = result.segments.len(),
            corrected = correction.segments.len(),
            "Skipping correction with mismatched segment count"
        );
        return Vec::new();
    }

    result
        .segments
        .iter()
        .zip(&correction.segments)
        .enumerate()
        .filter(|(_, (original, corrected))| original.text.trim() != corrected.text.trim())
        .map(|(index, (original, corrected))| TrainingPair {
            job_id: job.id.to_string(),
            segment_index: index,
            original: original.text.clone(),
            corrected: corrected.text.clone(),
            language: result.detected_mt,
            start: original.start,
            end: original.end,
        })
        .collect()
}
