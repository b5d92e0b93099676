//! Job repository: CRUD and guarded state transitions on `transcription_jobs`.

use std::path::PathBuf;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Row};

use super::{Database, DatabaseError};
use crate::error::{ErrorKind, JobError};
use crate::jobs::{Correction, Job, JobId, JobSource, JobStatus, Segment, Transcript};

/// A raw job row from the database.
#[derive(Debug, Clone)]
pub struct JobRow {
    pub id: String,
    pub source_url: Option<String>,
    pub source_path: Option<String>,
    pub language: String,
    pub status: String,
    pub full_text: Option<String>,
    pub segments: Option<String>,
    pub detected_language: Option<String>,
    pub detected_mt: Option<String>,
    pub mt_enhanced: bool,
    pub duration: Option<f64>,
    pub segment_count: Option<i64>,
    pub processing_time: Option<f64>,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
    pub created_at: String,
    pub completed_at: Option<String>,
    pub corrected_text: Option<String>,
    pub corrected_segments: Option<String>,
    pub corrected_at: Option<String>,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            source_url: row.get("source_url")?,
            source_path: row.get("source_path")?,
            language: row.get("language")?,
            status: row.get("status")?,
            full_text: row.get("full_text")?,
            segments: row.get("segments")?,
            detected_language: row.get("detected_language")?,
            detected_mt: row.get("detected_mt")?,
            mt_enhanced: row.get::<_, i64>("mt_enhanced")? != 0,
            duration: row.get("duration")?,
            segment_count: row.get("segment_count")?,
            processing_time: row.get("processing_time")?,
            error_kind: row.get("error_kind")?,
            error_message: row.get("error_message")?,
            created_at: row.get("created_at")?,
            completed_at: row.get("completed_at")?,
            corrected_text: row.get("corrected_text")?,
            corrected_segments: row.get("corrected_segments")?,
            corrected_at: row.get("corrected_at")?,
        })
    }

    /// Decodes the row into a domain [`Job`].
    pub fn into_job(self) -> Result<Job, DatabaseError> {
        let id = self.id.clone();
        let corrupt = |reason: String| DatabaseError::CorruptRow {
            id: id.clone(),
            reason,
        };

        let source = match (self.source_url, self.source_path) {
            (Some(url), None) => JobSource::Remote(url),
            (None, Some(path)) => JobSource::Local(PathBuf::from(path)),
            _ => return Err(corrupt("exactly one of source_url/source_path must be set".into())),
        };
        let status: JobStatus = self.status.parse().map_err(corrupt)?;
        let requested_language = self.language.parse().map_err(corrupt)?;

        let result = if status == JobStatus::Completed {
            let segments: Vec<Segment> = decode_segments(self.segments.as_deref())
                .map_err(|e| corrupt(format!("segments: {}", e)))?;
            Some(Transcript {
                full_text: self.full_text.unwrap_or_default(),
                segment_count: self
                    .segment_count
                    .map(|c| c as usize)
                    .unwrap_or(segments.len()),
                segments,
                language: self.detected_language.unwrap_or_default(),
                detected_mt: match self.detected_mt {
                    Some(lang) => lang.parse().map_err(corrupt)?,
                    None => requested_language,
                },
                mt_enhanced: self.mt_enhanced,
                duration: self.duration.unwrap_or(0.0),
                processing_time: self.processing_time.unwrap_or(0.0),
            })
        } else {
            None
        };

        let error = if status == JobStatus::Failed {
            let kind = match self.error_kind {
                Some(kind) => kind.parse().map_err(corrupt)?,
                None => ErrorKind::Internal,
            };
            Some(JobError::new(kind, self.error_message.unwrap_or_default()))
        } else {
            None
        };

        let correction = match self.corrected_at {
            Some(at) => Some(Correction {
                text: self.corrected_text.unwrap_or_default(),
                segments: decode_segments(self.corrected_segments.as_deref())
                    .map_err(|e| corrupt(format!("corrected_segments: {}", e)))?,
                corrected_at: parse_timestamp(&at).map_err(corrupt)?,
            }),
            None => None,
        };

        Ok(Job {
            id: JobId::from(self.id.clone()),
            source,
            requested_language,
            status,
            result,
            error,
            correction,
            created_at: parse_timestamp(&self.created_at).map_err(corrupt)?,
            completed_at: self
                .completed_at
                .as_deref()
                .map(parse_timestamp)
                .transpose()
                .map_err(corrupt)?,
        })
    }
}

fn decode_segments(raw: Option<&str>) -> Result<Vec<Segment>, serde_json::Error> {
    match raw {
        Some(json) => serde_json::from_str(json),
        None => Ok(Vec::new()),
    }
}

fn encode_segments(segments: &[Segment]) -> Result<String, DatabaseError> {
    serde_json::to_string(segments).map_err(|e| DatabaseError::CorruptRow {
        id: String::new(),
        reason: format!("cannot encode segments: {}", e),
    })
}

/// RFC 3339 with fixed precision so text ordering matches time ordering.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| format!("invalid timestamp '{}': {}", raw, e))
}

/// Inserts a new job in whatever state it carries (normally `pending`).
pub fn insert(db: &Database, job: &Job) -> Result<(), DatabaseError> {
    let source_path = job
        .source
        .path()
        .map(|p| p.to_string_lossy().into_owned());
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO transcription_jobs (id, source_url, source_path, language, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                job.id.as_str(),
                job.source.url(),
                source_path,
                job.requested_language.as_str(),
                job.status.as_str(),
                format_timestamp(&job.created_at),
            ],
        )?;
        Ok(())
    })
}

/// Finds a job by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<Job>, DatabaseError> {
    let row = db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM transcription_jobs WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], JobRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })?;
    row.map(JobRow::into_job).transpose()
}

/// Moves a job from `from` to `to` only if it is currently in `from`.
pub fn transition(
    db: &Database,
    id: &str,
    from: JobStatus,
    to: JobStatus,
) -> Result<(), DatabaseError> {
    if !from.can_transition_to(to) {
        return Err(invalid_transition(id, from, to));
    }
    let changed = db.with_conn(|conn| {
        Ok(conn.execute(
            "UPDATE transcription_jobs SET status = ?3 WHERE id = ?1 AND status = ?2",
            params![id, from.as_str(), to.as_str()],
        )?)
    })?;
    if changed == 0 {
        return Err(invalid_transition(id, from, to));
    }
    Ok(())
}

/// Stores the result and moves `processing -> completed` in one statement.
pub fn complete(
    db: &Database,
    id: &str,
    result: &Transcript,
    completed_at: &DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let segments = encode_segments(&result.segments)?;
    let changed = db.with_conn(|conn| {
        Ok(conn.execute(
            "UPDATE transcription_jobs SET status = 'completed', full_text = ?2, segments = ?3,
             detected_language = ?4, detected_mt = ?5, mt_enhanced = ?6, duration = ?7,
             segment_count = ?8, processing_time = ?9, completed_at = ?10
             WHERE id = ?1 AND status = 'processing'",
            params![
                id,
                result.full_text,
                segments,
                result.language,
                result.detected_mt.as_str(),
                result.mt_enhanced as i64,
                result.duration,
                result.segment_count as i64,
                result.processing_time,
                format_timestamp(completed_at),
            ],
        )?)
    })?;
    if changed == 0 {
        return Err(invalid_transition(id, JobStatus::Processing, JobStatus::Completed));
    }
    Ok(())
}

/// Records the error and moves `processing -> failed` in one statement.
pub fn fail(
    db: &Database,
    id: &str,
    error: &JobError,
    completed_at: &DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let changed = db.with_conn(|conn| {
        Ok(conn.execute(
            "UPDATE transcription_jobs SET status = 'failed', error_kind = ?2, error_message = ?3,
             completed_at = ?4
             WHERE id = ?1 AND status = 'processing'",
            params![
                id,
                error.kind.as_str(),
                error.message,
                format_timestamp(completed_at)
            ],
        )?)
    })?;
    if changed == 0 {
        return Err(invalid_transition(id, JobStatus::Processing, JobStatus::Failed));
    }
    Ok(())
}

/// Overwrites the correction slot of a completed job. Returns `false` when
/// no completed job with that id exists.
pub fn set_correction(
    db: &Database,
    id: &str,
    correction: &Correction,
) -> Result<bool, DatabaseError> {
    let segments = encode_segments(&correction.segments)?;
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE transcription_jobs SET corrected_text = ?2, corrected_segments = ?3,
             corrected_at = ?4
             WHERE id = ?1 AND status = 'completed'",
            params![
                id,
                correction.text,
                segments,
                format_timestamp(&correction.corrected_at)
            ],
        )?;
        Ok(changed > 0)
    })
}

/// Completed jobs carrying a correction, oldest first.
pub fn list_corrected(db: &Database) -> Result<Vec<Job>, DatabaseError> {
    query_jobs(
        db,
        "SELECT * FROM transcription_jobs
         WHERE corrected_at IS NOT NULL AND status = 'completed'
         ORDER BY created_at ASC",
        None,
    )
}

/// Most recent jobs, newest first.
pub fn list_recent(db: &Database, limit: usize) -> Result<Vec<Job>, DatabaseError> {
    query_jobs(
        db,
        "SELECT * FROM transcription_jobs ORDER BY created_at DESC LIMIT ?1",
        Some(limit as i64),
    )
}

fn query_jobs(db: &Database, sql: &str, limit: Option<i64>) -> Result<Vec<Job>, DatabaseError> {
    let rows = db.with_conn(|conn| {
        let mut stmt = conn.prepare(sql)?;
        let rows = match limit {
            Some(limit) => stmt
                .query_map(params![limit], JobRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?,
            None => stmt
                .query_map([], JobRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?,
        };
        Ok(rows)
    })?;
    rows.into_iter().map(JobRow::into_job).collect()
}

/// Counts jobs with the given status.
pub fn count_by_status(db: &Database, status: JobStatus) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM transcription_jobs WHERE status = ?1",
            params![status.as_str()],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

fn invalid_transition(id: &str, from: JobStatus, to: JobStatus) -> DatabaseError {
    DatabaseError::InvalidTransition {
        id: id.to_string(),
        expected: from.as_str().to_string(),
        to: to.as_str().to_string(),
    }
}
