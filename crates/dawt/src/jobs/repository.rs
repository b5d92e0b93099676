//! Storage seam for job records.
//!
//! The orchestrator only talks to [`JobRepository`]. Every mutation is a
//! guarded transition: it applies only when the record is in the expected
//! state, so concurrent writers can never move a job backwards or out of a
//! terminal state.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{Correction, Job, JobId, JobStatus, Transcript};
use crate::db::{job_repo, Database, DatabaseError};
use crate::error::JobError;

#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn create(&self, job: &Job) -> Result<(), DatabaseError>;

    async fn get(&self, id: &JobId) -> Result<Option<Job>, DatabaseError>;

    /// `pending -> processing`.
    async fn mark_processing(&self, id: &JobId) -> Result<(), DatabaseError>;

    /// `processing -> completed`, storing the result.
    async fn complete(
        &self,
        id: &JobId,
        result: &Transcript,
        completed_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError>;

    /// `processing -> failed`, storing the error.
    async fn fail(
        &self,
        id: &JobId,
        error: &JobError,
        completed_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError>;

    /// Overwrites the correction slot. `false` if the job is not completed.
    async fn set_correction(
        &self,
        id: &JobId,
        correction: &Correction,
    ) -> Result<bool, DatabaseError>;

    async fn list_corrected(&self) -> Result<Vec<Job>, DatabaseError>;

    async fn list_recent(&self, limit: usize) -> Result<Vec<Job>, DatabaseError>;
}

/// SQLite-backed repository. Queries run on the blocking pool.
#[derive(Clone)]
pub struct SqliteJobRepository {
    db: Database,
}

impl SqliteJobRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    async fn blocking<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Database) -> Result<T, DatabaseError> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| DatabaseError::Join(e.to_string()))?
    }
}

#[async_trait]
impl JobRepository for SqliteJobRepository {
    async fn create(&self, job: &Job) -> Result<(), DatabaseError> {
        let job = job.clone();
        self.blocking(move |db| job_repo::insert(db, &job)).await
    }

    async fn get(&self, id: &JobId) -> Result<Option<Job>, DatabaseError> {
        let id = id.clone();
        self.blocking(move |db| job_repo::find_by_id(db, id.as_str()))
            .await
    }

    async fn mark_processing(&self, id: &JobId) -> Result<(), DatabaseError> {
        let id = id.clone();
        self.blocking(move |db| {
            job_repo::transition(db, id.as_str(), JobStatus::Pending, JobStatus::Processing)
        })
        .await
    }

    async fn complete(
        &self,
        id: &JobId,
        result: &Transcript,
        completed_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let id = id.clone();
        let result = result.clone();
        self.blocking(move |db| job_repo::complete(db, id.as_str(), &result, &completed_at))
            .await
    }

    async fn fail(
        &self,
        id: &JobId,
        error: &JobError,
        completed_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let id = id.clone();
        let error = error.clone();
        self.blocking(move |db| job_repo::fail(db, id.as_str(), &error, &completed_at))
            .await
    }

    async fn set_correction(
        &self,
        id: &JobId,
        correction: &Correction,
    ) -> Result<bool, DatabaseError> {
        let id = id.clone();
        let correction = correction.clone();
        self.blocking(move |db| job_repo::set_correction(db, id.as_str(), &correction))
            .await
    }

    async fn list_corrected(&self) -> Result<Vec<Job>, DatabaseError> {
        self.blocking(job_repo::list_corrected).await
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<Job>, DatabaseError> {
        self.blocking(move |db| job_repo::list_recent(db, limit))
            .await
    }
}

/// Process-local repository, used in tests and for ephemeral runs.
#[derive(Default)]
pub struct InMemoryJobRepository {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn update<F>(&self, id: &JobId, from: JobStatus, to: JobStatus, f: F) -> Result<(), DatabaseError>
    where
        F: FnOnce(&mut Job),
    {
        let mut jobs = self.jobs.write().map_err(|_| DatabaseError::LockPoisoned)?;
        let invalid = || DatabaseError::InvalidTransition {
            id: id.to_string(),
            expected: from.as_str().to_string(),
            to: to.as_str().to_string(),
        };
        match jobs.get_mut(id) {
            Some(job) if job.status == from && from.can_transition_to(to) => {
                job.status = to;
                f(job);
                Ok(())
            }
            _ => Err(invalid()),
        }
    }
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn create(&self, job: &Job) -> Result<(), DatabaseError> {
        let mut jobs = self.jobs.write().map_err(|_| DatabaseError::LockPoisoned)?;
        jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn get(&self, id: &JobId) -> Result<Option<Job>, DatabaseError> {
        let jobs = self.jobs.read().map_err(|_| DatabaseError::LockPoisoned)?;
        Ok(jobs.get(id).cloned())
    }

    async fn mark_processing(&self, id: &JobId) -> Result<(), DatabaseError> {
        self.update(id, JobStatus::Pending, JobStatus::Processing, |_| {})
    }

    async fn complete(
        &self,
        id: &JobId,
        result: &Transcript,
        completed_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        self.update(id, JobStatus::Processing, JobStatus::Completed, |job| {
            job.result = Some(result.clone());
            job.completed_at = Some(completed_at);
        })
    }

    async fn fail(
        &self,
        id: &JobId,
        error: &JobError,
        completed_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        self.update(id, JobStatus::Processing, JobStatus::Failed, |job| {
            job.error = Some(error.clone());
            job.completed_at = Some(completed_at);
        })
    }

    async fn set_correction(
        &self,
        id: &JobId,
        correction: &Correction,
    ) -> Result<bool, DatabaseError> {
        let mut jobs = self.jobs.write().map_err(|_| DatabaseError::LockPoisoned)?;
        match jobs.get_mut(id) {
            Some(job) if job.status == JobStatus::Completed => {
                job.correction = Some(correction.clone());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_corrected(&self) -> Result<Vec<Job>, DatabaseError> {
        let jobs = self.jobs.read().map_err(|_| DatabaseError::LockPoisoned)?;
        let mut corrected: Vec<Job> = jobs
            .values()
            .filter(|j| j.status == JobStatus::Completed && j.correction.is_some())
            .cloned()
            .collect();
        corrected.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(corrected)
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<Job>, DatabaseError> {
        let jobs = self.jobs.read().map_err(|_| DatabaseError::LockPoisoned)?;
        let mut recent: Vec<Job> = jobs.values().cloned().collect();
        recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        recent.truncate(limit);
        Ok(recent)
    }
}
