//! Job records, their state machine and the repository seam.

mod model;
pub mod repository;
mod transcript;

pub use model::{Job, JobId, JobOutcome, JobSource, JobStatus, JobStatusView};
pub use repository::{InMemoryJobRepository, JobRepository, SqliteJobRepository};
pub use transcript::{Correction, Segment, TrainingPair, Transcript};
