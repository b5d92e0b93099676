//! Job orchestration: the caller-facing service, the worker pool that runs
//! submitted jobs and the per-job executor they share.

mod executor;
mod export;
mod pool;
mod service;

pub use executor::JobExecutor;
pub use export::training_pairs;
pub use pool::WorkerPool;
pub use service::{TranscribeRequest, TranscriptionService};
