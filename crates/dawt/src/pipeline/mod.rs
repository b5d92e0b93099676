mod context;
mod error;
mod runner;
pub mod stages;

pub use context::PipelineContext;
pub use error::PipelineWarning;
pub use runner::Pipeline;
