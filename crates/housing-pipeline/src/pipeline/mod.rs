//! Pipeline module.
//!
//! The driver that sequences the stages and the progress types it emits.

mod driver;
pub mod progress;

pub use driver::{Pipeline, PipelineBuilder, RunSummary};
pub use progress::{ClosureProgressReporter, PipelineState, ProgressReporter, ProgressUpdate};
