//! Driver states and progress reporting.
//!
//! Every state transition of the driver produces a [`ProgressUpdate`] that
//! is handed to the configured [`ProgressReporter`], if any.
//!
//! # Example
//!
//! ```rust,ignore
//! use housing_pipeline::Pipeline;
//!
//! let summary = Pipeline::builder()
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .run(Box::new(tracker))?;
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// States of a pipeline execution.
///
/// The driver moves strictly forward through the stage states. Any stage
/// error moves it to [`Failed`](Self::Failed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    #[default]
    NotStarted,
    Extracting,
    Preprocessing,
    Training,
    Evaluating,
    /// All four stages succeeded.
    Completed,
    /// A stage returned an error.
    Failed,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Extracting => "extracting",
            Self::Preprocessing => "preprocessing",
            Self::Training => "training",
            Self::Evaluating => "evaluating",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Returns a human-readable name for the state.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::NotStarted => "Not Started",
            Self::Extracting => "Extracting Data",
            Self::Preprocessing => "Preprocessing Data",
            Self::Training => "Training Model",
            Self::Evaluating => "Evaluating Model",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        }
    }

    /// Overall progress when the state is entered (0.0 - 1.0).
    ///
    /// Training dominates the run time, so it gets the widest band.
    pub fn base_progress(&self) -> f32 {
        match self {
            Self::NotStarted => 0.0,
            Self::Extracting => 0.0,
            Self::Preprocessing => 0.10,
            Self::Training => 0.25,
            Self::Evaluating => 0.90,
            Self::Completed => 1.0,
            Self::Failed => 0.0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A progress update emitted on a state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// State just entered.
    pub state: PipelineState,

    /// Overall progress (0.0 - 1.0)
    pub progress: f32,

    /// Human-readable message describing the transition
    pub message: String,
}

impl ProgressUpdate {
    pub fn new(state: PipelineState, message: impl Into<String>) -> Self {
        Self {
            state,
            progress: state.base_progress(),
            message: message.into(),
        }
    }

    /// Creates a failed progress update.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(PipelineState::Failed, message)
    }
}

/// Trait for receiving progress updates from the driver.
///
/// Implementations must be `Send + Sync` so a pipeline can be moved to a
/// worker thread while its reporter is shared with the caller.
pub trait ProgressReporter: Send + Sync {
    /// Called once per state transition. Should return quickly.
    fn report(&self, update: ProgressUpdate);
}

/// Wrapper that implements [`ProgressReporter`] using a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    /// Creates a new closure-based progress reporter.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}
