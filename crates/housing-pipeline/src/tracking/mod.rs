//! Experiment tracking.
//!
//! A [`RunContext`] is the handle one pipeline execution logs through. It is
//! passed explicitly to every stage and is closed exactly once: either by
//! [`RunContext::close`] or, if the owner never gets that far, by `Drop`,
//! which records the run as failed.
//!
//! Logging calls are fire-and-forget. A backend that fails to record a
//! parameter, metric or artifact produces a warning, never a pipeline error.
//!
//! # Backends
//!
//! - [`FileTrackingStore`] - MLflow-style directory layout on disk
//! - [`MemoryTracker`] - in-process recorder, mostly for tests
//!
//! To add another backend (e.g. a remote tracking server), implement
//! [`TrackingBackend`].

mod file_store;
mod memory;

pub use file_store::FileTrackingStore;
pub use memory::{MemoryTracker, RecordedRun};

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::path::Path;
use tracing::{debug, info, warn};

/// Lifecycle status of a tracked run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Running,
    Finished,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "RUNNING",
            RunStatus::Finished => "FINISHED",
            RunStatus::Failed => "FAILED",
        }
    }
}

/// Storage behind a [`RunContext`].
pub trait TrackingBackend: Send {
    /// Human-readable backend name for logs.
    fn name(&self) -> &str;

    /// Register a new run.
    fn start_run(&mut self, run_id: &str, run_name: &str) -> Result<()>;

    /// Record a parameter value.
    fn log_param(&mut self, run_id: &str, key: &str, value: &str) -> Result<()>;

    /// Record a metric value at a timestamp (milliseconds since epoch).
    fn log_metric(&mut self, run_id: &str, key: &str, value: f64, timestamp_ms: i64)
    -> Result<()>;

    /// Store a copy of (or reference to) a file.
    fn log_artifact(&mut self, run_id: &str, path: &Path) -> Result<()>;

    /// Mark the run terminated with the given status.
    fn end_run(&mut self, run_id: &str, status: RunStatus) -> Result<()>;
}

/// Tracking handle for one pipeline execution.
pub struct RunContext {
    backend: Box<dyn TrackingBackend>,
    run_id: String,
    run_name: String,
    closed: bool,
}

static_assertions::assert_impl_all!(RunContext: Send);

impl RunContext {
    /// Open a new run on `backend`.
    ///
    /// Unlike the logging calls, failing to start the run is an error: there
    /// would be nothing to attach parameters and metrics to.
    pub fn open(mut backend: Box<dyn TrackingBackend>, run_name: impl Into<String>) -> Result<Self> {
        let run_name = run_name.into();
        let run_id = uuid::Uuid::new_v4().simple().to_string();

        backend
            .start_run(&run_id, &run_name)
            .map_err(|e| PipelineError::Tracking(format!("failed to start run: {}", e)))?;

        info!(
            "Opened run '{}' ({}) on {} backend",
            run_name,
            run_id,
            backend.name()
        );

        Ok(Self {
            backend,
            run_id,
            run_name,
            closed: false,
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn run_name(&self) -> &str {
        &self.run_name
    }

    /// Record a parameter.
    pub fn log_param(&mut self, key: &str, value: impl Display) {
        let value = value.to_string();
        debug!("param {} = {}", key, value);
        if let Err(e) = self.backend.log_param(&self.run_id, key, &value) {
            warn!("Failed to log param '{}': {}", key, e);
        }
    }

    /// Record a metric.
    pub fn log_metric(&mut self, key: &str, value: f64) {
        debug!("metric {} = {}", key, value);
        let timestamp_ms = chrono::Utc::now().timestamp_millis();
        if let Err(e) = self
            .backend
            .log_metric(&self.run_id, key, value, timestamp_ms)
        {
            warn!("Failed to log metric '{}': {}", key, e);
        }
    }

    /// Register a file as an artifact of this run.
    pub fn log_artifact(&mut self, path: &Path) {
        debug!("artifact {}", path.display());
        if let Err(e) = self.backend.log_artifact(&self.run_id, path) {
            warn!("Failed to log artifact '{}': {}", path.display(), e);
        }
    }

    /// Close the run with a terminal status.
    pub fn close(mut self, status: RunStatus) {
        self.finish(status);
    }

    fn finish(&mut self, status: RunStatus) {
        if self.closed {
            return;
        }
        self.closed = true;
        match self.backend.end_run(&self.run_id, status) {
            Ok(()) => info!("Closed run {} with status {}", self.run_id, status.as_str()),
            Err(e) => warn!("Failed to close run {}: {}", self.run_id, e),
        }
    }
}

impl Drop for RunContext {
    fn drop(&mut self) {
        if !self.closed {
            warn!("Run {} dropped while open, marking it failed", self.run_id);
            self.finish(RunStatus::Failed);
        }
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("run_id", &self.run_id)
            .field("run_name", &self.run_name)
            .field("backend", &self.backend.name())
            .field("closed", &self.closed)
            .finish()
    }
}
