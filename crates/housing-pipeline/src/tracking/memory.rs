//! In-memory tracking backend.

use super::{RunStatus, TrackingBackend};
use crate::error::{PipelineError, Result};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Everything logged for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRun {
    pub run_id: String,
    pub run_name: String,
    pub status: RunStatus,
    pub params: BTreeMap<String, String>,
    /// Metric history per key, in logging order.
    pub metrics: BTreeMap<String, Vec<f64>>,
    pub artifacts: Vec<PathBuf>,
}

impl RecordedRun {
    /// Most recent value of a metric.
    pub fn metric(&self, key: &str) -> Option<f64> {
        self.metrics.get(key).and_then(|values| values.last().copied())
    }
}

/// Recorder that keeps runs in memory.
///
/// Clones share state, so a test can hand one clone to the pipeline and
/// inspect the other afterwards.
#[derive(Debug, Clone, Default)]
pub struct MemoryTracker {
    runs: Arc<Mutex<Vec<RecordedRun>>>,
}

impl MemoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a run by id.
    pub fn run(&self, run_id: &str) -> Option<RecordedRun> {
        self.runs.lock().iter().find(|r| r.run_id == run_id).cloned()
    }

    /// Snapshot of all runs in start order.
    pub fn runs(&self) -> Vec<RecordedRun> {
        self.runs.lock().clone()
    }

    fn with_run<T>(&self, run_id: &str, f: impl FnOnce(&mut RecordedRun) -> T) -> Result<T> {
        let mut runs = self.runs.lock();
        let run = runs
            .iter_mut()
            .find(|r| r.run_id == run_id)
            .ok_or_else(|| PipelineError::Tracking(format!("unknown run '{}'", run_id)))?;
        if run.status != RunStatus::Running {
            return Err(PipelineError::Tracking(format!(
                "run '{}' is already {}",
                run_id,
                run.status.as_str()
            )));
        }
        Ok(f(run))
    }
}

impl TrackingBackend for MemoryTracker {
    fn name(&self) -> &str {
        "memory"
    }

    fn start_run(&mut self, run_id: &str, run_name: &str) -> Result<()> {
        self.runs.lock().push(RecordedRun {
            run_id: run_id.to_string(),
            run_name: run_name.to_string(),
            status: RunStatus::Running,
            params: BTreeMap::new(),
            metrics: BTreeMap::new(),
            artifacts: Vec::new(),
        });
        Ok(())
    }

    fn log_param(&mut self, run_id: &str, key: &str, value: &str) -> Result<()> {
        self.with_run(run_id, |run| {
            run.params.insert(key.to_string(), value.to_string());
        })
    }

    fn log_metric(&mut self, run_id: &str, key: &str, value: f64, _timestamp_ms: i64) -> Result<()> {
        self.with_run(run_id, |run| {
            run.metrics.entry(key.to_string()).or_default().push(value);
        })
    }

    fn log_artifact(&mut self, run_id: &str, path: &Path) -> Result<()> {
        self.with_run(run_id, |run| run.artifacts.push(path.to_path_buf()))
    }

    fn end_run(&mut self, run_id: &str, status: RunStatus) -> Result<()> {
        self.with_run(run_id, |run| run.status = status)
    }
}
