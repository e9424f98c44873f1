//! Directory-backed tracking store.
//!
//! Layout (one directory per run, MLflow file-store style):
//!
//! ```text
//! <root>/<experiment>/<run_id>/
//!     meta.json              run id, name, status, start/end times
//!     params/<key>           parameter value as text
//!     metrics/<key>          one "<timestamp_ms> <value> <step>" line per log call
//!     artifacts/<file name>  copies of logged files
//! ```

use super::{RunStatus, TrackingBackend};
use crate::error::{PipelineError, Result, ResultExt};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Contents of `meta.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMeta {
    pub run_id: String,
    pub run_name: String,
    pub experiment: String,
    pub status: RunStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

/// Tracking backend writing to a local directory tree.
#[derive(Debug, Clone)]
pub struct FileTrackingStore {
    root: PathBuf,
    experiment: String,
}

impl FileTrackingStore {
    pub fn new(root: impl Into<PathBuf>, experiment: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            experiment: experiment.into(),
        }
    }

    /// Directory holding everything for `run_id`.
    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.root.join(&self.experiment).join(run_id)
    }

    /// Read back a run's metadata.
    pub fn read_meta(&self, run_id: &str) -> Result<RunMeta> {
        let text = fs::read_to_string(self.run_dir(run_id).join("meta.json"))
            .context(format!("Reading metadata of run '{}'", run_id))?;
        Ok(serde_json::from_str(&text)?)
    }

    fn write_meta(&self, meta: &RunMeta) -> Result<()> {
        let path = self.run_dir(&meta.run_id).join("meta.json");
        fs::write(&path, serde_json::to_string_pretty(meta)?)
            .context(format!("Writing '{}'", path.display()))?;
        Ok(())
    }

    fn existing_run_dir(&self, run_id: &str) -> Result<PathBuf> {
        let dir = self.run_dir(run_id);
        if !dir.join("meta.json").is_file() {
            return Err(PipelineError::Tracking(format!(
                "run '{}' does not exist under '{}'",
                run_id,
                self.root.display()
            )));
        }
        Ok(dir)
    }
}

/// Keys become file names, so they must not escape their directory.
fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && key != "."
        && key != ".."
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ' '));
    if valid {
        Ok(())
    } else {
        Err(PipelineError::Tracking(format!("invalid key '{}'", key)))
    }
}

impl TrackingBackend for FileTrackingStore {
    fn name(&self) -> &str {
        "file"
    }

    fn start_run(&mut self, run_id: &str, run_name: &str) -> Result<()> {
        let dir = self.run_dir(run_id);
        for sub in ["params", "metrics", "artifacts"] {
            fs::create_dir_all(dir.join(sub))
                .context(format!("Creating run directory '{}'", dir.display()))?;
        }

        self.write_meta(&RunMeta {
            run_id: run_id.to_string(),
            run_name: run_name.to_string(),
            experiment: self.experiment.clone(),
            status: RunStatus::Running,
            start_time: Utc::now(),
            end_time: None,
        })
    }

    fn log_param(&mut self, run_id: &str, key: &str, value: &str) -> Result<()> {
        validate_key(key)?;
        let path = self.existing_run_dir(run_id)?.join("params").join(key);

        // Params are write-once; re-logging the same value is a no-op.
        if let Ok(existing) = fs::read_to_string(&path) {
            if existing == value {
                return Ok(());
            }
            return Err(PipelineError::Tracking(format!(
                "param '{}' already logged with value '{}'",
                key, existing
            )));
        }

        fs::write(&path, value).context(format!("Writing param '{}'", key))?;
        Ok(())
    }

    fn log_metric(&mut self, run_id: &str, key: &str, value: f64, timestamp_ms: i64) -> Result<()> {
        validate_key(key)?;
        let path = self.existing_run_dir(run_id)?.join("metrics").join(key);

        let step = fs::read_to_string(&path)
            .map(|text| text.lines().count())
            .unwrap_or(0);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .context(format!("Opening metric '{}'", key))?;
        writeln!(file, "{} {} {}", timestamp_ms, value, step)
            .context(format!("Writing metric '{}'", key))?;
        Ok(())
    }

    fn log_artifact(&mut self, run_id: &str, path: &Path) -> Result<()> {
        let file_name = path.file_name().ok_or_else(|| {
            PipelineError::Tracking(format!("artifact '{}' has no file name", path.display()))
        })?;
        let dest = self
            .existing_run_dir(run_id)?
            .join("artifacts")
            .join(file_name);

        fs::copy(path, &dest).context(format!("Copying artifact '{}'", path.display()))?;
        debug!("Stored artifact {} -> {}", path.display(), dest.display());
        Ok(())
    }

    fn end_run(&mut self, run_id: &str, status: RunStatus) -> Result<()> {
        self.existing_run_dir(run_id)?;
        let mut meta = self.read_meta(run_id)?;
        meta.status = status;
        meta.end_time = Some(Utc::now());
        self.write_meta(&meta)
    }
}
