//! Regression model and its on-disk artifact.
//!
//! The artifact is a single JSON document. Besides the fitted trees it
//! records the target column and the ordered feature names, so the
//! Evaluator can select the right columns from a test table without any
//! other input.

pub mod forest;
pub mod tree;

pub use forest::{ForestParams, RandomForestRegressor};
pub use tree::{DecisionTreeRegressor, TreeParams};

use crate::error::{PipelineError, Result, ResultExt};
use crate::table::ensure_parent_dir;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Version written into every artifact; loading any other version fails.
pub const MODEL_FORMAT_VERSION: u32 = 1;

/// Model family stored in the artifact.
pub const MODEL_KIND: &str = "random_forest_regressor";

/// A fitted model together with the schema it was trained on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub kind: String,
    pub target_column: String,
    /// Feature columns in the order the trees index them.
    pub feature_names: Vec<String>,
    pub forest: RandomForestRegressor,
}

impl ModelArtifact {
    pub fn new(target_column: impl Into<String>, feature_names: Vec<String>, forest: RandomForestRegressor) -> Self {
        Self {
            format_version: MODEL_FORMAT_VERSION,
            kind: MODEL_KIND.to_string(),
            target_column: target_column.into(),
            feature_names,
            forest,
        }
    }

    /// Predict every row of a row-major matrix laid out in `feature_names` order.
    pub fn predict(&self, x: &[Vec<f64>]) -> Vec<f64> {
        self.forest.predict(x)
    }

    /// Write the artifact as JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        ensure_parent_dir(path)?;
        let file = File::create(path).context(format!("Creating model file '{}'", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self)?;
        writer
            .flush()
            .context(format!("Writing model file '{}'", path.display()))?;
        Ok(())
    }

    /// Read and validate an artifact.
    ///
    /// # Errors
    ///
    /// [`PipelineError::ModelLoad`] if the file is missing or unreadable, is
    /// not a valid artifact, has an unsupported format version, or its trees
    /// reference features it does not declare.
    pub fn load(path: &Path) -> Result<Self> {
        let load_error = |reason: String| PipelineError::ModelLoad {
            path: path.display().to_string(),
            reason,
        };

        let file = File::open(path).map_err(|e| load_error(e.to_string()))?;
        let artifact: ModelArtifact =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| load_error(e.to_string()))?;

        if artifact.format_version != MODEL_FORMAT_VERSION {
            return Err(load_error(format!(
                "unsupported format version {} (expected {})",
                artifact.format_version, MODEL_FORMAT_VERSION
            )));
        }
        if artifact.kind != MODEL_KIND {
            return Err(load_error(format!("unsupported model kind '{}'", artifact.kind)));
        }
        artifact
            .forest
            .validate(artifact.feature_names.len())
            .map_err(load_error)?;

        Ok(artifact)
    }
}
