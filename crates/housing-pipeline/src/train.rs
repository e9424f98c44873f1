//! Trainer stage: fit a random forest on the train table and persist it.

use crate::config::DEFAULT_TARGET_COLUMN;
use crate::error::{PipelineError, Result};
use crate::model::{ForestParams, ModelArtifact, RandomForestRegressor};
use crate::table::{column_names, dense_column_values, feature_matrix, read_table};
use crate::tracking::RunContext;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Options for [`train`].
#[derive(Debug, Clone, PartialEq)]
pub struct TrainOptions {
    /// Column to predict; every other column is a feature.
    pub target_column: String,
    pub forest: ForestParams,
    /// Register the model file with the tracker.
    pub log_model_artifact: bool,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            target_column: DEFAULT_TARGET_COLUMN.to_string(),
            forest: ForestParams::default(),
            log_model_artifact: true,
        }
    }
}

/// Summary of a training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainReport {
    pub rows: usize,
    pub feature_names: Vec<String>,
    pub n_estimators: usize,
    pub training_time_ms: u64,
}

/// Fit a forest on `train_path` and write the artifact to `model_path`.
///
/// Logs `n_estimators` and `model_random_state` as params, and the model
/// file as an artifact when `options.log_model_artifact` is set.
///
/// # Errors
///
/// - [`PipelineError::MissingTargetColumn`] if the target is absent
/// - [`PipelineError::InsufficientData`] if the table has no rows, or the
///   file is empty
/// - [`PipelineError::Schema`] if a feature is non-numeric or a value is
///   missing
///
/// No model file is written when an error is returned.
pub fn train(train_path: &Path, model_path: &Path, options: &TrainOptions, ctx: &mut RunContext) -> Result<TrainReport> {
    info!("Training model on {}", train_path.display());
    options.forest.validate()?;

    let df = read_table(train_path).map_err(|e| match e {
        PipelineError::EmptyInput(path) => {
            PipelineError::InsufficientData(format!("'{}' is empty", path))
        }
        other => other,
    })?;
    let target = &options.target_column;
    let columns = column_names(&df);
    if !columns.iter().any(|c| c == target) {
        return Err(PipelineError::MissingTargetColumn {
            column: target.clone(),
            path: train_path.display().to_string(),
        });
    }
    if df.height() == 0 {
        return Err(PipelineError::InsufficientData(format!(
            "'{}' has no rows to train on",
            train_path.display()
        )));
    }

    let feature_names: Vec<String> = columns.into_iter().filter(|c| c != target).collect();
    debug!("Features: {:?}", feature_names);
    let x = feature_matrix(&df, &feature_names)?;
    let y = dense_column_values(&df, target)?;

    let start = Instant::now();
    let forest = RandomForestRegressor::fit(&x, &y, options.forest.clone())?;
    let training_time_ms = start.elapsed().as_millis() as u64;

    let artifact = ModelArtifact::new(target.clone(), feature_names, forest);
    artifact.save(model_path)?;

    ctx.log_param("n_estimators", options.forest.n_estimators);
    ctx.log_param("model_random_state", options.forest.random_state);
    if options.log_model_artifact {
        ctx.log_artifact(model_path);
    }

    info!(
        "Model trained on {} rows in {}ms and saved to {}",
        df.height(),
        training_time_ms,
        model_path.display()
    );
    Ok(TrainReport {
        rows: df.height(),
        feature_names: artifact.feature_names,
        n_estimators: options.forest.n_estimators,
        training_time_ms,
    })
}
