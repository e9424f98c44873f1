//! Evaluator stage: score the persisted model on the test table.

use crate::error::{PipelineError, Result};
use crate::model::ModelArtifact;
use crate::table::{column_names, dense_column_values, feature_matrix, read_table, write_table};
use crate::tracking::RunContext;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Regression metrics of a model on one table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    /// Mean squared error. Lower is better.
    pub mse: f64,
    /// Mean absolute error. Lower is better.
    pub mae: f64,
    /// Coefficient of determination. 1.0 is a perfect fit; negative values
    /// are worse than predicting the mean.
    pub r2: f64,
}

impl RegressionMetrics {
    /// Compute the metrics of `predicted` against `actual`.
    ///
    /// When the actual values are constant, `r2` is 1.0 for a perfect fit
    /// and 0.0 otherwise.
    ///
    /// # Errors
    ///
    /// [`PipelineError::InsufficientData`] if the slices are empty or differ
    /// in length.
    pub fn compute(actual: &[f64], predicted: &[f64]) -> Result<Self> {
        if actual.is_empty() || actual.len() != predicted.len() {
            return Err(PipelineError::InsufficientData(format!(
                "cannot score {} predictions against {} targets",
                predicted.len(),
                actual.len()
            )));
        }

        let n = actual.len() as f64;
        let mean = actual.iter().sum::<f64>() / n;
        let (mut ss_res, mut abs_err, mut ss_tot) = (0.0, 0.0, 0.0);
        for (a, p) in actual.iter().zip(predicted) {
            ss_res += (a - p).powi(2);
            abs_err += (a - p).abs();
            ss_tot += (a - mean).powi(2);
        }

        let r2 = if ss_tot > 0.0 {
            1.0 - ss_res / ss_tot
        } else if ss_res == 0.0 {
            1.0
        } else {
            0.0
        };

        Ok(Self {
            mse: ss_res / n,
            mae: abs_err / n,
            r2,
        })
    }

    /// Metric names and values in file column order.
    pub fn entries(&self) -> [(&'static str, f64); 3] {
        [("mse", self.mse), ("mae", self.mae), ("r2", self.r2)]
    }

    /// Write a one-row table with columns `mse,mae,r2`.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut df = df![
            "mse" => [self.mse],
            "mae" => [self.mae],
            "r2" => [self.r2],
        ]?;
        write_table(&mut df, path)
    }

    /// Read a metrics file written by [`write_csv`](Self::write_csv).
    pub fn read_csv(path: &Path) -> Result<Self> {
        let df = read_table(path)?;
        let value = |name: &str| -> Result<f64> {
            dense_column_values(&df, name)?
                .first()
                .copied()
                .ok_or_else(|| PipelineError::EmptyInput(path.display().to_string()))
        };
        Ok(Self {
            mse: value("mse")?,
            mae: value("mae")?,
            r2: value("r2")?,
        })
    }
}

/// Score the model at `model_path` on `test_path`, write the metrics to
/// `metrics_path` and log each one.
///
/// # Errors
///
/// - [`PipelineError::ModelLoad`] if the artifact cannot be loaded
/// - [`PipelineError::MissingTargetColumn`] if the test table lacks the
///   model's target
/// - [`PipelineError::SchemaMismatch`] if the test features are not exactly
///   the model's features
/// - [`PipelineError::InsufficientData`] if the test table has no rows
pub fn evaluate(
    test_path: &Path,
    model_path: &Path,
    metrics_path: &Path,
    ctx: &mut RunContext,
) -> Result<RegressionMetrics> {
    info!("Evaluating {} on {}", model_path.display(), test_path.display());

    let artifact = ModelArtifact::load(model_path)?;
    let df = read_table(test_path)?;
    let target = &artifact.target_column;

    let columns = column_names(&df);
    if !columns.iter().any(|c| c == target) {
        return Err(PipelineError::MissingTargetColumn {
            column: target.clone(),
            path: test_path.display().to_string(),
        });
    }
    check_features(&artifact.feature_names, &columns, target)?;
    if df.height() == 0 {
        return Err(PipelineError::InsufficientData(format!(
            "'{}' has no rows to evaluate on",
            test_path.display()
        )));
    }

    let x = feature_matrix(&df, &artifact.feature_names)?;
    let actual = dense_column_values(&df, target)?;
    let predicted = artifact.predict(&x);
    debug!("Scored {} test rows", predicted.len());

    let metrics = RegressionMetrics::compute(&actual, &predicted)?;
    metrics.write_csv(metrics_path)?;
    for (name, value) in metrics.entries() {
        ctx.log_metric(name, value);
    }

    info!(
        "Evaluation metrics: mse={:.6} mae={:.6} r2={:.6}",
        metrics.mse, metrics.mae, metrics.r2
    );
    Ok(metrics)
}

/// Order-insensitive comparison of the test features against the model's.
fn check_features(model_features: &[String], columns: &[String], target: &str) -> Result<()> {
    let missing: Vec<String> = model_features
        .iter()
        .filter(|f| !columns.contains(f))
        .cloned()
        .collect();
    let unexpected: Vec<String> = columns
        .iter()
        .filter(|c| c.as_str() != target && !model_features.contains(c))
        .cloned()
        .collect();

    if missing.is_empty() && unexpected.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::SchemaMismatch { missing, unexpected })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ForestParams, RandomForestRegressor};
    use crate::tracking::{MemoryTracker, RunStatus};
    use pretty_assertions::assert_eq;
    use tempfile::{TempDir, tempdir};

    #[test]
    fn test_metrics_perfect_fit() {
        let actual = [1.0, 2.0, 3.0];
        let metrics = RegressionMetrics::compute(&actual, &actual).unwrap();
        assert_eq!(
            metrics,
            RegressionMetrics {
                mse: 0.0,
                mae: 0.0,
                r2: 1.0
            }
        );
    }

    #[test]
    fn test_metrics_known_values() {
        let metrics = RegressionMetrics::compute(&[1.0, 2.0, 3.0, 4.0], &[2.0, 2.0, 3.0, 2.0]).unwrap();
        assert!((metrics.mse - 1.25).abs() < 1e-12);
        assert!((metrics.mae - 0.75).abs() < 1e-12);
        // ss_tot = 5, ss_res = 5
        assert!(metrics.r2.abs() < 1e-12);
    }

    #[test]
    fn test_metrics_constant_targets() {
        let perfect = RegressionMetrics::compute(&[2.0, 2.0], &[2.0, 2.0]).unwrap();
        assert_eq!(perfect.r2, 1.0);

        let off = RegressionMetrics::compute(&[2.0, 2.0], &[1.0, 3.0]).unwrap();
        assert_eq!(off.r2, 0.0);
        assert_eq!(off.mse, 1.0);
    }

    #[test]
    fn test_metrics_reject_empty() {
        assert!(matches!(
            RegressionMetrics::compute(&[], &[]),
            Err(PipelineError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_metrics_file_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("metrics/eval_metrics.csv");
        let metrics = RegressionMetrics {
            mse: 0.25,
            mae: 0.5,
            r2: 0.75,
        };
        metrics.write_csv(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().next(), Some("mse,mae,r2"));
        assert_eq!(content.lines().count(), 2);
        assert_eq!(RegressionMetrics::read_csv(&path).unwrap(), metrics);
    }

    /// Model on `a,b` predicting `MedHouseVal = a + 2b`, saved under `dir`.
    fn fitted_model(dir: &TempDir) -> std::path::PathBuf {
        let x: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64, (i % 3) as f64]).collect();
        let y: Vec<f64> = x.iter().map(|r| r[0] + 2.0 * r[1]).collect();
        let forest = RandomForestRegressor::fit(
            &x,
            &y,
            ForestParams {
                n_estimators: 1,
                bootstrap: false,
                ..ForestParams::default()
            },
        )
        .unwrap();
        let path = dir.path().join("model.json");
        ModelArtifact::new("MedHouseVal", vec!["a".to_string(), "b".to_string()], forest)
            .save(&path)
            .unwrap();
        path
    }

    #[test]
    fn test_evaluate_perfect_model_with_reordered_columns() {
        let dir = tempdir().unwrap();
        let model_path = fitted_model(&dir);
        let test_path = dir.path().join("test.csv");
        let mut content = String::from("MedHouseVal,b,a\n");
        for i in 0..10 {
            content.push_str(&format!("{},{},{}\n", i + 2 * (i % 3), i % 3, i));
        }
        std::fs::write(&test_path, content).unwrap();

        let tracker = MemoryTracker::new();
        let mut ctx = RunContext::open(Box::new(tracker.clone()), "evaluate").unwrap();
        let metrics_path = dir.path().join("metrics.csv");
        let metrics = evaluate(&test_path, &model_path, &metrics_path, &mut ctx).unwrap();
        let run_id = ctx.run_id().to_string();
        ctx.close(RunStatus::Finished);

        assert_eq!(metrics.mse, 0.0);
        assert_eq!(metrics.mae, 0.0);
        assert_eq!(metrics.r2, 1.0);
        assert!(metrics_path.exists());

        let recorded = tracker.run(&run_id).unwrap();
        assert_eq!(recorded.metric("mse"), Some(0.0));
        assert_eq!(recorded.metric("mae"), Some(0.0));
        assert_eq!(recorded.metric("r2"), Some(1.0));
    }

    #[test]
    fn test_feature_mismatch_lists_both_sides() {
        let dir = tempdir().unwrap();
        let model_path = fitted_model(&dir);
        let test_path = dir.path().join("test.csv");
        std::fs::write(&test_path, "a,c,MedHouseVal\n1,2,3\n").unwrap();

        let mut ctx = RunContext::open(Box::new(MemoryTracker::new()), "evaluate").unwrap();
        let err = evaluate(&test_path, &model_path, &dir.path().join("m.csv"), &mut ctx).unwrap_err();
        match err {
            PipelineError::SchemaMismatch { missing, unexpected } => {
                assert_eq!(missing, vec!["b"]);
                assert_eq!(unexpected, vec!["c"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_target_and_missing_model() {
        let dir = tempdir().unwrap();
        let model_path = fitted_model(&dir);
        let test_path = dir.path().join("test.csv");
        std::fs::write(&test_path, "a,b\n1,2\n").unwrap();

        let mut ctx = RunContext::open(Box::new(MemoryTracker::new()), "evaluate").unwrap();
        let result = evaluate(&test_path, &model_path, &dir.path().join("m.csv"), &mut ctx);
        assert!(matches!(result, Err(PipelineError::MissingTargetColumn { .. })));

        let result = evaluate(
            &test_path,
            &dir.path().join("absent.json"),
            &dir.path().join("m.csv"),
            &mut ctx,
        );
        assert!(matches!(result, Err(PipelineError::ModelLoad { .. })));
    }

    #[test]
    fn test_header_only_test_table_is_insufficient() {
        let dir = tempdir().unwrap();
        let model_path = fitted_model(&dir);
        let test_path = dir.path().join("test.csv");
        std::fs::write(&test_path, "a,b,MedHouseVal\n").unwrap();

        let mut ctx = RunContext::open(Box::new(MemoryTracker::new()), "evaluate").unwrap();
        let result = evaluate(&test_path, &model_path, &dir.path().join("m.csv"), &mut ctx);
        assert!(matches!(result, Err(PipelineError::InsufficientData(_))));
    }
}
