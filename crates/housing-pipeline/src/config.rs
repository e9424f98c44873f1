//! Configuration types for the pipeline.
//!
//! [`PipelineConfig`] enumerates every recognized option. Use
//! [`PipelineConfig::builder()`] for a validated configuration, or
//! [`PipelineConfig::from_json_file`] to load one from disk.

use crate::model::ForestParams;
use crate::preprocess::PreprocessOptions;
use crate::train::TrainOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default name of the regression label.
pub const DEFAULT_TARGET_COLUMN: &str = "MedHouseVal";

/// Where preprocessing statistics (imputation means, scaling) are fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StatisticsScope {
    /// Fit on the whole table before splitting (test rows leak into the
    /// statistics applied to the train rows).
    #[default]
    FullTable,
    /// Fit on the train rows only, then apply to both partitions.
    TrainOnly,
}

impl StatisticsScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatisticsScope::FullTable => "full_table",
            StatisticsScope::TrainOnly => "train_only",
        }
    }
}

/// File layout used by the driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelinePaths {
    pub raw_data: PathBuf,
    pub train: PathBuf,
    pub test: PathBuf,
    pub model: PathBuf,
    pub metrics: PathBuf,
}

impl Default for PipelinePaths {
    fn default() -> Self {
        Self {
            raw_data: PathBuf::from("data/raw_data.csv"),
            train: PathBuf::from("data/train.csv"),
            test: PathBuf::from("data/test.csv"),
            model: PathBuf::from("models/random_forest_model.json"),
            metrics: PathBuf::from("metrics/eval_metrics.csv"),
        }
    }
}

impl PipelinePaths {
    /// Resolve every path against `root`.
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let defaults = Self::default();
        Self {
            raw_data: root.join(defaults.raw_data),
            train: root.join(defaults.train),
            test: root.join(defaults.test),
            model: root.join(defaults.model),
            metrics: root.join(defaults.metrics),
        }
    }

    /// Parent directories that must exist before any stage runs.
    pub fn output_dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = Vec::new();
        for path in [
            &self.raw_data,
            &self.train,
            &self.test,
            &self.model,
            &self.metrics,
        ] {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
                && !dirs.iter().any(|d| d == parent)
            {
                dirs.push(parent.to_path_buf());
            }
        }
        dirs
    }
}

/// Configuration for one pipeline run.
///
/// # Example
///
/// ```rust,ignore
/// use housing_pipeline::{PipelineConfig, StatisticsScope};
///
/// let config = PipelineConfig::builder()
///     .test_fraction(0.25)
///     .split_seed(7)
///     .statistics_scope(StatisticsScope::TrainOnly)
///     .build()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Dataset source: a local path or an http(s) URL.
    /// Default: "data/raw_data.csv"
    pub source: String,

    /// Fraction of rows held out for evaluation, exclusive range (0.0, 1.0).
    /// Default: 0.2
    pub test_fraction: f64,

    /// Seed for the train/test shuffle.
    /// Default: 42
    pub split_seed: u64,

    /// Number of trees in the forest.
    /// Default: 100
    pub n_estimators: usize,

    /// Seed for bootstrap sampling during fitting.
    /// Default: 42
    pub train_seed: u64,

    /// Where preprocessing statistics are computed.
    /// Default: FullTable
    pub statistics_scope: StatisticsScope,

    /// Regression label.
    /// Default: "MedHouseVal"
    pub target_column: String,

    /// Maximum tree depth, `None` grows trees until leaves are pure.
    /// Default: None
    pub max_depth: Option<usize>,

    /// Minimum rows in a leaf.
    /// Default: 1
    pub min_samples_leaf: usize,

    /// Whether the Trainer registers the model file as an artifact.
    /// Default: true
    pub log_model_artifact: bool,

    /// File layout.
    pub paths: PipelinePaths,

    /// Name recorded for the tracked run.
    /// Default: "ml_pipeline_run"
    pub run_name: String,

    /// Experiment the run is filed under.
    /// Default: "Default"
    pub experiment: String,

    /// Root directory of the file tracking store.
    /// Default: "mlruns"
    pub tracking_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source: "data/raw_data.csv".to_string(),
            test_fraction: 0.2,
            split_seed: 42,
            n_estimators: 100,
            train_seed: 42,
            statistics_scope: StatisticsScope::default(),
            target_column: DEFAULT_TARGET_COLUMN.to_string(),
            max_depth: None,
            min_samples_leaf: 1,
            log_model_artifact: true,
            paths: PipelinePaths::default(),
            run_name: "ml_pipeline_run".to_string(),
            experiment: "Default".to_string(),
            tracking_dir: PathBuf::from("mlruns"),
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Load a configuration from a JSON file. Missing keys take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> crate::error::Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: PipelineConfig = serde_json::from_str(&text)?;
        config
            .validate()
            .map_err(|e| crate::error::PipelineError::InvalidConfig(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(ConfigValidationError::InvalidTestFraction(self.test_fraction));
        }

        if self.n_estimators == 0 {
            return Err(ConfigValidationError::InvalidEstimators(self.n_estimators));
        }

        if self.min_samples_leaf == 0 {
            return Err(ConfigValidationError::InvalidMinSamplesLeaf(
                self.min_samples_leaf,
            ));
        }

        if self.max_depth == Some(0) {
            return Err(ConfigValidationError::InvalidMaxDepth);
        }

        if self.target_column.trim().is_empty() {
            return Err(ConfigValidationError::EmptyField("target_column"));
        }

        if self.source.trim().is_empty() {
            return Err(ConfigValidationError::EmptyField("source"));
        }

        Ok(())
    }

    /// Options handed to the Preprocessor stage.
    pub fn preprocess_options(&self) -> PreprocessOptions {
        PreprocessOptions {
            test_fraction: self.test_fraction,
            seed: self.split_seed,
            statistics_scope: self.statistics_scope,
        }
    }

    /// Options handed to the Trainer stage.
    pub fn train_options(&self) -> TrainOptions {
        TrainOptions {
            target_column: self.target_column.clone(),
            forest: ForestParams {
                n_estimators: self.n_estimators,
                random_state: self.train_seed,
                max_depth: self.max_depth,
                min_samples_leaf: self.min_samples_leaf,
                ..ForestParams::default()
            },
            log_model_artifact: self.log_model_artifact,
        }
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid test fraction: {0} (must be strictly between 0.0 and 1.0)")]
    InvalidTestFraction(f64),

    #[error("Invalid n_estimators: {0} (must be at least 1)")]
    InvalidEstimators(usize),

    #[error("Invalid min_samples_leaf: {0} (must be at least 1)")]
    InvalidMinSamplesLeaf(usize),

    #[error("Invalid max_depth: 0 (use None for unlimited depth)")]
    InvalidMaxDepth,

    #[error("'{0}' must not be empty")]
    EmptyField(&'static str),
}

/// Builder for [`PipelineConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    source: Option<String>,
    test_fraction: Option<f64>,
    split_seed: Option<u64>,
    n_estimators: Option<usize>,
    train_seed: Option<u64>,
    statistics_scope: Option<StatisticsScope>,
    target_column: Option<String>,
    max_depth: Option<usize>,
    min_samples_leaf: Option<usize>,
    log_model_artifact: Option<bool>,
    paths: Option<PipelinePaths>,
    run_name: Option<String>,
    experiment: Option<String>,
    tracking_dir: Option<PathBuf>,
}

impl PipelineConfigBuilder {
    /// Set the dataset source (local path or http(s) URL).
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Set the held-out fraction.
    ///
    /// # Arguments
    /// * `fraction` - Value strictly between 0.0 and 1.0 (e.g., 0.2 = 20% test rows)
    pub fn test_fraction(mut self, fraction: f64) -> Self {
        self.test_fraction = Some(fraction);
        self
    }

    /// Set the seed for the train/test shuffle.
    pub fn split_seed(mut self, seed: u64) -> Self {
        self.split_seed = Some(seed);
        self
    }

    /// Set the number of trees.
    pub fn n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = Some(n);
        self
    }

    /// Set the seed used while fitting the forest.
    pub fn train_seed(mut self, seed: u64) -> Self {
        self.train_seed = Some(seed);
        self
    }

    /// Choose where preprocessing statistics are fit.
    pub fn statistics_scope(mut self, scope: StatisticsScope) -> Self {
        self.statistics_scope = Some(scope);
        self
    }

    /// Set the regression label.
    pub fn target_column(mut self, column: impl Into<String>) -> Self {
        self.target_column = Some(column.into());
        self
    }

    /// Limit tree depth.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set the minimum number of rows per leaf.
    pub fn min_samples_leaf(mut self, n: usize) -> Self {
        self.min_samples_leaf = Some(n);
        self
    }

    /// Enable or disable registering the model file as an artifact.
    pub fn log_model_artifact(mut self, log: bool) -> Self {
        self.log_model_artifact = Some(log);
        self
    }

    /// Override the file layout.
    pub fn paths(mut self, paths: PipelinePaths) -> Self {
        self.paths = Some(paths);
        self
    }

    /// Set the tracked run name.
    pub fn run_name(mut self, name: impl Into<String>) -> Self {
        self.run_name = Some(name.into());
        self
    }

    /// Set the experiment name.
    pub fn experiment(mut self, name: impl Into<String>) -> Self {
        self.experiment = Some(name.into());
        self
    }

    /// Set the root of the file tracking store.
    pub fn tracking_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.tracking_dir = Some(path.into());
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `PipelineConfig` or an error if validation fails.
    pub fn build(self) -> Result<PipelineConfig, ConfigValidationError> {
        let defaults = PipelineConfig::default();
        let config = PipelineConfig {
            source: self.source.unwrap_or(defaults.source),
            test_fraction: self.test_fraction.unwrap_or(defaults.test_fraction),
            split_seed: self.split_seed.unwrap_or(defaults.split_seed),
            n_estimators: self.n_estimators.unwrap_or(defaults.n_estimators),
            train_seed: self.train_seed.unwrap_or(defaults.train_seed),
            statistics_scope: self.statistics_scope.unwrap_or_default(),
            target_column: self.target_column.unwrap_or(defaults.target_column),
            max_depth: self.max_depth.or(defaults.max_depth),
            min_samples_leaf: self.min_samples_leaf.unwrap_or(defaults.min_samples_leaf),
            log_model_artifact: self
                .log_model_artifact
                .unwrap_or(defaults.log_model_artifact),
            paths: self.paths.unwrap_or(defaults.paths),
            run_name: self.run_name.unwrap_or(defaults.run_name),
            experiment: self.experiment.unwrap_or(defaults.experiment),
            tracking_dir: self.tracking_dir.unwrap_or(defaults.tracking_dir),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.test_fraction, 0.2);
        assert_eq!(config.split_seed, 42);
        assert_eq!(config.n_estimators, 100);
        assert_eq!(config.train_seed, 42);
        assert_eq!(config.statistics_scope, StatisticsScope::FullTable);
        assert_eq!(config.target_column, "MedHouseVal");
        assert!(config.log_model_artifact);
    }

    #[test]
    fn test_builder_custom_values() {
        let config = PipelineConfig::builder()
            .test_fraction(0.3)
            .split_seed(7)
            .n_estimators(10)
            .train_seed(9)
            .statistics_scope(StatisticsScope::TrainOnly)
            .max_depth(6)
            .build()
            .unwrap();

        assert_eq!(config.test_fraction, 0.3);
        assert_eq!(config.split_seed, 7);
        assert_eq!(config.n_estimators, 10);
        assert_eq!(config.train_seed, 9);
        assert_eq!(config.statistics_scope, StatisticsScope::TrainOnly);
        assert_eq!(config.max_depth, Some(6));
    }

    #[test]
    fn test_validation_rejects_fraction_bounds() {
        for fraction in [0.0, 1.0, -0.1, 1.5, f64::NAN] {
            let result = PipelineConfig::builder().test_fraction(fraction).build();
            assert!(matches!(
                result,
                Err(ConfigValidationError::InvalidTestFraction(_))
            ));
        }
    }

    #[test]
    fn test_validation_rejects_zero_estimators() {
        let result = PipelineConfig::builder().n_estimators(0).build();
        assert!(matches!(
            result,
            Err(ConfigValidationError::InvalidEstimators(0))
        ));
    }

    #[test]
    fn test_validation_rejects_empty_target() {
        let result = PipelineConfig::builder().target_column("  ").build();
        assert!(matches!(
            result,
            Err(ConfigValidationError::EmptyField("target_column"))
        ));
    }

    #[test]
    fn test_config_from_partial_json() {
        let json = r#"{
            "test_fraction": 0.25,
            "statistics_scope": "train_only",
            "paths": { "model": "out/model.json" }
        }"#;

        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.test_fraction, 0.25);
        assert_eq!(config.statistics_scope, StatisticsScope::TrainOnly);
        assert_eq!(config.paths.model, PathBuf::from("out/model.json"));
        // untouched keys keep their defaults
        assert_eq!(config.paths.train, PathBuf::from("data/train.csv"));
        assert_eq!(config.n_estimators, 100);
    }

    #[test]
    fn test_paths_under_root_and_output_dirs() {
        let paths = PipelinePaths::under("/tmp/run");
        assert_eq!(paths.train, PathBuf::from("/tmp/run/data/train.csv"));

        let dirs = paths.output_dirs();
        assert_eq!(dirs.len(), 3);
        assert!(dirs.contains(&PathBuf::from("/tmp/run/data")));
        assert!(dirs.contains(&PathBuf::from("/tmp/run/models")));
        assert!(dirs.contains(&PathBuf::from("/tmp/run/metrics")));
    }

    #[test]
    fn test_stage_options_follow_config() {
        let config = PipelineConfig::builder()
            .n_estimators(5)
            .train_seed(3)
            .build()
            .unwrap();

        let train = config.train_options();
        assert_eq!(train.forest.n_estimators, 5);
        assert_eq!(train.forest.random_state, 3);
        assert_eq!(train.target_column, "MedHouseVal");

        let preprocess = config.preprocess_options();
        assert_eq!(preprocess.seed, 42);
        assert_eq!(preprocess.test_fraction, 0.2);
    }
}
