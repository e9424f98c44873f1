//! Housing Price Pipeline Library
//!
//! A four-stage batch pipeline for regression on tabular data, built with
//! Rust and Polars.
//!
//! # Overview
//!
//! One run moves a dataset through these stages, in order:
//!
//! - **Extract**: Fetch the raw table from a local path or an http(s) URL
//! - **Preprocess**: Mean-impute and standardize numeric columns, then split
//!   into train and test tables with a seeded shuffle
//! - **Train**: Fit a random forest regressor and persist it as JSON
//! - **Evaluate**: Score the persisted model on the test table (MSE, MAE, R²)
//!
//! When the configured source is a local file that does not exist yet, the
//! CLI first bootstraps it with [`fetch_california_housing`].
//!
//! Parameters, metrics and artifacts of every run are recorded through a
//! [`RunContext`] on a pluggable [`TrackingBackend`].
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use housing_pipeline::{FileTrackingStore, Pipeline, PipelineConfig};
//!
//! let config = PipelineConfig::builder()
//!     .source("https://example.org/housing.csv")
//!     .n_estimators(100)
//!     .build()?;
//!
//! let summary = Pipeline::builder()
//!     .config(config)
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .run(Box::new(FileTrackingStore::new("mlruns", "Default")))?;
//!
//! println!("mse={} mae={} r2={}", summary.metrics.mse, summary.metrics.mae, summary.metrics.r2);
//! ```
//!
//! # Running stages individually
//!
//! Each stage is a plain function over file paths and a run context, so
//! stages can be run on their own:
//!
//! ```rust,ignore
//! use housing_pipeline::{MemoryTracker, RunContext, RunStatus, TrainOptions, train};
//! use std::path::Path;
//!
//! let mut ctx = RunContext::open(Box::new(MemoryTracker::new()), "train_only")?;
//! train(Path::new("data/train.csv"), Path::new("models/model.json"), &TrainOptions::default(), &mut ctx)?;
//! ctx.close(RunStatus::Finished);
//! ```

pub mod config;
pub mod dataset;
pub mod error;
pub mod evaluate;
pub mod extract;
pub mod model;
pub mod pipeline;
pub mod preprocess;
pub mod table;
pub mod tracking;
pub mod train;

// Re-exports for convenient access
pub use config::{
    ConfigValidationError, DEFAULT_TARGET_COLUMN, PipelineConfig, PipelineConfigBuilder, PipelinePaths,
    StatisticsScope,
};
pub use dataset::{CALIFORNIA_HOUSING_URL, fetch_california_housing};
pub use error::{PipelineError, Result, ResultExt};
pub use evaluate::{RegressionMetrics, evaluate};
pub use extract::{DatasetSource, ExtractReport, extract};
pub use model::{DecisionTreeRegressor, ForestParams, ModelArtifact, RandomForestRegressor};
pub use pipeline::{
    ClosureProgressReporter, Pipeline, PipelineBuilder, PipelineState, ProgressReporter, ProgressUpdate,
    RunSummary,
};
pub use preprocess::{PreprocessOptions, PreprocessReport, preprocess};
pub use tracking::{FileTrackingStore, MemoryTracker, RecordedRun, RunContext, RunStatus, TrackingBackend};
pub use train::{TrainOptions, TrainReport, train};
