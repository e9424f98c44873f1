//! Linear driver running the four stages under one tracked run.

use super::progress::{ClosureProgressReporter, PipelineState, ProgressReporter, ProgressUpdate};
use crate::config::{ConfigValidationError, PipelineConfig};
use crate::error::{PipelineError, Result, ResultExt};
use crate::evaluate::{RegressionMetrics, evaluate};
use crate::extract::{DatasetSource, extract};
use crate::preprocess::preprocess;
use crate::tracking::{RunContext, RunStatus, TrackingBackend};
use crate::train::train;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub final_state: PipelineState,
    pub metrics: RegressionMetrics,
    /// Every state entered, starting with `NotStarted`.
    pub transitions: Vec<PipelineState>,
    pub duration_ms: u64,
}

/// The extract → preprocess → train → evaluate pipeline.
///
/// Stages run strictly in order with no retry; the first error stops the
/// run, marks it failed in the tracker and is returned unchanged.
///
/// # Example
///
/// ```rust,ignore
/// use housing_pipeline::{FileTrackingStore, Pipeline, PipelineConfig};
///
/// let config = PipelineConfig::builder().n_estimators(50).build()?;
/// let mut pipeline = Pipeline::builder().config(config).build()?;
/// let summary = pipeline.run(Box::new(FileTrackingStore::new("mlruns", "Default")))?;
/// println!("mse = {}", summary.metrics.mse);
/// ```
pub struct Pipeline {
    config: PipelineConfig,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    state: PipelineState,
    transitions: Vec<PipelineState>,
}

// Ensure Pipeline is Send (can be moved to another thread)
static_assertions::assert_impl_all!(Pipeline: Send);

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field(
                "progress_reporter",
                &self.progress_reporter.as_ref().map(|_| "<reporter>"),
            )
            .field("state", &self.state)
            .finish()
    }
}

impl Pipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// State the driver is in; `Completed` or `Failed` after [`run`](Self::run).
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// States entered during the last run, in order.
    pub fn transitions(&self) -> &[PipelineState] {
        &self.transitions
    }

    /// Run all four stages once, recording to `backend`.
    ///
    /// Creates the parent directories of every output path, opens a run
    /// named after `config.run_name`, and closes it as finished or failed.
    ///
    /// # Errors
    ///
    /// The first stage error, unchanged. The run is closed as failed and
    /// the driver ends in [`PipelineState::Failed`].
    pub fn run(&mut self, backend: Box<dyn TrackingBackend>) -> Result<RunSummary> {
        let start = Instant::now();
        if self.state.is_terminal() {
            debug!("Resetting pipeline after a run that ended {}", self.state);
        }
        self.state = PipelineState::NotStarted;
        self.transitions = vec![PipelineState::NotStarted];

        info!("Starting pipeline run '{}'", self.config.run_name);

        let mut ctx = match self.prepare(backend) {
            Ok(ctx) => ctx,
            Err(e) => return Err(self.fail(e)),
        };

        match self.run_stages(&mut ctx) {
            Ok(metrics) => {
                self.transition(PipelineState::Completed, "Pipeline completed successfully");
                let run_id = ctx.run_id().to_string();
                ctx.close(RunStatus::Finished);

                let duration_ms = start.elapsed().as_millis() as u64;
                info!("Pipeline completed in {}ms", duration_ms);
                Ok(RunSummary {
                    run_id,
                    final_state: self.state,
                    metrics,
                    transitions: self.transitions.clone(),
                    duration_ms,
                })
            }
            Err(e) => {
                let e = self.fail(e);
                ctx.close(RunStatus::Failed);
                Err(e)
            }
        }
    }

    fn prepare(&self, backend: Box<dyn TrackingBackend>) -> Result<RunContext> {
        for dir in self.config.paths.output_dirs() {
            std::fs::create_dir_all(&dir).context(format!("Creating directory '{}'", dir.display()))?;
        }
        RunContext::open(backend, self.config.run_name.clone())
    }

    fn run_stages(&mut self, ctx: &mut RunContext) -> Result<RegressionMetrics> {
        let paths = self.config.paths.clone();
        let source: DatasetSource = self.config.source.parse()?;

        self.transition(PipelineState::Extracting, format!("Extracting data from {}", source));
        extract(&source, &paths.raw_data, ctx)?;

        self.transition(PipelineState::Preprocessing, "Imputing, scaling and splitting");
        preprocess(
            &paths.raw_data,
            &paths.train,
            &paths.test,
            &self.config.preprocess_options(),
            ctx,
        )?;

        self.transition(
            PipelineState::Training,
            format!("Training {} trees", self.config.n_estimators),
        );
        train(&paths.train, &paths.model, &self.config.train_options(), ctx)?;

        self.transition(PipelineState::Evaluating, "Evaluating model on test data");
        evaluate(&paths.test, &paths.model, &paths.metrics, ctx)
    }

    fn transition(&mut self, next: PipelineState, message: impl Into<String>) {
        self.enter(ProgressUpdate::new(next, message));
    }

    fn enter(&mut self, update: ProgressUpdate) {
        debug!("[{}] {}", update.state.display_name(), update.message);
        self.state = update.state;
        self.transitions.push(update.state);
        self.report_progress(update);
    }

    fn fail(&mut self, e: PipelineError) -> PipelineError {
        error!("Pipeline failed while {}: {}", self.state.as_str(), e);
        self.enter(ProgressUpdate::failed(e.to_string()));
        e
    }

    /// Report progress if a reporter is configured.
    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }
}

/// Builder for [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    config: Option<PipelineConfig>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

static_assertions::assert_impl_all!(PipelineBuilder: Send);

impl PipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set a progress reporter for receiving state transitions.
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Build the pipeline.
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> std::result::Result<Pipeline, ConfigValidationError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        Ok(Pipeline {
            config,
            progress_reporter: self.progress_reporter,
            state: PipelineState::NotStarted,
            transitions: vec![PipelineState::NotStarted],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelinePaths;
    use crate::tracking::MemoryTracker;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_builder_defaults() {
        let pipeline = Pipeline::builder().build().unwrap();
        assert_eq!(pipeline.state(), PipelineState::NotStarted);
        assert_eq!(pipeline.config().run_name, "ml_pipeline_run");
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let mut config = PipelineConfig::default();
        config.test_fraction = 1.5;
        assert!(Pipeline::builder().config(config).build().is_err());
    }

    #[test]
    fn test_failed_run_reports_and_closes() {
        let dir = tempdir().unwrap();
        let config = PipelineConfig::builder()
            .source(dir.path().join("missing.csv").display().to_string())
            .paths(PipelinePaths::under(dir.path()))
            .build()
            .unwrap();

        let updates = Arc::new(Mutex::new(Vec::new()));
        let updates_clone = updates.clone();
        let mut pipeline = Pipeline::builder()
            .config(config)
            .on_progress(move |update| updates_clone.lock().push(update.state))
            .build()
            .unwrap();

        let tracker = MemoryTracker::new();
        let err = pipeline.run(Box::new(tracker.clone())).unwrap_err();

        assert_eq!(err.error_code(), "SOURCE_UNAVAILABLE");
        assert_eq!(pipeline.state(), PipelineState::Failed);
        assert_eq!(
            pipeline.transitions(),
            &[
                PipelineState::NotStarted,
                PipelineState::Extracting,
                PipelineState::Failed
            ]
        );
        assert_eq!(
            *updates.lock(),
            vec![PipelineState::Extracting, PipelineState::Failed]
        );

        let runs = tracker.runs();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, RunStatus::Failed);
        assert_eq!(runs[0].run_name, "ml_pipeline_run");
        assert!(dir.path().join("models").is_dir());
    }

    #[test]
    fn test_failed_update_carries_error_and_rerun_resets() {
        let dir = tempdir().unwrap();
        let config = PipelineConfig::builder()
            .source(dir.path().join("missing.csv").display().to_string())
            .paths(PipelinePaths::under(dir.path()))
            .build()
            .unwrap();

        let updates = Arc::new(Mutex::new(Vec::new()));
        let updates_clone = updates.clone();
        let mut pipeline = Pipeline::builder()
            .config(config)
            .on_progress(move |update| updates_clone.lock().push(update))
            .build()
            .unwrap();

        let err = pipeline.run(Box::new(MemoryTracker::new())).unwrap_err();
        let failed = updates.lock().last().cloned().unwrap();
        assert_eq!(failed, ProgressUpdate::failed(err.to_string()));
        assert!(pipeline.state().is_terminal());

        pipeline.run(Box::new(MemoryTracker::new())).unwrap_err();
        assert_eq!(pipeline.transitions().len(), 3);
        assert_eq!(updates.lock().len(), 4);
    }
}
