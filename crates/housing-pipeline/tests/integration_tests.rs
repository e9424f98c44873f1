//! Integration tests for the housing price pipeline.
//!
//! These tests run the four stages end to end on a small synthetic dataset
//! written to a temporary directory.

use housing_pipeline::{
    FileTrackingStore, ForestParams, MemoryTracker, Pipeline, PipelineConfig, PipelineError,
    PipelinePaths, PipelineState, PreprocessOptions, RegressionMetrics, RunContext, RunStatus,
    TrainOptions, evaluate, preprocess, train,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::{TempDir, tempdir};

// ============================================================================
// Helper Functions
// ============================================================================

/// 100 rows, three numeric features, a few missing cells and the label.
fn housing_csv() -> String {
    let mut csv = String::from("MedInc,HouseAge,AveRooms,MedHouseVal\n");
    for i in 0..100 {
        let med_inc = 1.5 + (i as f64) * 0.08;
        let house_age = ((i * 7) % 40 + 5) as f64;
        let ave_rooms = 3.0 + ((i * 13) % 17) as f64 * 0.25;
        let value = 0.4 * med_inc + 0.01 * house_age + 0.05 * ave_rooms;

        let house_age = if i % 17 == 3 {
            String::new()
        } else {
            house_age.to_string()
        };
        csv.push_str(&format!("{},{},{},{}\n", med_inc, house_age, ave_rooms, value));
    }
    csv
}

fn write_source(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("source/housing.csv");
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, housing_csv()).unwrap();
    path
}

fn small_config(dir: &TempDir, source: &Path) -> PipelineConfig {
    PipelineConfig::builder()
        .source(source.display().to_string())
        .paths(PipelinePaths::under(dir.path().join("work")))
        .n_estimators(10)
        .build()
        .unwrap()
}

fn run_once(config: PipelineConfig) -> (housing_pipeline::RunSummary, MemoryTracker) {
    let tracker = MemoryTracker::new();
    let mut pipeline = Pipeline::builder().config(config).build().unwrap();
    let summary = pipeline.run(Box::new(tracker.clone())).unwrap();
    (summary, tracker)
}

// ============================================================================
// Full Pipeline Tests
// ============================================================================

#[test]
fn test_full_pipeline_completes() {
    let dir = tempdir().unwrap();
    let source = write_source(&dir);
    let config = small_config(&dir, &source);
    let paths = config.paths.clone();

    let updates = Arc::new(Mutex::new(Vec::new()));
    let updates_clone = updates.clone();
    let tracker = MemoryTracker::new();
    let mut pipeline = Pipeline::builder()
        .config(config)
        .on_progress(move |update| updates_clone.lock().push(update))
        .build()
        .unwrap();

    let summary = pipeline.run(Box::new(tracker.clone())).unwrap();

    assert_eq!(summary.final_state, PipelineState::Completed);
    assert_eq!(pipeline.state(), PipelineState::Completed);
    assert_eq!(
        summary.transitions,
        vec![
            PipelineState::NotStarted,
            PipelineState::Extracting,
            PipelineState::Preprocessing,
            PipelineState::Training,
            PipelineState::Evaluating,
            PipelineState::Completed,
        ]
    );
    assert!(summary.metrics.mse.is_finite());
    assert!(summary.metrics.mse >= 0.0);
    assert!(summary.metrics.mae >= 0.0);
    assert!(summary.metrics.r2 <= 1.0);

    // Progress only moves forward and ends at 100%.
    let updates = updates.lock();
    assert_eq!(updates.len(), 5);
    for pair in updates.windows(2) {
        assert!(pair[0].progress <= pair[1].progress);
    }
    assert_eq!(updates.last().unwrap().progress, 1.0);

    // Every stage output exists.
    for path in [&paths.raw_data, &paths.train, &paths.test, &paths.model, &paths.metrics] {
        assert!(path.is_file(), "missing {}", path.display());
    }
    let on_disk = RegressionMetrics::read_csv(&paths.metrics).unwrap();
    assert!((on_disk.mse - summary.metrics.mse).abs() < 1e-12);
    assert!((on_disk.r2 - summary.metrics.r2).abs() < 1e-12);

    let run = tracker.run(&summary.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Finished);
    assert_eq!(run.run_name, "ml_pipeline_run");
    assert_eq!(run.params.get("test_size").map(String::as_str), Some("0.2"));
    assert_eq!(run.params.get("random_state").map(String::as_str), Some("42"));
    assert_eq!(run.params.get("n_estimators").map(String::as_str), Some("10"));
    assert_eq!(run.metric("mse"), Some(summary.metrics.mse));
    assert_eq!(run.metric("mae"), Some(summary.metrics.mae));
    assert_eq!(run.metric("r2"), Some(summary.metrics.r2));
    assert_eq!(
        run.artifacts,
        vec![
            paths.raw_data.clone(),
            paths.train.clone(),
            paths.test.clone(),
            paths.model.clone(),
        ]
    );
}

#[test]
fn test_split_sizes_on_disk() {
    let dir = tempdir().unwrap();
    let source = write_source(&dir);
    let config = small_config(&dir, &source);
    let paths = config.paths.clone();

    run_once(config);

    // Header plus rows: 80 train, 20 test.
    let train_lines = fs::read_to_string(&paths.train).unwrap().lines().count();
    let test_lines = fs::read_to_string(&paths.test).unwrap().lines().count();
    assert_eq!(train_lines, 81);
    assert_eq!(test_lines, 21);

    // Extraction copies the source verbatim.
    assert_eq!(
        fs::read_to_string(&paths.raw_data).unwrap(),
        fs::read_to_string(&source).unwrap()
    );
}

#[test]
fn test_reruns_are_reproducible() {
    let dir = tempdir().unwrap();
    let source = write_source(&dir);

    let (first, _) = run_once(small_config(&dir, &source));
    let first_train = fs::read_to_string(dir.path().join("work/data/train.csv")).unwrap();

    let (second, _) = run_once(small_config(&dir, &source));
    let second_train = fs::read_to_string(dir.path().join("work/data/train.csv")).unwrap();

    assert_ne!(first.run_id, second.run_id);
    assert_eq!(first_train, second_train);
    assert!((first.metrics.mse - second.metrics.mse).abs() < 1e-6);
    assert!((first.metrics.mae - second.metrics.mae).abs() < 1e-6);
    assert!((first.metrics.r2 - second.metrics.r2).abs() < 1e-6);
}

#[test]
fn test_missing_source_fails_run() {
    let dir = tempdir().unwrap();
    let config = small_config(&dir, &dir.path().join("nope.csv"));
    let paths = config.paths.clone();

    let tracker = MemoryTracker::new();
    let mut pipeline = Pipeline::builder().config(config).build().unwrap();
    let err = pipeline.run(Box::new(tracker.clone())).unwrap_err();

    assert!(matches!(err, PipelineError::SourceUnavailable { .. }));
    assert_eq!(pipeline.state(), PipelineState::Failed);
    assert_eq!(pipeline.transitions().last(), Some(&PipelineState::Failed));

    let runs = tracker.runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, RunStatus::Failed);
    assert!(runs[0].metrics.is_empty());
    assert!(!paths.model.exists());
}

#[test]
fn test_missing_target_fails_in_training() {
    let dir = tempdir().unwrap();
    let source = write_source(&dir);
    let mut config = small_config(&dir, &source);
    config.target_column = "Price".to_string();
    let paths = config.paths.clone();

    let tracker = MemoryTracker::new();
    let mut pipeline = Pipeline::builder().config(config).build().unwrap();
    let err = pipeline.run(Box::new(tracker.clone())).unwrap_err();

    assert_eq!(err.error_code(), "MISSING_TARGET_COLUMN");
    assert_eq!(
        pipeline.transitions(),
        &[
            PipelineState::NotStarted,
            PipelineState::Extracting,
            PipelineState::Preprocessing,
            PipelineState::Training,
            PipelineState::Failed,
        ]
    );
    assert!(paths.train.is_file());
    assert!(!paths.model.exists());
    assert_eq!(tracker.runs()[0].status, RunStatus::Failed);
}

// ============================================================================
// Stage-by-Stage Tests
// ============================================================================

#[test]
fn test_single_unsampled_tree_fits_training_rows_exactly() {
    let dir = tempdir().unwrap();
    let source = write_source(&dir);
    let train_path = dir.path().join("train.csv");
    let test_path = dir.path().join("test.csv");
    let model_path = dir.path().join("model.json");
    let metrics_path = dir.path().join("metrics.csv");

    let tracker = MemoryTracker::new();
    let mut ctx = RunContext::open(Box::new(tracker.clone()), "perfect_fit").unwrap();

    preprocess(
        &source,
        &train_path,
        &test_path,
        &PreprocessOptions::default(),
        &mut ctx,
    )
    .unwrap();

    let options = TrainOptions {
        forest: ForestParams {
            n_estimators: 1,
            bootstrap: false,
            ..ForestParams::default()
        },
        ..TrainOptions::default()
    };
    train(&train_path, &model_path, &options, &mut ctx).unwrap();

    // Scoring on the rows the tree was grown on.
    let metrics = evaluate(&train_path, &model_path, &metrics_path, &mut ctx).unwrap();
    ctx.close(RunStatus::Finished);

    assert!(metrics.mse < 1e-12, "mse = {}", metrics.mse);
    assert!(metrics.mae < 1e-6, "mae = {}", metrics.mae);
    assert!((metrics.r2 - 1.0).abs() < 1e-9, "r2 = {}", metrics.r2);
    assert_eq!(tracker.runs()[0].status, RunStatus::Finished);
}

#[test]
fn test_evaluate_rejects_feature_mismatch() {
    let dir = tempdir().unwrap();
    let source = write_source(&dir);
    let config = small_config(&dir, &source);
    let paths = config.paths.clone();
    run_once(config);

    let reduced = dir.path().join("reduced.csv");
    fs::write(&reduced, "MedInc,Bedrooms,MedHouseVal\n0.1,2.0,1.0\n").unwrap();

    let mut ctx = RunContext::open(Box::new(MemoryTracker::new()), "mismatch").unwrap();
    let err = evaluate(&reduced, &paths.model, &dir.path().join("m.csv"), &mut ctx).unwrap_err();
    ctx.close(RunStatus::Failed);

    match err {
        PipelineError::SchemaMismatch { missing, unexpected } => {
            assert_eq!(missing, vec!["HouseAge".to_string(), "AveRooms".to_string()]);
            assert_eq!(unexpected, vec!["Bedrooms".to_string()]);
        }
        other => panic!("expected SchemaMismatch, got {:?}", other),
    }
}

// ============================================================================
// File Tracking Store
// ============================================================================

#[test]
fn test_file_tracking_store_records_run() {
    let dir = tempdir().unwrap();
    let source = write_source(&dir);
    let config = small_config(&dir, &source);
    let store = FileTrackingStore::new(dir.path().join("mlruns"), "housing");

    let mut pipeline = Pipeline::builder().config(config).build().unwrap();
    let summary = pipeline.run(Box::new(store.clone())).unwrap();

    let meta = store.read_meta(&summary.run_id).unwrap();
    assert_eq!(meta.status, RunStatus::Finished);
    assert_eq!(meta.experiment, "housing");
    assert!(meta.end_time.is_some());

    let run_dir = store.run_dir(&summary.run_id);
    assert_eq!(
        fs::read_to_string(run_dir.join("params/n_estimators")).unwrap(),
        "10"
    );
    assert_eq!(
        fs::read_to_string(run_dir.join("params/statistics_scope")).unwrap(),
        "full_table"
    );

    let mse_line = fs::read_to_string(run_dir.join("metrics/mse")).unwrap();
    let logged: f64 = mse_line.split_whitespace().nth(1).unwrap().parse().unwrap();
    assert_eq!(logged, summary.metrics.mse);

    for artifact in ["raw_data.csv", "train.csv", "test.csv", "random_forest_model.json"] {
        assert!(run_dir.join("artifacts").join(artifact).is_file(), "missing {}", artifact);
    }
}
