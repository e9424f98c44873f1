//! CLI entry point for the housing price pipeline.

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use dotenv::dotenv;
use housing_pipeline::{
    CALIFORNIA_HOUSING_URL, DatasetSource, FileTrackingStore, Pipeline, PipelineConfig, RunSummary,
    StatisticsScope, fetch_california_housing,
};
use std::env;
use std::path::PathBuf;
use tracing::{error, info};

/// Environment variable that sets the tracking store root.
const TRACKING_DIR_ENV: &str = "PIPELINE_TRACKING_DIR";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Extract, preprocess, train and evaluate a housing price model",
    long_about = "Runs the four pipeline stages once and records the run in a file tracking store.\n\n\
                  ENVIRONMENT VARIABLES:\n  \
                  PIPELINE_TRACKING_DIR    Root directory of the tracking store (default: mlruns)\n  \
                  RUST_LOG                 Overrides --log-level\n\n\
                  EXAMPLES:\n  \
                  # Run with defaults (reads data/raw_data.csv, downloading it first if absent)\n  \
                  housing-pipeline\n\n  \
                  # Fetch the dataset over HTTP and train a smaller forest\n  \
                  housing-pipeline --source https://example.org/housing.csv --n-estimators 20\n\n  \
                  # Machine-readable summary\n  \
                  housing-pipeline --json | jq .metrics.r2"
)]
struct Args {
    /// Dataset source: local path or http(s) URL
    #[arg(short, long)]
    source: Option<String>,

    /// JSON configuration file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Fraction of rows held out for testing (0.0 - 1.0, exclusive)
    #[arg(long)]
    test_size: Option<f64>,

    /// Seed for the train/test split
    #[arg(long)]
    seed: Option<u64>,

    /// Number of trees in the forest
    #[arg(long)]
    n_estimators: Option<usize>,

    /// Seed for bootstrap sampling during training
    #[arg(long)]
    model_seed: Option<u64>,

    /// Fit imputation and scaling statistics on train rows only
    #[arg(long)]
    train_only_stats: bool,

    /// Where to download the California housing data from when the local
    /// source file does not exist
    #[arg(long, default_value = CALIFORNIA_HOUSING_URL)]
    dataset_url: String,

    /// Fail instead of downloading a missing local source
    #[arg(long)]
    no_download: bool,

    /// Root directory of the tracking store
    #[arg(long)]
    tracking_dir: Option<PathBuf>,

    /// Experiment name the run is filed under
    #[arg(long)]
    experiment: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show warnings and errors)
    #[arg(short, long)]
    quiet: bool,

    /// Output the run summary as JSON to stdout
    ///
    /// Disables all logs so stdout carries only the JSON document.
    #[arg(long)]
    json: bool,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    // Load environment variables from .env file
    dotenv().ok();

    let config = build_config(&args)?;
    bootstrap_source(&config, &args)?;
    info!(
        "Tracking runs in {} (experiment '{}')",
        config.tracking_dir.display(),
        config.experiment
    );
    let store = FileTrackingStore::new(config.tracking_dir.clone(), config.experiment.clone());

    let mut builder = Pipeline::builder().config(config);
    if !args.quiet && !args.json {
        builder = builder.on_progress(|update| {
            info!("[{:>3.0}%] {}", update.progress * 100.0, update.message);
        });
    }
    let mut pipeline = builder.build()?;

    match pipeline.run(Box::new(store)) {
        Ok(summary) => print_summary(&summary, args.json),
        Err(e) => {
            if args.json {
                println!("{}", serde_json::json!({ "error": &e, "final_state": pipeline.state() }));
            } else {
                error!("Pipeline failed: {}", e);
            }
            Err(anyhow!("Pipeline failed [{}]: {}", e.error_code(), e))
        }
    }
}

/// Layer the configuration: JSON file, then environment, then flags.
fn build_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("Loading configuration from {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    if let Ok(dir) = env::var(TRACKING_DIR_ENV)
        && !dir.trim().is_empty()
    {
        config.tracking_dir = PathBuf::from(dir);
    }

    if let Some(source) = &args.source {
        config.source = source.clone();
    }
    if let Some(test_size) = args.test_size {
        config.test_fraction = test_size;
    }
    if let Some(seed) = args.seed {
        config.split_seed = seed;
    }
    if let Some(n) = args.n_estimators {
        config.n_estimators = n;
    }
    if let Some(seed) = args.model_seed {
        config.train_seed = seed;
    }
    if args.train_only_stats {
        config.statistics_scope = StatisticsScope::TrainOnly;
    }
    if let Some(dir) = &args.tracking_dir {
        config.tracking_dir = dir.clone();
    }
    if let Some(experiment) = &args.experiment {
        config.experiment = experiment.clone();
    }

    config.validate()?;
    Ok(config)
}

/// Download the dataset to the configured local source if it is missing.
fn bootstrap_source(config: &PipelineConfig, args: &Args) -> Result<()> {
    let source: DatasetSource = config.source.parse()?;
    if let DatasetSource::File(path) = &source
        && !path.exists()
        && !args.no_download
    {
        info!("{} not found, downloading the California housing dataset", path.display());
        let remote: DatasetSource = args.dataset_url.parse()?;
        fetch_california_housing(&remote, path)
            .with_context(|| format!("Bootstrapping dataset into {}", path.display()))?;
    }
    Ok(())
}

/// Print the run summary.
///
/// Uses `println!` intentionally: the summary is the program's output and
/// must be visible regardless of log level.
fn print_summary(summary: &RunSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    println!("\n{}", "=".repeat(60));
    println!("PIPELINE COMPLETE");
    println!("{}", "=".repeat(60));
    println!("  Run ID:   {}", summary.run_id);
    println!("  Duration: {}ms", summary.duration_ms);
    println!();
    println!("  MSE:      {:.6}", summary.metrics.mse);
    println!("  MAE:      {:.6}", summary.metrics.mae);
    println!("  R²:       {:.6}", summary.metrics.r2);
    println!("{}", "=".repeat(60));
    Ok(())
}
