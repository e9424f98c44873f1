//! Preprocessor stage: impute, standardize and split the raw table.
//!
//! Every numeric column (the target included) has its missing values
//! replaced by the column mean and is then standardized to zero mean and
//! unit population variance. Non-numeric columns pass through untouched.
//! The rows are then partitioned into train and test tables with a seeded
//! shuffle, so the same input and seed always give the same partitions.
//!
//! Where the means and scales are fit is controlled by
//! [`StatisticsScope`]. The default fits them on the whole table before
//! splitting.

pub mod imputer;
pub mod scaler;
pub mod split;

pub use imputer::MeanImputer;
pub use scaler::{ColumnScale, StandardScaler};
pub use split::{SplitIndices, train_test_split};

use crate::config::StatisticsScope;
use crate::error::{PipelineError, Result};
use crate::table::{numeric_column_names, read_table, take_rows, write_table};
use crate::tracking::RunContext;
use polars::prelude::DataFrame;
use std::path::Path;
use tracing::{debug, info};

/// Options for [`preprocess`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreprocessOptions {
    /// Fraction of rows held out for testing, in `(0, 1)`.
    pub test_fraction: f64,
    /// Seed of the row shuffle.
    pub seed: u64,
    pub statistics_scope: StatisticsScope,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
            statistics_scope: StatisticsScope::FullTable,
        }
    }
}

/// Summary of a preprocessing run.
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessReport {
    pub input_rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    /// Columns that were imputed and standardized.
    pub numeric_columns: Vec<String>,
    /// Number of missing cells replaced by a mean.
    pub imputed_cells: usize,
}

/// Read `input`, transform it and write the two partitions.
///
/// Logs `test_size`, `random_state` and `statistics_scope` as params and
/// both output tables as artifacts.
///
/// # Errors
///
/// - [`PipelineError::EmptyInput`] if the table has no rows
/// - [`PipelineError::Schema`] if it has no numeric column, or a numeric
///   column has no values at all
/// - [`PipelineError::InsufficientData`] if either partition would be empty
pub fn preprocess(
    input: &Path,
    train_out: &Path,
    test_out: &Path,
    options: &PreprocessOptions,
    ctx: &mut RunContext,
) -> Result<PreprocessReport> {
    info!("Preprocessing {}", input.display());

    let mut df = read_table(input)?;
    if df.height() == 0 {
        return Err(PipelineError::EmptyInput(input.display().to_string()));
    }

    let numeric = numeric_column_names(&df);
    if numeric.is_empty() {
        return Err(PipelineError::Schema(format!(
            "'{}' has no numeric columns",
            input.display()
        )));
    }
    debug!("Numeric columns: {:?}", numeric);

    let split = train_test_split(df.height(), options.test_fraction, options.seed)?;

    let imputer = MeanImputer::fit(&statistics_frame(&df, &split, options)?, &numeric)?;
    let imputed_cells = imputer.transform(&mut df)?;

    let scaler = StandardScaler::fit(&statistics_frame(&df, &split, options)?, &numeric)?;
    scaler.transform(&mut df)?;

    let mut train = take_rows(&df, &split.train)?;
    let mut test = take_rows(&df, &split.test)?;
    write_table(&mut train, train_out)?;
    write_table(&mut test, test_out)?;

    ctx.log_artifact(train_out);
    ctx.log_artifact(test_out);
    ctx.log_param("test_size", options.test_fraction);
    ctx.log_param("random_state", options.seed);
    ctx.log_param("statistics_scope", options.statistics_scope.as_str());

    let report = PreprocessReport {
        input_rows: df.height(),
        train_rows: train.height(),
        test_rows: test.height(),
        numeric_columns: numeric,
        imputed_cells,
    };
    info!(
        "Split {} rows into {} train / {} test ({} cells imputed)",
        report.input_rows, report.train_rows, report.test_rows, report.imputed_cells
    );
    Ok(report)
}

/// Rows the imputation and scaling statistics are fit on.
fn statistics_frame(df: &DataFrame, split: &SplitIndices, options: &PreprocessOptions) -> Result<DataFrame> {
    match options.statistics_scope {
        StatisticsScope::FullTable => Ok(df.clone()),
        StatisticsScope::TrainOnly => take_rows(df, &split.train),
    }
}
