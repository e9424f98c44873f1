//! Table I/O and numeric column helpers shared by every stage.
//!
//! Tables are comma-delimited text with a header row. Numeric columns are
//! handled as `Float64`; anything else passes through as polars infers it.
//!
//! The cells in [`MISSING_VALUE_TOKENS`] are read as nulls in every column,
//! and a floating-point NaN is treated as missing wherever values are read.

use crate::error::{PipelineError, Result, ResultExt};
use polars::io::csv::read::{CsvReadOptions, NullValues};
use polars::prelude::*;
use std::fs::File;
use std::io::Cursor;
use std::path::Path;

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Cell contents read as missing values.
pub const MISSING_VALUE_TOKENS: &[&str] = &[
    "", "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "-nan", "NULL", "null", "None", "<NA>", "#N/A",
];

fn csv_options() -> CsvReadOptions {
    let null_values: Vec<PlSmallStr> = MISSING_VALUE_TOKENS
        .iter()
        .map(|token| PlSmallStr::from(*token))
        .collect();

    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .map_parse_options(|opts| opts.with_null_values(Some(NullValues::AllColumns(null_values.clone()))))
}

/// Read a CSV table from disk.
///
/// A file with a header but no data rows yields a zero-height frame. A file
/// with no content at all is reported as [`PipelineError::EmptyInput`].
pub fn read_table(path: &Path) -> Result<DataFrame> {
    let reader = csv_options()
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .context(format!("Opening table '{}'", path.display()))?;

    match reader.finish() {
        Ok(df) => Ok(df),
        Err(PolarsError::NoData(_)) => Err(PipelineError::EmptyInput(path.display().to_string())),
        Err(e) => Err(PipelineError::Polars(e).with_context(format!(
            "Parsing table '{}'",
            path.display()
        ))),
    }
}

/// Parse a CSV table held in memory.
pub fn read_table_from_bytes(bytes: &[u8]) -> Result<DataFrame> {
    let df = csv_options()
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()?;
    Ok(df)
}

/// Write a table to disk as CSV with a header row.
pub fn write_table(df: &mut DataFrame, path: &Path) -> Result<()> {
    ensure_parent_dir(path)?;
    let mut file = File::create(path).context(format!("Creating '{}'", path.display()))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b',')
        .finish(df)
        .context(format!("Writing table '{}'", path.display()))?;
    Ok(())
}

/// Create the parent directory of `path` if it has one.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .context(format!("Creating directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// All column names in file order.
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect()
}

/// Names of the numeric columns in file order.
pub fn numeric_column_names(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|col| is_numeric_dtype(col.dtype()))
        .map(|col| col.name().to_string())
        .collect()
}

/// Values of a column cast to `f64`. Nulls and NaN both come back as `None`.
pub fn column_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let casted = df.column(name)?.cast(&DataType::Float64)?;
    let values = casted
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect();
    Ok(values)
}

/// Values of a column that must be numeric and complete.
pub fn dense_column_values(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let column = df.column(name)?;
    if !is_numeric_dtype(column.dtype()) {
        return Err(PipelineError::Schema(format!(
            "column '{}' is {} but must be numeric",
            name,
            column.dtype()
        )));
    }
    column_values(df, name)?
        .into_iter()
        .map(|v| {
            v.ok_or_else(|| {
                PipelineError::Schema(format!("column '{}' contains missing values", name))
            })
        })
        .collect()
}

/// Replace (or add) a `Float64` column.
pub fn set_f64_column(df: &mut DataFrame, name: &str, values: Vec<f64>) -> Result<()> {
    let series = Series::new(name.into(), values);
    df.with_column(series)?;
    Ok(())
}

/// Select rows by position, in the given order.
pub fn take_rows(df: &DataFrame, indices: &[usize]) -> Result<DataFrame> {
    let idx: Vec<IdxSize> = indices.iter().map(|&i| i as IdxSize).collect();
    let idx = IdxCa::from_vec("idx".into(), idx);
    Ok(df.take(&idx)?)
}

/// Row-major feature matrix for the given columns.
pub fn feature_matrix(df: &DataFrame, features: &[String]) -> Result<Vec<Vec<f64>>> {
    let columns: Vec<Vec<f64>> = features
        .iter()
        .map(|name| dense_column_values(df, name))
        .collect::<Result<_>>()?;

    let rows = (0..df.height())
        .map(|row| columns.iter().map(|col| col[row]).collect())
        .collect();
    Ok(rows)
}
