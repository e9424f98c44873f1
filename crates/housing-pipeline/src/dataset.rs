//! Bootstrap of the California housing dataset.
//!
//! The public CSV mirror holds the raw census block-group totals. They are
//! reshaped into the per-household frame the pipeline trains on:
//!
//! | column        | derived from                          |
//! |---------------|---------------------------------------|
//! | `MedInc`      | `median_income`                       |
//! | `HouseAge`    | `housing_median_age`                  |
//! | `AveRooms`    | `total_rooms / households`            |
//! | `AveBedrms`   | `total_bedrooms / households`         |
//! | `Population`  | `population`                          |
//! | `AveOccup`    | `population / households`             |
//! | `Latitude`    | `latitude`                            |
//! | `Longitude`   | `longitude`                           |
//! | `MedHouseVal` | `median_house_value / 100000`         |
//!
//! Missing `total_bedrooms` cells stay missing and are imputed by the
//! Preprocessor like any other gap.

use crate::error::{PipelineError, Result};
use crate::extract::DatasetSource;
use crate::table::{column_names, read_table_from_bytes, write_table};
use polars::prelude::*;
use std::path::Path;
use tracing::info;

/// Public CSV copy of the 1990 California census housing data.
pub const CALIFORNIA_HOUSING_URL: &str =
    "https://raw.githubusercontent.com/ageron/handson-ml2/master/datasets/housing/housing.csv";

const REQUIRED_COLUMNS: [&str; 9] = [
    "longitude",
    "latitude",
    "housing_median_age",
    "total_rooms",
    "total_bedrooms",
    "population",
    "households",
    "median_income",
    "median_house_value",
];

/// Fetch the census table from `source`, reshape it and write it to `output`.
///
/// Returns the number of rows written.
///
/// # Errors
///
/// - [`PipelineError::SourceUnavailable`] if the source cannot be read
/// - [`PipelineError::Schema`] if a census column is missing
pub fn fetch_california_housing(source: &DatasetSource, output: &Path) -> Result<usize> {
    info!("Downloading California housing data from {}", source);
    let bytes = source.fetch()?;
    let raw = read_table_from_bytes(&bytes)?;

    let mut housing = to_housing_frame(raw)?;
    write_table(&mut housing, output)?;

    info!(
        "Dataset saved to {} ({} rows, {} columns)",
        output.display(),
        housing.height(),
        housing.width()
    );
    Ok(housing.height())
}

/// Derive the per-household columns from the census totals.
pub fn to_housing_frame(raw: DataFrame) -> Result<DataFrame> {
    let present = column_names(&raw);
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|c| !present.iter().any(|p| p == c))
        .collect();
    if !missing.is_empty() {
        return Err(PipelineError::Schema(format!(
            "census table lacks columns {:?}",
            missing
        )));
    }

    let f = |name: &str| col(name).cast(DataType::Float64);
    let df = raw
        .lazy()
        .select([
            f("median_income").alias("MedInc"),
            f("housing_median_age").alias("HouseAge"),
            (f("total_rooms") / f("households")).alias("AveRooms"),
            (f("total_bedrooms") / f("households")).alias("AveBedrms"),
            f("population").alias("Population"),
            (f("population") / f("households")).alias("AveOccup"),
            f("latitude").alias("Latitude"),
            f("longitude").alias("Longitude"),
            (f("median_house_value") / lit(100_000.0)).alias("MedHouseVal"),
        ])
        .collect()?;
    Ok(df)
}
