//! Mean imputation for numeric columns.

use crate::error::{PipelineError, Result};
use crate::table::{column_values, set_f64_column};
use polars::prelude::*;
use tracing::debug;

/// Column means fit on one frame and applied to another.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeanImputer {
    means: Vec<(String, f64)>,
}

impl MeanImputer {
    /// Compute the mean of the present values of each column; nulls and NaN
    /// are skipped.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Schema`] if a column has no values to average.
    pub fn fit(df: &DataFrame, columns: &[String]) -> Result<Self> {
        let mut means = Vec::with_capacity(columns.len());
        for name in columns {
            let values: Vec<f64> = column_values(df, name)?.into_iter().flatten().collect();
            if values.is_empty() {
                return Err(PipelineError::Schema(format!(
                    "column '{}' has no values to compute a mean from",
                    name
                )));
            }
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            means.push((name.clone(), mean));
        }
        Ok(Self { means })
    }

    /// Mean fit for `column`, if any.
    pub fn mean(&self, column: &str) -> Option<f64> {
        self.means
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, mean)| *mean)
    }

    /// Fill nulls and NaN in every fitted column; fitted columns come back as
    /// `Float64`. Returns the number of filled cells.
    pub fn transform(&self, df: &mut DataFrame) -> Result<usize> {
        let mut filled = 0;
        for (name, mean) in &self.means {
            let values = column_values(df, name)?;
            let missing = values.iter().filter(|v| v.is_none()).count();
            if missing > 0 {
                debug!("Filled '{}' with mean: {:.4} ({} cells)", name, mean, missing);
            }
            filled += missing;
            let dense = values.into_iter().map(|v| v.unwrap_or(*mean)).collect();
            set_f64_column(df, name, dense)?;
        }
        Ok(filled)
    }
}
