//! Standardization to zero mean and unit variance.

use crate::error::{PipelineError, Result};
use crate::table::{dense_column_values, set_f64_column};
use polars::prelude::*;

/// Per-column centre and scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnScale {
    pub mean: f64,
    /// Population standard deviation, replaced by 1.0 when (near) zero.
    pub scale: f64,
}

/// Standard scaler fit on one frame and applied to another.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StandardScaler {
    columns: Vec<(String, ColumnScale)>,
}

impl StandardScaler {
    /// Fit mean and population standard deviation (ddof = 0) per column.
    /// Columns must be numeric and complete, i.e. imputed first.
    pub fn fit(df: &DataFrame, columns: &[String]) -> Result<Self> {
        let mut fitted = Vec::with_capacity(columns.len());
        for name in columns {
            let values = dense_column_values(df, name)?;
            if values.is_empty() {
                return Err(PipelineError::InsufficientData(format!(
                    "cannot fit scaling for '{}' on zero rows",
                    name
                )));
            }
            let n = values.len() as f64;
            let mean = values.iter().sum::<f64>() / n;
            let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            let std = variance.sqrt();
            // constant columns are centred but not scaled
            let scale = if std < 10.0 * f64::EPSILON { 1.0 } else { std };
            fitted.push((name.clone(), ColumnScale { mean, scale }));
        }
        Ok(Self { columns: fitted })
    }

    pub fn column_scale(&self, column: &str) -> Option<ColumnScale> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, scale)| *scale)
    }

    /// Apply `(x - mean) / scale` to every fitted column.
    pub fn transform(&self, df: &mut DataFrame) -> Result<()> {
        for (name, ColumnScale { mean, scale }) in &self.columns {
            let scaled = dense_column_values(df, name)?
                .into_iter()
                .map(|v| (v - mean) / scale)
                .collect();
            set_f64_column(df, name, scaled)?;
        }
        Ok(())
    }
}
