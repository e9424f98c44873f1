//! Random forest regressor: bagged CART trees with averaged predictions.

use super::tree::{DecisionTreeRegressor, TreeParams};
use crate::error::{PipelineError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Forest hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    pub n_estimators: usize,
    /// Tree `i` draws its bootstrap sample from `seed_from_u64(random_state + i)`.
    pub random_state: u64,
    /// `None` grows each tree until its leaves are pure.
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Sample rows with replacement per tree; otherwise every tree sees all rows.
    pub bootstrap: bool,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            random_state: 42,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            bootstrap: true,
        }
    }
}

impl ForestParams {
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(PipelineError::InvalidConfig(
                "n_estimators must be at least 1".to_string(),
            ));
        }
        if self.min_samples_leaf == 0 {
            return Err(PipelineError::InvalidConfig(
                "min_samples_leaf must be at least 1".to_string(),
            ));
        }
        if self.min_samples_split < 2 {
            return Err(PipelineError::InvalidConfig(
                "min_samples_split must be at least 2".to_string(),
            ));
        }
        if self.max_depth == Some(0) {
            return Err(PipelineError::InvalidConfig(
                "max_depth must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }

    fn tree_params(&self) -> TreeParams {
        TreeParams {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
        }
    }
}

/// A fitted forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    params: ForestParams,
    trees: Vec<DecisionTreeRegressor>,
}

impl RandomForestRegressor {
    /// Fit `params.n_estimators` trees on the row-major matrix `x`.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::InvalidConfig`] for invalid hyperparameters
    /// - [`PipelineError::InsufficientData`] if there are no rows or the
    ///   lengths of `x` and `y` differ
    pub fn fit(x: &[Vec<f64>], y: &[f64], params: ForestParams) -> Result<Self> {
        params.validate()?;
        let n_samples = x.len();
        if n_samples == 0 || n_samples != y.len() {
            return Err(PipelineError::InsufficientData(format!(
                "cannot fit a forest on {} feature rows and {} targets",
                n_samples,
                y.len()
            )));
        }

        let tree_params = params.tree_params();
        let trees = (0..params.n_estimators)
            .map(|i| {
                let rows = if params.bootstrap {
                    let mut rng = StdRng::seed_from_u64(params.random_state.wrapping_add(i as u64));
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };
                let tree = DecisionTreeRegressor::fit(x, y, rows, &tree_params);
                debug!("Tree {}: {} nodes, depth {}", i, tree.node_count(), tree.depth());
                tree
            })
            .collect();

        Ok(Self { params, trees })
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn trees(&self) -> &[DecisionTreeRegressor] {
        &self.trees
    }

    /// Mean of the tree predictions for one row.
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let sum: f64 = self.trees.iter().map(|t| t.predict_row(row)).sum();
        sum / self.trees.len() as f64
    }

    pub fn predict(&self, x: &[Vec<f64>]) -> Vec<f64> {
        x.iter().map(|row| self.predict_row(row)).collect()
    }

    /// Check that a deserialized forest is usable with `n_features` inputs.
    pub fn validate(&self, n_features: usize) -> std::result::Result<(), String> {
        if self.trees.is_empty() {
            return Err("forest has no trees".to_string());
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(n_features).map_err(|e| format!("tree {}: {}", i, e))?;
        }
        Ok(())
    }
}
