//! CART regression tree.
//!
//! Nodes are stored as parallel arrays in pre-order, so a split node's
//! children always sit at higher indices than the node itself. Splits
//! minimise the summed squared error of the two children; each candidate
//! threshold is the midpoint between two adjacent distinct feature values.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Growth limits for a single tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

/// A fitted regression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTreeRegressor {
    /// Feature tested at each node; `None` marks a leaf.
    feature: Vec<Option<usize>>,
    /// Rows with `x[feature] <= threshold` go left.
    threshold: Vec<f64>,
    /// Mean target of the training rows reaching the node.
    value: Vec<f64>,
    left: Vec<usize>,
    right: Vec<usize>,
}

/// Best split found for one node.
struct Split {
    feature: usize,
    threshold: f64,
    /// Reduction of the children's summed squared error relative to the node.
    improvement: f64,
}

impl DecisionTreeRegressor {
    /// Grow a tree on the rows of `x` listed in `rows`.
    ///
    /// `rows` may repeat indices (bootstrap samples); a repeated row counts
    /// once per occurrence. `rows` must not be empty.
    pub fn fit(x: &[Vec<f64>], y: &[f64], rows: Vec<usize>, params: &TreeParams) -> Self {
        let mut tree = Self {
            feature: Vec::new(),
            threshold: Vec::new(),
            value: Vec::new(),
            left: Vec::new(),
            right: Vec::new(),
        };
        let n_features = x.first().map_or(0, Vec::len);
        tree.grow(x, y, rows, n_features, 0, params);
        tree
    }

    fn push_node(&mut self, value: f64) -> usize {
        self.feature.push(None);
        self.threshold.push(0.0);
        self.value.push(value);
        self.left.push(0);
        self.right.push(0);
        self.feature.len() - 1
    }

    fn grow(
        &mut self,
        x: &[Vec<f64>],
        y: &[f64],
        rows: Vec<usize>,
        n_features: usize,
        depth: usize,
        params: &TreeParams,
    ) -> usize {
        let n = rows.len();
        let mean = rows.iter().map(|&r| y[r]).sum::<f64>() / n as f64;
        let node = self.push_node(mean);

        let depth_reached = params.max_depth.is_some_and(|d| depth >= d);
        if depth_reached || n < params.min_samples_split || n < 2 * params.min_samples_leaf || is_pure(y, &rows) {
            return node;
        }

        let Some(split) = best_split(x, y, &rows, n_features, params.min_samples_leaf) else {
            return node;
        };
        if split.improvement <= 0.0 {
            return node;
        }

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&r| x[r][split.feature] <= split.threshold);

        self.feature[node] = Some(split.feature);
        self.threshold[node] = split.threshold;
        let left = self.grow(x, y, left_rows, n_features, depth + 1, params);
        let right = self.grow(x, y, right_rows, n_features, depth + 1, params);
        self.left[node] = left;
        self.right[node] = right;
        node
    }

    /// Predict the target of one row.
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut node = 0;
        while let Some(feature) = self.feature[node] {
            node = if row[feature] <= self.threshold[node] {
                self.left[node]
            } else {
                self.right[node]
            };
        }
        self.value[node]
    }

    pub fn node_count(&self) -> usize {
        self.feature.len()
    }

    pub fn leaf_count(&self) -> usize {
        self.feature.iter().filter(|f| f.is_none()).count()
    }

    /// Length of the longest root-to-leaf path.
    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((node, depth)) = stack.pop() {
            max_depth = max_depth.max(depth);
            if self.feature[node].is_some() {
                stack.push((self.left[node], depth + 1));
                stack.push((self.right[node], depth + 1));
            }
        }
        max_depth
    }

    /// Check that a deserialized tree can be traversed safely.
    pub fn validate(&self, n_features: usize) -> Result<(), String> {
        let n = self.feature.len();
        if n == 0 {
            return Err("tree has no nodes".to_string());
        }
        if [self.threshold.len(), self.value.len(), self.left.len(), self.right.len()]
            .iter()
            .any(|&len| len != n)
        {
            return Err("tree node arrays differ in length".to_string());
        }
        for node in 0..n {
            if let Some(feature) = self.feature[node] {
                if feature >= n_features {
                    return Err(format!(
                        "node {} tests feature {} but the model has {} features",
                        node, feature, n_features
                    ));
                }
                // pre-order layout: children come strictly after their parent
                for child in [self.left[node], self.right[node]] {
                    if child <= node || child >= n {
                        return Err(format!("node {} has invalid child index {}", node, child));
                    }
                }
            }
        }
        Ok(())
    }
}

fn is_pure(y: &[f64], rows: &[usize]) -> bool {
    let first = y[rows[0]];
    rows.iter().all(|&r| y[r] == first)
}

/// Sorted sweep over every feature.
///
/// Minimising the children's squared error is equivalent to maximising
/// `sum_l^2 / n_l + sum_r^2 / n_r`, which only needs running sums.
fn best_split(
    x: &[Vec<f64>],
    y: &[f64],
    rows: &[usize],
    n_features: usize,
    min_samples_leaf: usize,
) -> Option<Split> {
    let n = rows.len();
    let total: f64 = rows.iter().map(|&r| y[r]).sum();
    let parent_proxy = total * total / n as f64;

    let mut best: Option<Split> = None;
    let mut best_proxy = f64::NEG_INFINITY;
    let mut sorted: Vec<(f64, f64)> = Vec::with_capacity(n);

    for feature in 0..n_features {
        sorted.clear();
        sorted.extend(rows.iter().map(|&r| (x[r][feature], y[r])));
        sorted.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

        let mut left_sum = 0.0;
        for k in 1..n {
            left_sum += sorted[k - 1].1;
            let (lo, hi) = (sorted[k - 1].0, sorted[k].0);
            if lo >= hi || k < min_samples_leaf || n - k < min_samples_leaf {
                continue;
            }

            let right_sum = total - left_sum;
            let proxy = left_sum * left_sum / k as f64 + right_sum * right_sum / (n - k) as f64;
            if proxy > best_proxy {
                best_proxy = proxy;
                let mut threshold = lo + (hi - lo) / 2.0;
                if threshold >= hi {
                    threshold = lo;
                }
                best = Some(Split {
                    feature,
                    threshold,
                    improvement: proxy - parent_proxy,
                });
            }
        }
    }

    best
}
