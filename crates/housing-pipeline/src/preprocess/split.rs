//! Seeded train/test partitioning.

use crate::error::{PipelineError, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Row positions of the two partitions, in shuffled order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Shuffle `0..n_rows` with a seeded generator and cut it in two.
///
/// The test partition takes the first `ceil(test_fraction * n_rows)`
/// shuffled positions, the train partition the rest. The result depends
/// only on `n_rows`, `test_fraction` and `seed`.
pub fn train_test_split(n_rows: usize, test_fraction: f64, seed: u64) -> Result<SplitIndices> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(PipelineError::InvalidConfig(format!(
            "test fraction must be strictly between 0 and 1, got {}",
            test_fraction
        )));
    }

    let n_test = (test_fraction * n_rows as f64).ceil() as usize;
    let n_train = n_rows.saturating_sub(n_test);
    if n_test == 0 || n_train == 0 {
        return Err(PipelineError::InsufficientData(format!(
            "splitting {} rows with test fraction {} leaves {} train and {} test rows",
            n_rows, test_fraction, n_train, n_test
        )));
    }

    let mut positions: Vec<usize> = (0..n_rows).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    positions.shuffle(&mut rng);

    let train = positions.split_off(n_test);
    Ok(SplitIndices {
        train,
        test: positions,
    })
}
