//! Latin Hypercube sampling of uncertain model parameters.
//!
//! For `n` samples, the range of every variable is split into `n` intervals of equal probability.
//! One value is drawn uniformly from each interval and the values are shuffled independently for
//! each variable, so that every interval is used exactly once per variable.
use crate::id::{ScenarioID, VariableKey};
use crate::input::UncertainBounds;
use anyhow::{Result, ensure};
use log::info;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Samples drawn for a single scenario.
///
/// Each row holds one value per uncertain variable, in the order of `variables`.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleMatrix {
    /// The scenario the samples were drawn for
    pub scenario: ScenarioID,
    /// Labels of the sampled variables
    pub variables: Vec<VariableKey>,
    rows: Vec<Vec<f64>>,
}

impl SampleMatrix {
    /// The number of samples
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether there are no samples
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterate over the samples, with their zero-based sample IDs
    pub fn iter(&self) -> impl Iterator<Item = (usize, &[f64])> {
        self.rows.iter().map(Vec::as_slice).enumerate()
    }

    /// All sampled values of a single variable
    pub fn column(&self, var_idx: usize) -> impl Iterator<Item = f64> + '_ {
        self.rows.iter().map(move |row| row[var_idx])
    }
}

/// Create the random number generator used for sampling.
///
/// If no seed is supplied, a fresh one is drawn. Either way the seed is logged, so that any sample
/// matrix can be regenerated.
pub fn create_rng(seed: Option<u64>) -> StdRng {
    let seed = seed.unwrap_or_else(|| rand::rng().random());
    info!("Sampling with seed {seed}");
    StdRng::seed_from_u64(seed)
}

/// Draw a Latin Hypercube sample on the unit hypercube.
///
/// # Returns
///
/// `n_samples` rows of `n_vars` values, each in `[0, 1)`.
pub fn latin_hypercube<R: Rng>(
    n_samples: usize,
    n_vars: usize,
    rng: &mut R,
) -> Vec<Vec<f64>> {
    let width = 1.0 / n_samples as f64;
    let mut rows = vec![vec![0.0; n_vars]; n_samples];
    let mut strata: Vec<usize> = (0..n_samples).collect();
    for var_idx in 0..n_vars {
        strata.shuffle(rng);
        for (row, &stratum) in rows.iter_mut().zip(strata.iter()) {
            let offset: f64 = rng.random();
            row[var_idx] = (stratum as f64 + offset) * width;
        }
    }

    rows
}

/// Sample the uncertain variables of a scenario.
///
/// # Arguments
///
/// * `bounds` - The `[low, high]` range of every uncertain variable
/// * `n_samples` - How many samples to draw
/// * `rng` - The random number generator
pub fn sample_scenario<R: Rng>(
    bounds: &UncertainBounds,
    n_samples: usize,
    rng: &mut R,
) -> Result<SampleMatrix> {
    ensure!(n_samples > 0, "Number of samples must be greater than zero");
    ensure!(
        !bounds.is_empty(),
        "Scenario {} has no uncertain variables",
        bounds.scenario
    );

    let mut rows = latin_hypercube(n_samples, bounds.len(), rng);
    for row in &mut rows {
        for (value, var_bounds) in row.iter_mut().zip(bounds.bounds.values()) {
            *value = var_bounds.low + *value * var_bounds.width();
        }
    }

    Ok(SampleMatrix {
        scenario: bounds.scenario.clone(),
        variables: bounds.keys().cloned().collect(),
        rows,
    })
}
