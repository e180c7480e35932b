//! The model-run table: one row per model run, one column per uncertain variable.
//!
//! Each run is identified by a dense, zero-based run ID, in the order in which samples were
//! generated, along with the scenario and the sample ID within that scenario.
use crate::id::{ScenarioID, VariableKey};
use crate::input::bounds::ParameterTable;
use crate::input::{ScalarParameters, input_err_msg};
use crate::sampling::{SampleMatrix, sample_scenario};
use anyhow::{Context, Result, ensure};
use itertools::Itertools;
use log::info;
use rand::Rng;
use std::path::Path;

/// The key columns which precede the variable columns
const KEY_COLUMNS: [&str; 3] = ["run_id", "scenario", "sample_id"];

/// A single model run
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRun {
    /// Globally unique ID of the run
    pub run_id: usize,
    /// The scenario the run belongs to
    pub scenario: ScenarioID,
    /// ID of the sample within the scenario
    pub sample_id: usize,
    /// Sampled values, in the order of the table's variables
    pub values: Vec<f64>,
}

/// All model runs of an experiment
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRunTable {
    variables: Vec<VariableKey>,
    runs: Vec<ModelRun>,
}

impl ModelRunTable {
    /// Concatenate per-scenario sample matrices into a table, assigning run IDs.
    ///
    /// Every matrix must have the same variables in the same order.
    pub fn from_samples<I>(matrices: I) -> Result<Self>
    where
        I: IntoIterator<Item = SampleMatrix>,
    {
        let mut variables: Option<Vec<VariableKey>> = None;
        let mut runs = Vec::new();
        for matrix in matrices {
            ensure!(
                !matrix.variables.is_empty(),
                "Scenario {} has no uncertain variables",
                matrix.scenario
            );
            let expected = variables.get_or_insert_with(|| matrix.variables.clone());
            ensure!(
                *expected == matrix.variables,
                "Scenario {} has different uncertain variables ({}) from previous scenarios ({})",
                matrix.scenario,
                matrix.variables.iter().join(", "),
                expected.iter().join(", ")
            );

            for (sample_id, values) in matrix.iter() {
                runs.push(ModelRun {
                    run_id: runs.len(),
                    scenario: matrix.scenario.clone(),
                    sample_id,
                    values: values.to_vec(),
                });
            }
        }

        let variables = variables.context("No scenarios to sample")?;
        Ok(Self { variables, runs })
    }

    /// The labels of the variable columns
    pub fn variables(&self) -> &[VariableKey] {
        &self.variables
    }

    /// The number of runs
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// Whether the table has no runs
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Iterate over runs in run ID order
    pub fn iter(&self) -> impl Iterator<Item = &ModelRun> {
        self.runs.iter()
    }

    /// Get the run with the given ID
    pub fn get(&self, run_id: usize) -> Result<&ModelRun> {
        self.runs.get(run_id).with_context(|| {
            format!(
                "Run ID {run_id} not found; the table has {} runs",
                self.runs.len()
            )
        })
    }

    /// Override scalar parameters with the sampled values of a run
    pub fn apply_to(&self, run: &ModelRun, params: &mut ScalarParameters) -> Result<()> {
        for (key, value) in self.variables.iter().zip(run.values.iter()) {
            params
                .set(&key.name, *value)
                .with_context(|| format!("Could not apply sampled value for {key}"))?;
        }

        Ok(())
    }

    /// Write the table to a CSV file
    pub fn write(&self, file_path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(file_path)?;
        writer.write_record(
            KEY_COLUMNS
                .iter()
                .map(ToString::to_string)
                .chain(self.variables.iter().map(ToString::to_string)),
        )?;
        for run in &self.runs {
            writer.write_record(
                [
                    run.run_id.to_string(),
                    run.scenario.to_string(),
                    run.sample_id.to_string(),
                ]
                .into_iter()
                .chain(run.values.iter().map(ToString::to_string)),
            )?;
        }
        writer.flush()?;

        Ok(())
    }

    /// Read a table previously written with [`ModelRunTable::write`]
    pub fn read(file_path: &Path) -> Result<Self> {
        Self::read_inner(file_path).with_context(|| input_err_msg(file_path))
    }

    fn read_inner(file_path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(file_path)?;
        let headers = reader.headers()?.clone();
        ensure!(
            headers.len() > KEY_COLUMNS.len()
                && headers.iter().take(KEY_COLUMNS.len()).eq(KEY_COLUMNS),
            "Expected columns {} followed by at least one variable",
            KEY_COLUMNS.join(", ")
        );
        let variables: Vec<VariableKey> = headers
            .iter()
            .skip(KEY_COLUMNS.len())
            .map(|label| {
                VariableKey::parse(label)
                    .with_context(|| format!("Invalid variable label: {label}"))
            })
            .try_collect()?;

        let mut runs = Vec::new();
        for record in reader.records() {
            let record = record?;
            let run_id: usize = record[0].parse().context("Invalid run_id")?;
            ensure!(
                run_id == runs.len(),
                "Run IDs must be dense and in order, found {run_id} at row {}",
                runs.len()
            );
            let values: Vec<f64> = record
                .iter()
                .skip(KEY_COLUMNS.len())
                .map(|field| {
                    field
                        .parse()
                        .with_context(|| format!("Invalid value '{field}' for run {run_id}"))
                })
                .try_collect()?;
            runs.push(ModelRun {
                run_id,
                scenario: record[1].into(),
                sample_id: record[2].parse().context("Invalid sample_id")?,
                values,
            });
        }

        Ok(Self { variables, runs })
    }
}

/// Sample every scenario and build the model-run table.
///
/// # Arguments
///
/// * `table` - The parameter table holding the bounds of uncertain variables
/// * `scenarios` - The scenarios to sample, in order
/// * `n_samples` - The number of samples per scenario
/// * `rng` - The random number generator
pub fn create_model_runs<R: Rng>(
    table: &ParameterTable,
    scenarios: &[ScenarioID],
    n_samples: usize,
    rng: &mut R,
) -> Result<ModelRunTable> {
    let matrices: Vec<SampleMatrix> = scenarios
        .iter()
        .map(|scenario| {
            let bounds = table.uncertain_bounds(scenario)?;
            info!(
                "Sampling {} uncertain variables for scenario {scenario}",
                bounds.len()
            );
            sample_scenario(&bounds, n_samples, rng)
        })
        .try_collect()?;

    ModelRunTable::from_samples(matrices)
}
