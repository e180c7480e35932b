//! The module responsible for writing output data to disk.
use crate::input::ScalarParameters;
use crate::optimisation::{InvestKey, Solution};
use crate::system::{CapacityMode, ComponentKind, EnergySystem, FlowSpec};
use crate::units::UnitType;
use anyhow::{Context, Result, ensure};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};

pub mod combine;
pub mod graph;
pub mod metadata;
pub mod scalars;

/// The root folder in which experiment-specific output folders will be created
pub const OUTPUT_DIRECTORY_ROOT: &str = "enersweep_results";

/// The output file name for flows
const FLOWS_FILE_NAME: &str = "flows.csv";

/// The output file name for invested capacities
const INVESTMENTS_FILE_NAME: &str = "investments.csv";

/// The output file name for storage contents
const STORAGE_CONTENT_FILE_NAME: &str = "storage_content.csv";

/// The output file name for solver statistics
const META_FILE_NAME: &str = "meta.csv";

/// The output file name for the parameters of the energy system
const PARAMETERS_FILE_NAME: &str = "parameters.csv";

/// The output file name for the scalar parameters the system was built from
const SCALAR_PARAMETERS_FILE_NAME: &str = "scalar_parameters.csv";

/// The output file name for scalar results
pub const SCALARS_FILE_NAME: &str = "scalars.csv";

/// The file name for the LP file written in debug mode
pub const LP_FILE_NAME: &str = "problem.lp";

/// The format used for timestamps in output files
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Get the output directory for an experiment.
///
/// This is `<results_root>/<experiment name>`, where the experiment name is the file stem of the
/// experiment configuration file.
pub fn get_output_dir(config_path: &Path, results_root: &Path) -> Result<PathBuf> {
    let name = config_path
        .file_stem()
        .context("Experiment configuration path has no file name")?
        .to_str()
        .context("Invalid chars in experiment file name")?;

    Ok(results_root.join(name))
}

/// Create a new output directory for the model, optionally overwriting existing data
///
/// # Arguments
///
/// * `output_dir` - The output directory to create/overwrite
/// * `allow_overwrite` - Whether to delete and recreate the folder if it is non-empty
///
/// # Returns
///
/// True if the output dir contained existing data that was deleted, false if not, or an error.
pub fn create_output_directory(output_dir: &Path, allow_overwrite: bool) -> Result<bool> {
    // If the folder already exists, then delete it
    let overwrite = if let Ok(mut it) = fs::read_dir(output_dir) {
        if it.next().is_none() {
            // Folder exists and is empty: nothing to do
            return Ok(false);
        }

        ensure!(
            allow_overwrite,
            "Output folder {} already exists and is not empty. Please delete the folder or pass \
            the --overwrite command-line option.",
            output_dir.display()
        );

        fs::remove_dir_all(output_dir)?;
        true
    } else {
        false
    };

    // Try to create the directory, with parents
    fs::create_dir_all(output_dir)?;

    Ok(overwrite)
}

/// Represents a row in the flows output CSV file
#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct FlowRow {
    timestep: usize,
    datetime: String,
    component: String,
    bus: String,
    direction: String,
    value: f64,
}

/// Represents a row in the investments output CSV file
#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct InvestmentRow {
    component: String,
    /// Empty for the storage capacity of a storage
    bus: Option<String>,
    capacity: f64,
}

/// Represents a row in the storage content output CSV file
#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct StorageContentRow {
    timestep: usize,
    datetime: String,
    component: String,
    content: f64,
}

/// Represents a row in the solver statistics output CSV file
#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct MetaRow {
    key: String,
    value: String,
}

/// Represents a row in the energy system parameters output CSV file
#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct ParameterRow {
    component: String,
    bus: Option<String>,
    direction: Option<String>,
    attribute: String,
    value: f64,
}

/// Represents a row in the scalar parameters output CSV file
#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct ScalarParameterRow {
    var_name: String,
    value: f64,
}

fn format_datetime(datetime: &NaiveDateTime) -> String {
    datetime.format(DATETIME_FORMAT).to_string()
}

/// An object for writing the results of a single model run to CSV files
pub struct DataWriter {
    output_path: PathBuf,
    flows_writer: csv::Writer<File>,
    investments_writer: csv::Writer<File>,
    storage_content_writer: csv::Writer<File>,
}

impl DataWriter {
    /// Open CSV files to write output data to
    ///
    /// # Arguments
    ///
    /// * `output_path` - Folder where files will be saved
    pub fn create(output_path: &Path) -> Result<Self> {
        let new_writer = |file_name: &str| {
            let file_path = output_path.join(file_name);
            csv::Writer::from_path(&file_path)
                .with_context(|| format!("Could not create {}", file_path.display()))
        };

        Ok(Self {
            output_path: output_path.to_path_buf(),
            flows_writer: new_writer(FLOWS_FILE_NAME)?,
            investments_writer: new_writer(INVESTMENTS_FILE_NAME)?,
            storage_content_writer: new_writer(STORAGE_CONTENT_FILE_NAME)?,
        })
    }

    /// The folder output files are written to
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Write the primal results of a solve: flows, investments and storage contents
    pub fn write_solution(&mut self, system: &EnergySystem, solution: &Solution) -> Result<()> {
        let timeindex = system.timeindex();
        for (key, values) in solution.iter_flows() {
            for (t, value) in values.into_iter().enumerate() {
                self.flows_writer.serialize(FlowRow {
                    timestep: t,
                    datetime: format_datetime(&timeindex[t]),
                    component: key.component.to_string(),
                    bus: key.bus.to_string(),
                    direction: key.direction.to_string(),
                    value: value.value(),
                })?;
            }
        }

        for (key, capacity) in solution.iter_investments() {
            let bus = match key {
                InvestKey::Flow(flow) => Some(flow.bus.to_string()),
                InvestKey::Storage(_) => None,
            };
            self.investments_writer.serialize(InvestmentRow {
                component: key.component().to_string(),
                bus,
                capacity: capacity.value(),
            })?;
        }

        for (id, _, content) in solution.iter_storage_content() {
            for (t, value) in content.into_iter().enumerate() {
                self.storage_content_writer.serialize(StorageContentRow {
                    timestep: t,
                    datetime: format_datetime(&timeindex[t]),
                    component: id.to_string(),
                    content: value,
                })?;
            }
        }

        self.write_meta(system, solution)
    }

    /// Write solver statistics
    fn write_meta(&self, system: &EnergySystem, solution: &Solution) -> Result<()> {
        let meta = &solution.meta;
        let entries = [
            ("objective", solution.objective_value.to_string()),
            ("solver", meta.solver.to_string()),
            ("status", meta.status.to_string()),
            ("number_of_constraints", meta.n_rows.to_string()),
            ("number_of_variables", meta.n_cols.to_string()),
            ("number_of_nonzeros", meta.n_nonzeros.to_string()),
            ("number_of_timesteps", system.n_timesteps().to_string()),
            ("solve_time_s", format!("{:.6}", meta.duration.as_secs_f64())),
        ];

        let mut writer = csv::Writer::from_path(self.output_path.join(META_FILE_NAME))?;
        for (key, value) in entries {
            writer.serialize(MetaRow {
                key: key.into(),
                value,
            })?;
        }
        writer.flush()?;

        Ok(())
    }

    /// Write the parameters of the energy system and the scalar parameters it was built from
    pub fn write_parameters(&self, system: &EnergySystem, params: &ScalarParameters) -> Result<()> {
        let mut writer = csv::Writer::from_path(self.output_path.join(PARAMETERS_FILE_NAME))?;
        for row in parameter_rows(system) {
            writer.serialize(row)?;
        }
        writer.flush()?;

        let mut writer =
            csv::Writer::from_path(self.output_path.join(SCALAR_PARAMETERS_FILE_NAME))?;
        for (var_name, value) in params.iter() {
            writer.serialize(ScalarParameterRow {
                var_name: var_name.into(),
                value,
            })?;
        }
        writer.flush()?;

        Ok(())
    }

    /// Write scalar results for post-processing
    pub fn write_scalars(&self, system: &EnergySystem, solution: &Solution) -> Result<()> {
        scalars::write_scalars(
            &self.output_path.join(SCALARS_FILE_NAME),
            &scalars::compute_scalars(system, solution),
        )
    }

    /// Flush the underlying streams
    pub fn flush(&mut self) -> Result<()> {
        self.flows_writer.flush()?;
        self.investments_writer.flush()?;
        self.storage_content_writer.flush()?;

        Ok(())
    }
}

/// Flatten the attributes of every component into rows
fn parameter_rows(system: &EnergySystem) -> Vec<ParameterRow> {
    let mut rows = Vec::new();
    for component in system.iter_components() {
        let id = component.id.to_string();
        for (key, flow) in component.iter_flows() {
            let mut push = |attribute: &str, value: f64| {
                rows.push(ParameterRow {
                    component: id.clone(),
                    bus: Some(key.bus.to_string()),
                    direction: Some(key.direction.to_string()),
                    attribute: attribute.into(),
                    value,
                });
            };
            for (attribute, value) in flow_attributes(flow) {
                push(attribute, value);
            }
            if let ComponentKind::Transformer { .. } = &component.kind {
                push(
                    "conversion_factor",
                    component.conversion_factor(&key.bus).value(),
                );
            }
        }

        if let ComponentKind::Storage(params) = &component.kind {
            let mut push = |attribute: &str, value: f64| {
                rows.push(ParameterRow {
                    component: id.clone(),
                    bus: None,
                    direction: None,
                    attribute: attribute.into(),
                    value,
                });
            };
            let (attribute, value) = capacity_attribute(&params.capacity);
            push(attribute, value);
            push("capacity_loss", params.capacity_loss.value());
            push(
                "inflow_conversion_factor",
                params.inflow_conversion_factor.value(),
            );
            push(
                "outflow_conversion_factor",
                params.outflow_conversion_factor.value(),
            );
        }
    }

    rows
}

/// The attribute describing a capacity: the nominal value or the investment cost
fn capacity_attribute(capacity: &CapacityMode) -> (&'static str, f64) {
    match capacity {
        CapacityMode::Fixed(capacity) => ("nominal_value", capacity.value()),
        CapacityMode::Invest(investment) => ("ep_costs", investment.ep_costs.value()),
    }
}

fn flow_attributes(flow: &FlowSpec) -> Vec<(&'static str, f64)> {
    let mut attributes = vec![("variable_costs", flow.variable_costs.value())];
    if let Some(capacity) = &flow.capacity {
        attributes.push(capacity_attribute(capacity));
    }
    if let Some(profile) = &flow.profile {
        attributes.push(("profile_sum", profile.iter().sum()));
    }

    attributes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{cooling_parameters, cooling_system};
    use crate::optimisation::{SolverOptions, optimise};
    use itertools::Itertools;
    use rstest::rstest;
    use tempfile::tempdir;

    fn read_rows<T: serde::de::DeserializeOwned>(file_path: &Path) -> Vec<T> {
        csv::Reader::from_path(file_path)
            .unwrap()
            .into_deserialize()
            .try_collect()
            .unwrap()
    }

    #[test]
    fn create_output_directory_new_and_empty() {
        let dir = tempdir().unwrap();
        let output_dir = dir.path().join("results");
        assert!(!create_output_directory(&output_dir, false).unwrap());
        assert!(output_dir.is_dir());

        // Already exists but empty
        assert!(!create_output_directory(&output_dir, false).unwrap());
    }

    #[test]
    fn create_output_directory_non_empty() {
        let dir = tempdir().unwrap();
        let output_dir = dir.path().join("results");
        fs::create_dir(&output_dir).unwrap();
        fs::write(output_dir.join("flows.csv"), "old").unwrap();

        assert!(create_output_directory(&output_dir, false).is_err());
        assert!(create_output_directory(&output_dir, true).unwrap());
        assert_eq!(fs::read_dir(&output_dir).unwrap().count(), 0);
    }

    #[test]
    fn get_output_dir_uses_file_stem() {
        let dir = get_output_dir(Path::new("demos/cooling/experiment.yaml"), Path::new("out"))
            .unwrap();
        assert_eq!(dir, Path::new("out/experiment"));
    }

    #[rstest]
    fn write_results(cooling_system: EnergySystem, cooling_parameters: ScalarParameters) {
        let solution = optimise(&cooling_system, &SolverOptions::default(), None).unwrap();
        let dir = tempdir().unwrap();
        let mut writer = DataWriter::create(dir.path()).unwrap();
        writer.write_solution(&cooling_system, &solution).unwrap();
        writer
            .write_parameters(&cooling_system, &cooling_parameters)
            .unwrap();
        writer.flush().unwrap();

        let flows: Vec<FlowRow> = read_rows(&dir.path().join(FLOWS_FILE_NAME));
        let n_flows = cooling_system.iter_flows().count();
        assert_eq!(flows.len(), n_flows * cooling_system.n_timesteps());
        assert_eq!(flows[1].datetime, "2017-01-01 01:00:00");

        let investments: Vec<InvestmentRow> = read_rows(&dir.path().join(INVESTMENTS_FILE_NAME));
        assert!(investments.iter().any(|row| row.component == "storage_cool" && row.bus.is_none()));
        assert!(
            investments
                .iter()
                .any(|row| row.component == "collector" && row.bus.as_deref() == Some("thermal"))
        );

        let meta: Vec<MetaRow> = read_rows(&dir.path().join(META_FILE_NAME));
        let status = meta.iter().find(|row| row.key == "status").unwrap();
        assert_eq!(status.value, "optimal");

        let params: Vec<ScalarParameterRow> =
            read_rows(&dir.path().join(SCALAR_PARAMETERS_FILE_NAME));
        assert_eq!(params.len(), cooling_parameters.len());
    }

    #[rstest]
    fn parameter_rows_cover_conversion_factors(cooling_system: EnergySystem) {
        let rows = parameter_rows(&cooling_system);
        let boiler_factor = rows
            .iter()
            .find(|row| {
                row.component == "boiler"
                    && row.bus.as_deref() == Some("thermal")
                    && row.attribute == "conversion_factor"
            })
            .unwrap();
        assert_eq!(boiler_factor.value, 0.9);

        let storage_loss = rows
            .iter()
            .find(|row| row.component == "storage_thermal" && row.attribute == "capacity_loss")
            .unwrap();
        assert_eq!(storage_loss.value, 0.01);
    }
}
