//! Combining the scalar results of several runs for comparison.
//!
//! Each result directory is treated as one scenario, labelled with the directory's name.
use super::SCALARS_FILE_NAME;
use super::scalars::{ScalarRow, read_scalars};
use crate::input::format_items_with_cap;
use anyhow::{Context, Result, bail, ensure};
use indexmap::{IndexMap, IndexSet};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A scalar result tagged with the scenario it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedScalarRow {
    /// The scenario label
    pub scenario: String,
    /// The component label
    pub name: String,
    /// The type of component
    #[serde(rename = "type")]
    pub component_type: String,
    /// The bus the value refers to
    pub carrier: String,
    /// The technology of the component
    pub tech: String,
    /// The variable name
    pub var_name: String,
    /// The value
    pub var_value: f64,
}

impl CombinedScalarRow {
    fn new(scenario: &str, row: ScalarRow) -> Self {
        Self {
            scenario: scenario.into(),
            name: row.name,
            component_type: row.component_type,
            carrier: row.carrier,
            tech: row.tech,
            var_name: row.var_name,
            var_value: row.var_value,
        }
    }
}

/// The label of a scenario result directory
fn scenario_label(dir: &Path) -> Result<String> {
    let name = dir
        .file_name()
        .with_context(|| format!("Cannot derive scenario name from {}", dir.display()))?
        .to_str()
        .context("Invalid chars in result directory name")?;

    Ok(name.to_string())
}

/// Read and concatenate the scalar results in each directory.
///
/// Scenario labels are the directory names and must be unique.
pub fn combine_scalars(dirs: &[PathBuf]) -> Result<Vec<CombinedScalarRow>> {
    ensure!(!dirs.is_empty(), "No result directories given");

    let mut scenarios = IndexSet::new();
    let mut combined = Vec::new();
    for dir in dirs {
        let scenario = scenario_label(dir)?;
        let rows = read_scalars(&dir.join(SCALARS_FILE_NAME))?;
        info!("Read {} scalars for scenario {scenario}", rows.len());
        combined.extend(
            rows.into_iter()
                .map(|row| CombinedScalarRow::new(&scenario, row)),
        );
        ensure!(
            scenarios.insert(scenario.clone()),
            "Duplicate scenario: {scenario}"
        );
    }

    Ok(combined)
}

/// Remove the rows for the given component names
pub fn drop_names(rows: &mut Vec<CombinedScalarRow>, names: &[String]) {
    rows.retain(|row| !names.contains(&row.name));
}

/// Values of one variable with scenarios as rows and component names as columns
#[derive(Debug, Clone, PartialEq)]
pub struct Pivot {
    /// Scenarios, in the order they first appear
    pub scenarios: Vec<String>,
    /// Component names, in the order they first appear
    pub names: Vec<String>,
    values: IndexMap<(String, String), f64>,
}

impl Pivot {
    /// The value for a scenario and component. Absent combinations are zero.
    pub fn get(&self, scenario: &str, name: &str) -> f64 {
        self.values
            .get(&(scenario.to_string(), name.to_string()))
            .copied()
            .unwrap_or_default()
    }

    /// Write the table as CSV
    pub fn write(&self, file_path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(file_path)
            .with_context(|| format!("Could not create {}", file_path.display()))?;
        let header = std::iter::once("scenario").chain(self.names.iter().map(String::as_str));
        writer.write_record(header)?;
        for scenario in &self.scenarios {
            let values = self
                .names
                .iter()
                .map(|name| self.get(scenario, name).to_string());
            writer.write_record(std::iter::once(scenario.clone()).chain(values))?;
        }
        writer.flush()?;

        Ok(())
    }
}

/// Pivot the rows for one variable.
///
/// Rows with the same scenario and component name (e.g. several flows of one component) are
/// summed. If `carrier` is given, only rows for that carrier are used.
pub fn pivot(rows: &[CombinedScalarRow], var_name: &str, carrier: Option<&str>) -> Result<Pivot> {
    let selected: Vec<_> = rows
        .iter()
        .filter(|row| row.var_name == var_name)
        .filter(|row| carrier.is_none_or(|carrier| row.carrier == carrier))
        .collect();
    if selected.is_empty() {
        let available: IndexSet<_> = rows.iter().map(|row| &row.var_name).collect();
        bail!(
            "No results for variable {var_name}. Available variables: {}",
            format_items_with_cap(available)
        );
    }

    let mut scenarios = IndexSet::new();
    let mut names = IndexSet::new();
    let mut values = IndexMap::new();
    for row in selected {
        scenarios.insert(row.scenario.clone());
        names.insert(row.name.clone());
        *values
            .entry((row.scenario.clone(), row.name.clone()))
            .or_insert(0.0) += row.var_value;
    }

    Ok(Pivot {
        scenarios: scenarios.into_iter().collect(),
        names: names.into_iter().collect(),
        values,
    })
}

/// Write combined scalar results to a CSV file
pub fn write_combined(file_path: &Path, rows: &[CombinedScalarRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(file_path)
        .with_context(|| format!("Could not create {}", file_path.display()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    Ok(())
}
