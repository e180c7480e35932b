//! Code for reading the wide parameter table and selecting the bounds of uncertain variables.
//!
//! Each row of the table is keyed by scenario, bound type, variable group and variable name. Rows
//! tagged `high` and `low` delimit the range of an uncertain variable for a given scenario, while
//! `point` rows give deterministic values.
use super::{input_err_msg, read_csv};
use crate::id::{ScenarioID, VariableKey};
use anyhow::{Context, Result, bail, ensure};
use indexmap::{IndexMap, IndexSet};
use serde::Deserialize;
use serde_string_enum::DeserializeLabeledStringEnum;
use std::path::Path;

/// The type of value in a row of the parameter table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, DeserializeLabeledStringEnum)]
pub enum BoundType {
    /// Upper bound of an uncertain variable
    #[string = "high"]
    High,
    /// Lower bound of an uncertain variable
    #[string = "low"]
    Low,
    /// A deterministic value
    #[string = "point"]
    Point,
}

#[derive(Debug, PartialEq, Deserialize)]
pub(crate) struct ParameterRowRaw {
    pub(crate) scenario: String,
    #[serde(rename = "bound")]
    pub(crate) bound_type: BoundType,
    pub(crate) var_group: String,
    pub(crate) var_name: String,
    pub(crate) var_value: f64,
}

/// The parameter table, keyed by (scenario, bound type, variable)
#[derive(Debug, Default)]
pub struct ParameterTable {
    values: IndexMap<(ScenarioID, BoundType, VariableKey), f64>,
}

/// The `[low, high]` range of a single uncertain variable
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariableBounds {
    /// Lower bound
    pub low: f64,
    /// Upper bound
    pub high: f64,
}

impl VariableBounds {
    /// Create new bounds, checking that they are finite and ordered
    pub fn new(low: f64, high: f64) -> Result<Self> {
        ensure!(
            low.is_finite() && high.is_finite(),
            "Bounds must be finite numbers"
        );
        ensure!(
            low <= high,
            "Lower bound ({low}) is greater than upper bound ({high})"
        );

        Ok(Self { low, high })
    }

    /// The width of the range
    pub fn width(&self) -> f64 {
        self.high - self.low
    }

    /// Whether `value` lies within the range (inclusive)
    pub fn contains(&self, value: f64) -> bool {
        (self.low..=self.high).contains(&value)
    }
}

/// The bounds of every uncertain variable in one scenario, in table order
#[derive(Debug, Clone, PartialEq)]
pub struct UncertainBounds {
    /// The scenario these bounds apply to
    pub scenario: ScenarioID,
    /// Bounds for each uncertain variable
    pub bounds: IndexMap<VariableKey, VariableBounds>,
}

impl UncertainBounds {
    /// The number of uncertain variables
    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    /// Whether there are no uncertain variables
    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    /// The variable labels, in table order
    pub fn keys(&self) -> impl Iterator<Item = &VariableKey> {
        self.bounds.keys()
    }
}

impl ParameterTable {
    /// Build a table from an iterator of rows, rejecting duplicate keys
    pub(crate) fn from_rows<I>(iter: I) -> Result<Self>
    where
        I: IntoIterator<Item = ParameterRowRaw>,
    {
        let mut values = IndexMap::new();
        for row in iter {
            // The group is the part of a model-run column label before the first '.'
            ensure!(
                !row.var_group.is_empty() && !row.var_group.contains('.'),
                "Variable group '{}' of {} must be non-empty and not contain '.'",
                row.var_group,
                row.var_name
            );
            let key = (
                ScenarioID::from(row.scenario),
                row.bound_type,
                VariableKey::new(&row.var_group, &row.var_name),
            );
            if values.insert(key.clone(), row.var_value).is_some() {
                bail!(
                    "Duplicate {:?} entry for variable {} in scenario {}",
                    key.1,
                    key.2,
                    key.0
                );
            }
        }

        Ok(Self { values })
    }

    /// All scenarios in the table, in order of first appearance
    pub fn scenarios(&self) -> IndexSet<ScenarioID> {
        self.values
            .keys()
            .map(|(scenario, _, _)| scenario.clone())
            .collect()
    }

    /// Look up a single value
    pub fn get(
        &self,
        scenario: &ScenarioID,
        bound_type: BoundType,
        key: &VariableKey,
    ) -> Option<f64> {
        self.values
            .get(&(scenario.clone(), bound_type, key.clone()))
            .copied()
    }

    /// Select the uncertain variables of a scenario, pairing their high and low bounds.
    ///
    /// # Returns
    ///
    /// The bounds of every variable with a `high` or `low` row, or an error if the scenario is not
    /// in the table or a variable is missing one of its bounds.
    pub fn uncertain_bounds(&self, scenario: &ScenarioID) -> Result<UncertainBounds> {
        ensure!(
            self.values.keys().any(|(s, _, _)| s == scenario),
            "Scenario {scenario} not found in parameter table"
        );

        let keys: IndexSet<&VariableKey> = self
            .values
            .keys()
            .filter(|(s, bound_type, _)| s == scenario && *bound_type != BoundType::Point)
            .map(|(_, _, key)| key)
            .collect();

        let mut bounds = IndexMap::new();
        for key in keys {
            let high = self
                .get(scenario, BoundType::High, key)
                .with_context(|| format!("Missing high bound for {key} in scenario {scenario}"))?;
            let low = self
                .get(scenario, BoundType::Low, key)
                .with_context(|| format!("Missing low bound for {key} in scenario {scenario}"))?;
            let var_bounds = VariableBounds::new(low, high)
                .with_context(|| format!("Invalid bounds for {key} in scenario {scenario}"))?;
            bounds.insert(key.clone(), var_bounds);
        }

        Ok(UncertainBounds {
            scenario: scenario.clone(),
            bounds,
        })
    }

    /// The deterministic (`point`) values of a scenario
    pub fn point_values(&self, scenario: &ScenarioID) -> IndexMap<VariableKey, f64> {
        self.values
            .iter()
            .filter(|((s, bound_type, _), _)| s == scenario && *bound_type == BoundType::Point)
            .map(|((_, _, key), value)| (key.clone(), *value))
            .collect()
    }
}

/// Read the wide parameter table from the given file.
///
/// The file must have the columns `scenario`, `bound`, `var_group`, `var_name` and `var_value`.
pub fn read_parameter_table(file_path: &Path) -> Result<ParameterTable> {
    let rows = read_csv::<ParameterRowRaw>(file_path)?;
    ParameterTable::from_rows(rows).with_context(|| input_err_msg(file_path))
}
