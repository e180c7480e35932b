//! Scalar results of a run, in a long format suited to combining runs.
//!
//! Every row is keyed by component name, component type, carrier, technology and variable name.
use crate::input::read_csv;
use crate::optimisation::{InvestKey, Solution};
use crate::system::{CapacityMode, Component, ComponentKind, EnergySystem, FlowDirection, FlowKey};
use crate::units::{Flow, UnitType};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Represents a row in the scalar results CSV file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarRow {
    /// The component label
    pub name: String,
    /// The type of component (e.g. `storage`)
    #[serde(rename = "type")]
    pub component_type: String,
    /// The bus the value refers to
    pub carrier: String,
    /// The technology of the component
    pub tech: String,
    /// The variable name, e.g. `invest` or `yearly_cool`
    pub var_name: String,
    /// The value
    pub var_value: f64,
}

impl ScalarRow {
    fn new(component: &Component, carrier: &str, var_name: &str, var_value: f64) -> Self {
        Self {
            name: component.id.to_string(),
            component_type: component.kind.type_name().into(),
            carrier: carrier.into(),
            tech: component.tech.clone(),
            var_name: var_name.into(),
            var_value,
        }
    }
}

/// Push capacity, investment and annualised capacity cost rows for a sized flow or storage
fn push_capacity_rows(
    rows: &mut Vec<ScalarRow>,
    component: &Component,
    carrier: &str,
    capacity: &CapacityMode,
    invest: Option<f64>,
) {
    let (fixed, invested, cost) = match capacity {
        CapacityMode::Fixed(capacity) => (capacity.value(), 0.0, 0.0),
        CapacityMode::Invest(investment) => {
            let invested = invest.unwrap_or_default();
            (0.0, invested, invested * investment.ep_costs.value())
        }
    };
    rows.push(ScalarRow::new(component, carrier, "capacity", fixed));
    rows.push(ScalarRow::new(component, carrier, "invest", invested));
    if capacity.is_invest() {
        rows.push(ScalarRow::new(component, carrier, "capacity_cost", cost));
    }
}

/// Derive scalar results from a solution.
///
/// For every component this gives:
///
/// * `capacity` and `invest` for each sized flow or storage, plus `capacity_cost` where the
///   capacity was invested in
/// * `yearly_<carrier>`: the sum over all timesteps of each output flow, or input flow for sinks
/// * `carrier_cost`: the variable costs of each flow which has any
pub fn compute_scalars(system: &EnergySystem, solution: &Solution) -> Vec<ScalarRow> {
    let mut rows = Vec::new();
    for component in system.iter_components() {
        for (key, flow) in component.iter_flows() {
            let carrier = key.bus.as_str();
            if let Some(capacity) = &flow.capacity {
                let invest = solution
                    .investment(&InvestKey::Flow(key.clone()))
                    .map(|capacity| capacity.value());
                push_capacity_rows(&mut rows, component, carrier, capacity, invest);
            }

            let total = flow_total(solution, &key);
            let counts_as_yearly = match key.direction {
                FlowDirection::Output => true,
                FlowDirection::Input => matches!(component.kind, ComponentKind::Sink),
            };
            if counts_as_yearly {
                rows.push(ScalarRow::new(
                    component,
                    carrier,
                    &format!("yearly_{carrier}"),
                    total.value(),
                ));
            }
            if flow.variable_costs.value() != 0.0 {
                rows.push(ScalarRow::new(
                    component,
                    carrier,
                    "carrier_cost",
                    (flow.variable_costs * total).value(),
                ));
            }
        }

        if let ComponentKind::Storage(params) = &component.kind {
            let carrier = component
                .inputs
                .keys()
                .next()
                .map_or("", |bus| bus.as_str());
            let invest = solution
                .investment(&InvestKey::Storage(component.id.clone()))
                .map(|capacity| capacity.value());
            push_capacity_rows(&mut rows, component, carrier, &params.capacity, invest);
        }
    }

    rows
}

fn flow_total(solution: &Solution, key: &FlowKey) -> Flow {
    solution
        .flow(key)
        .map(|values| values.into_iter().sum())
        .unwrap_or_default()
}

/// Write scalar rows to a CSV file
pub fn write_scalars(file_path: &Path, rows: &[ScalarRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(file_path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    Ok(())
}

/// Read scalar rows from a CSV file written by [`write_scalars`]
pub fn read_scalars(file_path: &Path) -> Result<Vec<ScalarRow>> {
    read_csv(file_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::cooling_system;
    use crate::optimisation::{SolverOptions, optimise};
    use float_cmp::assert_approx_eq;
    use rstest::rstest;
    use tempfile::tempdir;

    fn find<'a>(rows: &'a [ScalarRow], name: &str, var_name: &str) -> &'a ScalarRow {
        rows.iter()
            .find(|row| row.name == name && row.var_name == var_name)
            .unwrap_or_else(|| panic!("No {var_name} row for {name}"))
    }

    #[rstest]
    fn scalars_for_cooling_system(cooling_system: EnergySystem) {
        let solution = optimise(&cooling_system, &SolverOptions::default(), None).unwrap();
        let rows = compute_scalars(&cooling_system, &solution);

        // Demand is fixed
        let demand = find(&rows, "demand", "yearly_cool");
        assert_approx_eq!(f64, demand.var_value, 37.0, epsilon = 1e-6);
        assert_eq!(demand.component_type, "sink");
        assert_eq!(demand.tech, "cooling_load");

        // The boiler has a fixed capacity in the fixture
        assert_eq!(find(&rows, "boiler", "capacity").var_value, 20.0);
        assert_eq!(find(&rows, "boiler", "invest").var_value, 0.0);
        assert!(
            !rows
                .iter()
                .any(|row| row.name == "boiler" && row.var_name == "capacity_cost")
        );

        // Storages are invested in
        let storage = find(&rows, "storage_cool", "invest");
        assert_eq!(storage.carrier, "cool");
        assert_eq!(find(&rows, "storage_cool", "capacity").var_value, 0.0);

        // Capacity costs and carrier costs add up to the objective
        let total_cost: f64 = rows
            .iter()
            .filter(|row| row.var_name == "capacity_cost" || row.var_name == "carrier_cost")
            .map(|row| row.var_value)
            .sum();
        assert_approx_eq!(
            f64,
            total_cost,
            solution.objective_value.value(),
            epsilon = 1e-6
        );
    }

    #[rstest]
    fn write_and_read_scalars(cooling_system: EnergySystem) {
        let solution = optimise(&cooling_system, &SolverOptions::default(), None).unwrap();
        let rows = compute_scalars(&cooling_system, &solution);
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("scalars.csv");
        write_scalars(&file_path, &rows).unwrap();

        let contents = std::fs::read_to_string(&file_path).unwrap();
        assert!(contents.starts_with("name,type,carrier,tech,var_name,var_value\n"));
        assert_eq!(read_scalars(&file_path).unwrap(), rows);
    }

    #[test]
    fn read_scalars_missing_file() {
        let dir = tempdir().unwrap();
        assert!(read_scalars(&dir.path().join("scalars.csv")).is_err());
    }
}
