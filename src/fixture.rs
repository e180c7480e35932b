//! Fixtures for tests

use crate::id::VariableKey;
use crate::input::bounds::{BoundType, ParameterRowRaw, ParameterTable};
use crate::input::{ScalarParameters, TimeSeries};
use crate::system::topology::{COOLING_LOAD_COLUMN, PV_COLUMN, SOLAR_GAIN_COLUMN};
use crate::system::{EnergySystem, build_cooling_system};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use rstest::fixture;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

/// The number of timesteps used by the fixtures
pub const N_TIMESTEPS: usize = 3;

#[fixture]
pub fn timeindex() -> Vec<NaiveDateTime> {
    let start = NaiveDate::from_ymd_opt(2017, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    (0..N_TIMESTEPS as i64)
        .map(|hour| start + TimeDelta::hours(hour))
        .collect()
}

/// A complete, feasible set of parameters for the cooling system
#[fixture]
pub fn cooling_parameters() -> ScalarParameters {
    [
        ("wacc", 0.05),
        ("price_gas", 0.04),
        ("price_gas_variation", 1.0),
        ("price_electr", 0.2),
        ("price_electr_variation", 1.0),
        ("invest_costs_collect_output_th", 500.0),
        ("lifetime_collector", 20.0),
        ("opex_collector", 0.01),
        ("invest_costs_pv_output_el_09708", 800.0),
        ("lifetime_pv", 25.0),
        ("opex_pv", 0.01),
        ("nominal_value_boiler_output_thermal", 20.0),
        ("invest_costs_boiler_output_th", 100.0),
        ("lifetime_boiler", 20.0),
        ("opex_boiler", 0.02),
        ("conv_factor_boiler_output_thermal", 0.9),
        ("invest_costs_absorption_output_cool", 400.0),
        ("lifetime_absorption", 20.0),
        ("opex_absorption", 0.02),
        ("conv_factor_absorption_output_cool", 0.7),
        ("conv_factor_absorption_output_waste", 1.7),
        ("conv_factor_absorption_input_th", 1.0),
        ("conv_factor_absorption_input_el", 0.05),
        ("invest_costs_tower_input_th", 50.0),
        ("lifetime_tower", 20.0),
        ("opex_tower", 0.02),
        ("conv_factor_tower_input_waste", 1.0),
        ("conv_factor_tower_input_el", 0.02),
        ("nominal_capacity_stor_cool", 0.0),
        ("capac_loss_stor_cool", 0.005),
        ("conv_factor_stor_cool_input", 0.95),
        ("conv_factor_stor_cool_output", 0.95),
        ("invest_costs_stor_cool_capacity", 30.0),
        ("lifetime_stor_cool", 20.0),
        ("opex_stor_cool", 0.01),
        ("nominal_capacity_stor_thermal", 0.0),
        ("capac_loss_stor_thermal", 0.01),
        ("conv_factor_stor_thermal_input", 0.9),
        ("conv_factor_stor_thermal_output", 0.9),
        ("invest_costs_stor_thermal_capacity", 20.0),
        ("lifetime_stor_thermal", 20.0),
        ("opex_stor_thermal", 0.01),
        ("nominal_capacity_stor_el", 0.0),
        ("capac_loss_stor_el", 0.001),
        ("conv_factor_stor_el_input", 0.95),
        ("conv_factor_stor_el_output", 0.95),
        ("invest_costs_stor_el_capacity", 300.0),
        ("capex_stor_el_variation", 1.0),
        ("lifetime_stor_el", 10.0),
        ("opex_stor_el", 0.02),
        ("sol_fraction_thermal", 0.5),
        ("sol_fraction_thermal_variation", 1.0),
    ]
    .into_iter()
    .collect()
}

#[fixture]
pub fn cooling_timeseries() -> TimeSeries {
    TimeSeries::from_columns([
        (SOLAR_GAIN_COLUMN, vec![0.0, 0.6, 0.8]),
        (PV_COLUMN, vec![0.0, 0.5, 0.7]),
        (COOLING_LOAD_COLUMN, vec![10.0, 12.0, 15.0]),
    ])
    .unwrap()
}

#[fixture]
pub fn cooling_system(
    cooling_parameters: ScalarParameters,
    cooling_timeseries: TimeSeries,
    timeindex: Vec<NaiveDateTime>,
) -> EnergySystem {
    build_cooling_system(&cooling_parameters, &cooling_timeseries, timeindex).unwrap()
}

fn parameter_row(
    scenario: &str,
    bound_type: BoundType,
    key: &VariableKey,
    value: f64,
) -> ParameterRowRaw {
    ParameterRowRaw {
        scenario: scenario.into(),
        bound_type,
        var_group: key.group.to_string(),
        var_name: key.name.to_string(),
        var_value: value,
    }
}

/// A parameter table with two scenarios sharing two uncertain prices and one scenario with only
/// point values
#[fixture]
pub fn parameter_table() -> ParameterTable {
    let gas = VariableKey::new("price", "price_gas");
    let electr = VariableKey::new("price", "price_electr");
    let wacc = VariableKey::new("finance", "wacc");
    ParameterTable::from_rows([
        parameter_row("low_price", BoundType::Low, &gas, 0.02),
        parameter_row("low_price", BoundType::High, &gas, 0.04),
        parameter_row("low_price", BoundType::Low, &electr, 0.1),
        parameter_row("low_price", BoundType::High, &electr, 0.2),
        parameter_row("low_price", BoundType::Point, &wacc, 0.05),
        parameter_row("high_price", BoundType::Low, &gas, 0.05),
        parameter_row("high_price", BoundType::High, &gas, 0.08),
        parameter_row("high_price", BoundType::Low, &electr, 0.25),
        parameter_row("high_price", BoundType::High, &electr, 0.4),
        parameter_row("fixed", BoundType::Point, &gas, 0.04),
        parameter_row("fixed", BoundType::Point, &electr, 0.2),
    ])
    .unwrap()
}
