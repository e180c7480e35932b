//! Assembly of the solar cooling system from scalar parameters and time series.
//!
//! The topology is fixed: gas and grid electricity are bought, solar collectors and PV feed in
//! along their profiles, a boiler and an absorption chiller turn heat into cooling, and a cooling
//! tower rejects the chiller's waste heat. Each of the cool, thermal and electricity busses has a
//! storage.
use super::{
    BusID, CapacityMode, Component, EnergySystem, FlowDirection, FlowKey, FlowSpec, Investment,
    StorageParams,
};
use crate::finance::ep_costs;
use crate::input::{ScalarParameters, TimeSeries};
use crate::units::{Capacity, Dimensionless, Flow, MoneyPerCapacity, MoneyPerFlow};
use anyhow::{Context, Result, ensure};
use chrono::NaiveDateTime;
use log::debug;

/// Time series column with the solar collector yield per unit of capacity
pub const SOLAR_GAIN_COLUMN: &str = "solar gain kWprom2";
/// Time series column with the normalised PV yield
pub const PV_COLUMN: &str = "PV normiert";
/// Time series column with the cooling load
pub const COOLING_LOAD_COLUMN: &str = "Cooling load kW";

/// Storages: (label suffix used in parameter names, component label, bus label, technology)
const STORAGES: [(&str, &str, &str, &str); 3] = [
    ("cool", "storage_cool", "cool", "cold_water_tank"),
    ("thermal", "storage_thermal", "thermal", "hot_water_tank"),
    ("el", "storage_electricity", "electricity", "battery"),
];

/// Turns capital cost parameters into investment options
struct Annualiser<'a> {
    params: &'a ScalarParameters,
    wacc: Dimensionless,
}

impl<'a> Annualiser<'a> {
    fn new(params: &'a ScalarParameters) -> Result<Self> {
        Ok(Self {
            params,
            wacc: params.get_unit("wacc")?,
        })
    }

    /// Create an investment option from capex, lifetime and opex parameters.
    ///
    /// `capex_multiplier` optionally names a parameter scaling the capital cost.
    fn investment(
        &self,
        capex: &str,
        lifetime: &str,
        opex: &str,
        capex_multiplier: Option<&str>,
    ) -> Result<Investment> {
        let mut capex_value: MoneyPerCapacity = self.params.get_unit(capex)?;
        if let Some(multiplier) = capex_multiplier {
            capex_value = capex_value * self.params.get_unit::<Dimensionless>(multiplier)?;
        }
        let lifetime_value = self.params.get_years(lifetime)?;
        let opex_value = self.params.get_unit(opex)?;
        let ep_costs = ep_costs(capex_value, lifetime_value, opex_value, self.wacc)
            .with_context(|| format!("Could not annualise {capex}"))?;
        debug!("Equivalent periodical costs from {capex}: {ep_costs}");

        Ok(Investment::new(ep_costs))
    }

    /// Resolve a capacity which is invested in if its nominal value is zero
    fn capacity_mode(
        &self,
        nominal: &str,
        capex: &str,
        lifetime: &str,
        opex: &str,
        capex_multiplier: Option<&str>,
    ) -> Result<CapacityMode> {
        CapacityMode::from_nominal(self.params.get(nominal)?, || {
            self.investment(capex, lifetime, opex, capex_multiplier)
        })
        .with_context(|| format!("Invalid value for parameter {nominal}"))
    }
}

/// Build the solar cooling system.
///
/// # Arguments
///
/// * `params` - The resolved scalar parameters, including any sampled overrides
/// * `series` - The time series, already truncated to the number of timesteps to model. The boiler
///   limit uses the cooling load of every row originally read.
/// * `timeindex` - One timestamp per timestep
pub fn build_cooling_system(
    params: &ScalarParameters,
    series: &TimeSeries,
    timeindex: Vec<NaiveDateTime>,
) -> Result<EnergySystem> {
    ensure!(
        series.len() == timeindex.len(),
        "Time series has {} rows but there are {} timesteps",
        series.len(),
        timeindex.len()
    );

    let annualiser = Annualiser::new(params)?;
    let mut system = EnergySystem::new(timeindex);

    let thermal = system.add_bus("thermal")?;
    let cool = system.add_bus("cool")?;
    let waste = system.add_bus("waste")?;
    let electricity = system.add_bus("electricity")?;
    let gas = system.add_bus("gas")?;
    let ambient = system.add_bus("ambient")?;

    // Sinks and sources
    system.add_component(Component::sink(
        "ambience",
        "heat_rejection",
        &ambient,
        FlowSpec::new(),
    ))?;
    system.add_component(Component::source(
        "naturalgas",
        "gas_grid",
        &gas,
        FlowSpec::new().with_variable_costs(price(params, "price_gas")?),
    ))?;
    system.add_component(Component::source(
        "grid_el",
        "electricity_grid",
        &electricity,
        FlowSpec::new().with_variable_costs(price(params, "price_electr")?),
    ))?;
    system.add_component(Component::source(
        "collector",
        "solar_thermal",
        &thermal,
        FlowSpec::new()
            .with_profile(series.column(SOLAR_GAIN_COLUMN)?)
            .with_capacity(CapacityMode::Invest(annualiser.investment(
                "invest_costs_collect_output_th",
                "lifetime_collector",
                "opex_collector",
                None,
            )?)),
    ))?;
    system.add_component(Component::source(
        "pv",
        "photovoltaics",
        &electricity,
        FlowSpec::new()
            .with_profile(series.column(PV_COLUMN)?)
            .with_capacity(CapacityMode::Invest(annualiser.investment(
                "invest_costs_pv_output_el_09708",
                "lifetime_pv",
                "opex_pv",
                None,
            )?)),
    ))?;
    let cooling_load = series.column(COOLING_LOAD_COLUMN)?;
    system.add_component(Component::sink(
        "demand",
        "cooling_load",
        &cool,
        FlowSpec::new()
            .with_profile(cooling_load)
            .with_capacity(CapacityMode::Fixed(Capacity(1.0))),
    ))?;
    system.add_component(Component::sink(
        "excess_thermal",
        "excess",
        &thermal,
        FlowSpec::new(),
    ))?;
    system.add_component(Component::sink(
        "excess_el",
        "excess",
        &electricity,
        FlowSpec::new(),
    ))?;

    // Transformers
    let boiler_capacity = annualiser.capacity_mode(
        "nominal_value_boiler_output_thermal",
        "invest_costs_boiler_output_th",
        "lifetime_boiler",
        "opex_boiler",
        None,
    )?;
    system.add_component(
        Component::transformer("boiler", "gas_boiler")
            .with_input(&gas, FlowSpec::new())
            .with_output(&thermal, FlowSpec::new().with_capacity(boiler_capacity))
            .with_conversion_factor(
                &thermal,
                params.get_unit("conv_factor_boiler_output_thermal")?,
            ),
    )?;

    let chiller_investment = annualiser.investment(
        "invest_costs_absorption_output_cool",
        "lifetime_absorption",
        "opex_absorption",
        None,
    )?;
    system.add_component(
        Component::transformer("absorption_chiller", "absorption")
            .with_input(&thermal, FlowSpec::new())
            .with_input(&electricity, FlowSpec::new())
            .with_output(
                &cool,
                FlowSpec::new().with_capacity(CapacityMode::Invest(chiller_investment)),
            )
            .with_output(&waste, FlowSpec::new())
            .with_conversion_factor(
                &cool,
                params.get_unit("conv_factor_absorption_output_cool")?,
            )
            .with_conversion_factor(
                &waste,
                params.get_unit("conv_factor_absorption_output_waste")?,
            )
            .with_conversion_factor(
                &thermal,
                params.get_unit("conv_factor_absorption_input_th")?,
            )
            .with_conversion_factor(
                &electricity,
                params.get_unit("conv_factor_absorption_input_el")?,
            ),
    )?;

    let tower_investment = annualiser.investment(
        "invest_costs_tower_input_th",
        "lifetime_tower",
        "opex_tower",
        None,
    )?;
    system.add_component(
        Component::transformer("cooling_tower", "wet_cooling_tower")
            .with_input(
                &waste,
                FlowSpec::new().with_capacity(CapacityMode::Invest(tower_investment)),
            )
            .with_input(&electricity, FlowSpec::new())
            .with_output(&ambient, FlowSpec::new())
            .with_conversion_factor(&waste, params.get_unit("conv_factor_tower_input_waste")?)
            .with_conversion_factor(
                &electricity,
                params.get_unit("conv_factor_tower_input_el")?,
            ),
    )?;

    // Storages
    for (suffix, label, bus, tech) in STORAGES {
        let storage = build_storage(&annualiser, suffix, label, &BusID::from(bus), tech)?;
        system.add_component(storage)?;
    }

    // The boiler may only cover a share of the cooling demand of the whole input file, measured
    // as heat, even when fewer timesteps are modelled
    let share =
        params.get("sol_fraction_thermal")? * params.get("sol_fraction_thermal_variation")?;
    let limit = Flow(series.column_total(COOLING_LOAD_COLUMN)? * share);
    let boiler_output = FlowKey {
        component: "boiler".into(),
        bus: thermal,
        direction: FlowDirection::Output,
    };
    system
        .add_flow_sum_limit(boiler_output, limit)
        .context("Invalid limit on boiler output")?;

    Ok(system)
}

/// A price parameter multiplied by its variation factor
fn price(params: &ScalarParameters, name: &str) -> Result<MoneyPerFlow> {
    let variation: Dimensionless = params.get_unit(&format!("{name}_variation"))?;
    Ok(params.get_unit::<MoneyPerFlow>(name)? * variation)
}

fn build_storage(
    annualiser: &Annualiser,
    suffix: &str,
    label: &str,
    bus: &BusID,
    tech: &str,
) -> Result<Component> {
    let params = annualiser.params;
    let capex_multiplier = (suffix == "el").then_some("capex_stor_el_variation");
    let capacity = annualiser.capacity_mode(
        &format!("nominal_capacity_stor_{suffix}"),
        &format!("invest_costs_stor_{suffix}_capacity"),
        &format!("lifetime_stor_{suffix}"),
        &format!("opex_stor_{suffix}"),
        capex_multiplier,
    )?;
    let storage_params = StorageParams {
        capacity,
        capacity_loss: params.get_unit(&format!("capac_loss_stor_{suffix}"))?,
        inflow_conversion_factor: params.get_unit(&format!("conv_factor_stor_{suffix}_input"))?,
        outflow_conversion_factor: params
            .get_unit(&format!("conv_factor_stor_{suffix}_output"))?,
    };

    Ok(Component::storage(label, tech, bus, storage_params))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, cooling_parameters, cooling_timeseries, timeindex};
    use crate::system::ComponentKind;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    fn build(params: &ScalarParameters, series: &TimeSeries) -> Result<EnergySystem> {
        build_cooling_system(params, series, timeindex())
    }

    /// The capacity mode of a sized component's sized flow or storage
    fn capacity_mode(system: &EnergySystem, component: &str) -> CapacityMode {
        let component = system.get_component(&component.into()).unwrap();
        match &component.kind {
            ComponentKind::Storage(params) => params.capacity,
            _ => component
                .iter_flows()
                .find_map(|(_, flow)| flow.capacity)
                .unwrap(),
        }
    }

    #[rstest]
    fn builds_full_topology(cooling_parameters: ScalarParameters, cooling_timeseries: TimeSeries) {
        let system = build(&cooling_parameters, &cooling_timeseries).unwrap();
        assert_eq!(system.iter_busses().count(), 6);
        let labels: Vec<_> = system
            .iter_components()
            .map(|component| component.id.to_string())
            .collect();
        assert_eq!(
            labels,
            [
                "ambience",
                "naturalgas",
                "grid_el",
                "collector",
                "pv",
                "demand",
                "excess_thermal",
                "excess_el",
                "boiler",
                "absorption_chiller",
                "cooling_tower",
                "storage_cool",
                "storage_thermal",
                "storage_electricity",
            ]
        );
    }

    #[rstest]
    #[case("nominal_value_boiler_output_thermal", "boiler")]
    #[case("nominal_capacity_stor_cool", "storage_cool")]
    #[case("nominal_capacity_stor_thermal", "storage_thermal")]
    #[case("nominal_capacity_stor_el", "storage_electricity")]
    fn zero_nominal_capacity_means_invest(
        mut cooling_parameters: ScalarParameters,
        cooling_timeseries: TimeSeries,
        #[case] parameter: &str,
        #[case] component: &str,
    ) {
        cooling_parameters.set(parameter, 0.0).unwrap();
        let system = build(&cooling_parameters, &cooling_timeseries).unwrap();
        assert!(capacity_mode(&system, component).is_invest());

        cooling_parameters.set(parameter, 25.0).unwrap();
        let system = build(&cooling_parameters, &cooling_timeseries).unwrap();
        assert_eq!(
            capacity_mode(&system, component),
            CapacityMode::Fixed(Capacity(25.0))
        );
    }

    #[rstest]
    fn negative_nominal_capacity(
        mut cooling_parameters: ScalarParameters,
        cooling_timeseries: TimeSeries,
    ) {
        cooling_parameters
            .set("nominal_capacity_stor_cool", -1.0)
            .unwrap();
        assert_error!(
            build(&cooling_parameters, &cooling_timeseries),
            "Invalid value for parameter nominal_capacity_stor_cool"
        );
    }

    #[rstest]
    fn prices_include_variation(
        mut cooling_parameters: ScalarParameters,
        cooling_timeseries: TimeSeries,
    ) {
        cooling_parameters.set("price_gas", 0.04).unwrap();
        cooling_parameters.set("price_gas_variation", 1.5).unwrap();
        let system = build(&cooling_parameters, &cooling_timeseries).unwrap();
        let gas = system.get_component(&"naturalgas".into()).unwrap();
        assert_approx_eq!(f64, gas.outputs[0].variable_costs.0, 0.06);
    }

    #[rstest]
    fn electricity_storage_capex_variation(
        mut cooling_parameters: ScalarParameters,
        cooling_timeseries: TimeSeries,
    ) {
        cooling_parameters.set("nominal_capacity_stor_el", 0.0).unwrap();
        let ep_costs = |params: &ScalarParameters| {
            let system = build(params, &cooling_timeseries).unwrap();
            match capacity_mode(&system, "storage_electricity") {
                CapacityMode::Invest(investment) => investment.ep_costs.0,
                CapacityMode::Fixed(_) => panic!("Expected investment"),
            }
        };
        cooling_parameters.set("capex_stor_el_variation", 1.0).unwrap();
        let base = ep_costs(&cooling_parameters);
        cooling_parameters.set("capex_stor_el_variation", 2.0).unwrap();
        assert_approx_eq!(f64, ep_costs(&cooling_parameters), 2.0 * base, epsilon = 1e-9);
    }

    #[rstest]
    fn boiler_limit_from_demand(
        cooling_parameters: ScalarParameters,
        cooling_timeseries: TimeSeries,
    ) {
        let system = build(&cooling_parameters, &cooling_timeseries).unwrap();
        let limits: Vec<_> = system.iter_flow_sum_limits().collect();
        assert_eq!(limits.len(), 1);
        assert_eq!(limits[0].flow.to_string(), "boiler_thermal");

        let demand: f64 = cooling_timeseries
            .column(COOLING_LOAD_COLUMN)
            .unwrap()
            .iter()
            .sum();
        let share = cooling_parameters.get("sol_fraction_thermal").unwrap()
            * cooling_parameters
                .get("sol_fraction_thermal_variation")
                .unwrap();
        assert_approx_eq!(f64, limits[0].limit.0, demand * share);
    }

    #[rstest]
    fn boiler_limit_ignores_truncation(
        cooling_parameters: ScalarParameters,
        mut cooling_timeseries: TimeSeries,
    ) {
        cooling_timeseries.truncate(2).unwrap();
        let system = build_cooling_system(
            &cooling_parameters,
            &cooling_timeseries,
            timeindex()[..2].to_vec(),
        )
        .unwrap();
        let limit = system.iter_flow_sum_limits().next().unwrap().limit.0;

        // Cooling load of all three rows: 10 + 12 + 15
        let share = cooling_parameters.get("sol_fraction_thermal").unwrap()
            * cooling_parameters
                .get("sol_fraction_thermal_variation")
                .unwrap();
        assert_approx_eq!(f64, limit, 37.0 * share);
    }

    #[rstest]
    fn missing_parameter(mut cooling_parameters: ScalarParameters, cooling_timeseries: TimeSeries) {
        cooling_parameters = cooling_parameters
            .iter()
            .filter(|(name, _)| *name != "lifetime_tower")
            .collect();
        assert_error!(
            build(&cooling_parameters, &cooling_timeseries),
            "Missing parameter: lifetime_tower"
        );
    }

    #[rstest]
    fn missing_column(cooling_parameters: ScalarParameters) {
        let series = TimeSeries::from_columns([
            (SOLAR_GAIN_COLUMN, vec![0.0, 0.5, 0.2]),
            (COOLING_LOAD_COLUMN, vec![1.0, 1.0, 1.0]),
        ])
        .unwrap();
        assert_error!(
            build(&cooling_parameters, &series),
            "Time series has no column named 'PV normiert'"
        );
    }
}
