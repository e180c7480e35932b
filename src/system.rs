//! The energy system: busses, components and the flows connecting them.
//!
//! A bus balances one energy carrier. Components draw flows from busses (inputs) and feed flows
//! into busses (outputs). Every flow therefore connects a declared bus with a declared component.
use crate::id::define_id_type;
use crate::units::{Capacity, Dimensionless, Flow, MoneyPerCapacity, MoneyPerFlow, UnitType};
use anyhow::{Context, Result, bail, ensure};
use chrono::NaiveDateTime;
use indexmap::{IndexMap, IndexSet};
use petgraph::graph::Graph;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

pub mod topology;
pub use topology::build_cooling_system;

define_id_type! {BusID}
define_id_type! {ComponentID}

/// The direction of a flow, relative to its component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum FlowDirection {
    /// From the bus into the component
    Input,
    /// From the component into the bus
    Output,
}

/// Identifies a single flow in the system
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlowKey {
    /// The component at one end of the flow
    pub component: ComponentID,
    /// The bus at the other end of the flow
    pub bus: BusID,
    /// Whether the flow goes into or out of the component
    pub direction: FlowDirection,
}

impl FlowKey {
    /// The name of the node the flow starts at
    pub fn source(&self) -> &str {
        match self.direction {
            FlowDirection::Input => self.bus.as_str(),
            FlowDirection::Output => self.component.as_str(),
        }
    }

    /// The name of the node the flow ends at
    pub fn target(&self) -> &str {
        match self.direction {
            FlowDirection::Input => self.component.as_str(),
            FlowDirection::Output => self.bus.as_str(),
        }
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.source(), self.target())
    }
}

/// Parameters of a capacity that is chosen by the optimisation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Investment {
    /// Equivalent periodical costs per unit of capacity
    pub ep_costs: MoneyPerCapacity,
    /// Upper limit on the capacity, if any
    pub maximum: Option<Capacity>,
}

impl Investment {
    /// Create a new, unlimited investment option
    pub fn new(ep_costs: MoneyPerCapacity) -> Self {
        Self {
            ep_costs,
            maximum: None,
        }
    }
}

/// How the capacity of a flow or a storage is determined
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CapacityMode {
    /// The capacity is given
    Fixed(Capacity),
    /// The capacity is a decision variable
    Invest(Investment),
}

impl CapacityMode {
    /// Interpret a nominal-capacity parameter from a parameter table.
    ///
    /// Parameter tables use a nominal capacity of zero to request investment mode, so this is the
    /// one place where that convention is decoded. `investment` is only evaluated if it is needed.
    pub fn from_nominal<F>(nominal: f64, investment: F) -> Result<Self>
    where
        F: FnOnce() -> Result<Investment>,
    {
        ensure!(
            nominal.is_finite() && nominal >= 0.0,
            "Nominal capacity must be a finite number greater than or equal to zero, got {nominal}"
        );

        if nominal == 0.0 {
            Ok(Self::Invest(investment()?))
        } else {
            Ok(Self::Fixed(Capacity(nominal)))
        }
    }

    /// Whether the capacity is a decision variable
    pub fn is_invest(&self) -> bool {
        matches!(self, Self::Invest(_))
    }
}

/// The attributes of a single flow
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowSpec {
    /// Cost per unit of flow
    pub variable_costs: MoneyPerFlow,
    /// The capacity of the flow. Unbounded if `None`.
    pub capacity: Option<CapacityMode>,
    /// A fixed profile, relative to the capacity, which the flow must follow
    pub profile: Option<Rc<[f64]>>,
}

impl FlowSpec {
    /// An unbounded flow with no costs
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the variable costs
    pub fn with_variable_costs(self, variable_costs: MoneyPerFlow) -> Self {
        Self {
            variable_costs,
            ..self
        }
    }

    /// Set the capacity mode
    pub fn with_capacity(self, capacity: CapacityMode) -> Self {
        Self {
            capacity: Some(capacity),
            ..self
        }
    }

    /// Make the flow follow a fixed profile, relative to its capacity
    pub fn with_profile(self, profile: &[f64]) -> Self {
        Self {
            profile: Some(Rc::from(profile)),
            ..self
        }
    }
}

/// Parameters specific to storages
#[derive(Debug, Clone, PartialEq)]
pub struct StorageParams {
    /// The storage capacity
    pub capacity: CapacityMode,
    /// Proportion of the content lost in each timestep
    pub capacity_loss: Dimensionless,
    /// Efficiency of charging
    pub inflow_conversion_factor: Dimensionless,
    /// Efficiency of discharging
    pub outflow_conversion_factor: Dimensionless,
}

/// The different types of component
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentKind {
    /// Feeds energy into the system
    Source,
    /// Takes energy out of the system
    Sink,
    /// Converts inputs into outputs with fixed ratios.
    ///
    /// Carriers without an entry have a conversion factor of one.
    Transformer {
        /// Conversion factor for each connected bus
        conversion_factors: IndexMap<BusID, Dimensionless>,
    },
    /// Stores energy of a single carrier between timesteps
    Storage(StorageParams),
}

impl ComponentKind {
    /// A short name for the type of component
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Sink => "sink",
            Self::Transformer { .. } => "transformer",
            Self::Storage(_) => "storage",
        }
    }
}

/// A component of the energy system
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    /// Unique label
    pub id: ComponentID,
    /// The technology the component represents (e.g. `solar_thermal`)
    pub tech: String,
    /// What type of component this is
    pub kind: ComponentKind,
    /// Flows from busses into the component
    pub inputs: IndexMap<BusID, FlowSpec>,
    /// Flows from the component into busses
    pub outputs: IndexMap<BusID, FlowSpec>,
}

impl Component {
    fn new(id: &str, tech: &str, kind: ComponentKind) -> Self {
        Self {
            id: id.into(),
            tech: tech.into(),
            kind,
            inputs: IndexMap::new(),
            outputs: IndexMap::new(),
        }
    }

    /// A source feeding a single bus
    pub fn source(id: &str, tech: &str, bus: &BusID, flow: FlowSpec) -> Self {
        Self::new(id, tech, ComponentKind::Source).with_output(bus, flow)
    }

    /// A sink drawing from a single bus
    pub fn sink(id: &str, tech: &str, bus: &BusID, flow: FlowSpec) -> Self {
        Self::new(id, tech, ComponentKind::Sink).with_input(bus, flow)
    }

    /// A transformer with no flows yet
    pub fn transformer(id: &str, tech: &str) -> Self {
        Self::new(
            id,
            tech,
            ComponentKind::Transformer {
                conversion_factors: IndexMap::new(),
            },
        )
    }

    /// A storage charged from and discharged into a single bus
    pub fn storage(id: &str, tech: &str, bus: &BusID, params: StorageParams) -> Self {
        Self::new(id, tech, ComponentKind::Storage(params))
            .with_input(bus, FlowSpec::new())
            .with_output(bus, FlowSpec::new())
    }

    /// Add an input flow
    pub fn with_input(mut self, bus: &BusID, flow: FlowSpec) -> Self {
        self.inputs.insert(bus.clone(), flow);
        self
    }

    /// Add an output flow
    pub fn with_output(mut self, bus: &BusID, flow: FlowSpec) -> Self {
        self.outputs.insert(bus.clone(), flow);
        self
    }

    /// Set a transformer's conversion factor for a bus.
    ///
    /// # Panics
    ///
    /// If the component is not a transformer.
    pub fn with_conversion_factor(mut self, bus: &BusID, factor: Dimensionless) -> Self {
        let ComponentKind::Transformer { conversion_factors } = &mut self.kind else {
            panic!("Conversion factors can only be set for transformers");
        };
        conversion_factors.insert(bus.clone(), factor);
        self
    }

    /// Iterate over all flows of the component, inputs first
    pub fn iter_flows(&self) -> impl Iterator<Item = (FlowKey, &FlowSpec)> {
        let inputs = self.inputs.iter().map(|(bus, flow)| {
            (self.flow_key(bus, FlowDirection::Input), flow)
        });
        let outputs = self.outputs.iter().map(|(bus, flow)| {
            (self.flow_key(bus, FlowDirection::Output), flow)
        });
        inputs.chain(outputs)
    }

    fn flow_key(&self, bus: &BusID, direction: FlowDirection) -> FlowKey {
        FlowKey {
            component: self.id.clone(),
            bus: bus.clone(),
            direction,
        }
    }

    /// The conversion factor for a bus (transformers only; one if not set)
    pub fn conversion_factor(&self, bus: &BusID) -> Dimensionless {
        match &self.kind {
            ComponentKind::Transformer { conversion_factors } => conversion_factors
                .get(bus)
                .copied()
                .unwrap_or(Dimensionless(1.0)),
            _ => Dimensionless(1.0),
        }
    }

    /// Check that the component is well formed
    fn validate(&self, n_timesteps: usize) -> Result<()> {
        match &self.kind {
            ComponentKind::Source => ensure!(
                self.inputs.is_empty() && !self.outputs.is_empty(),
                "A source must have outputs and no inputs"
            ),
            ComponentKind::Sink => ensure!(
                !self.inputs.is_empty() && self.outputs.is_empty(),
                "A sink must have inputs and no outputs"
            ),
            ComponentKind::Transformer { conversion_factors } => {
                ensure!(
                    !self.inputs.is_empty() && !self.outputs.is_empty(),
                    "A transformer must have both inputs and outputs"
                );
                for (bus, factor) in conversion_factors {
                    ensure!(
                        self.inputs.contains_key(bus) || self.outputs.contains_key(bus),
                        "Conversion factor given for unconnected bus {bus}"
                    );
                    ensure!(
                        factor.is_finite() && *factor > Dimensionless(0.0),
                        "Conversion factor for bus {bus} must be a finite number greater than zero"
                    );
                }
            }
            ComponentKind::Storage(params) => {
                ensure!(
                    self.inputs.len() == 1
                        && self.outputs.len() == 1
                        && self.inputs.keys().eq(self.outputs.keys()),
                    "A storage must have one input and one output on the same bus"
                );
                ensure!(
                    (0.0..1.0).contains(&params.capacity_loss.0),
                    "Capacity loss must be in the range [0, 1)"
                );
                for factor in [
                    params.inflow_conversion_factor,
                    params.outflow_conversion_factor,
                ] {
                    ensure!(
                        factor.is_finite() && factor > Dimensionless(0.0),
                        "Storage conversion factors must be finite numbers greater than zero"
                    );
                }
                validate_capacity(&params.capacity)?;
            }
        }

        for (key, flow) in self.iter_flows() {
            validate_flow(flow, n_timesteps).with_context(|| format!("Invalid flow {key}"))?;
        }

        Ok(())
    }
}

fn validate_capacity(capacity: &CapacityMode) -> Result<()> {
    match capacity {
        CapacityMode::Fixed(capacity) => ensure!(
            capacity.is_finite() && *capacity > Capacity(0.0),
            "Fixed capacity must be a finite number greater than zero"
        ),
        CapacityMode::Invest(investment) => {
            ensure!(
                investment.ep_costs.is_finite(),
                "Investment costs must be finite"
            );
            if let Some(maximum) = investment.maximum {
                ensure!(
                    maximum >= Capacity(0.0),
                    "Maximum investment must not be negative"
                );
            }
        }
    }

    Ok(())
}

fn validate_flow(flow: &FlowSpec, n_timesteps: usize) -> Result<()> {
    ensure!(
        flow.variable_costs.is_finite(),
        "Variable costs must be finite"
    );
    if let Some(capacity) = &flow.capacity {
        validate_capacity(capacity)?;
    }
    if let Some(profile) = &flow.profile {
        ensure!(
            flow.capacity.is_some(),
            "A flow with a fixed profile must have a capacity"
        );
        ensure!(
            profile.len() >= n_timesteps,
            "Profile has {} values but there are {n_timesteps} timesteps",
            profile.len()
        );
        ensure!(
            profile.iter().all(|value| value.is_finite() && *value >= 0.0),
            "Profile values must be finite numbers greater than or equal to zero"
        );
    }

    Ok(())
}

/// A limit on the total of a flow over all timesteps
#[derive(Debug, Clone, PartialEq)]
pub struct FlowSumLimit {
    /// The limited flow
    pub flow: FlowKey,
    /// The maximum sum over all timesteps
    pub limit: Flow,
}

/// An energy system ready to be turned into an optimisation problem
#[derive(Debug, Clone, PartialEq)]
pub struct EnergySystem {
    timeindex: Vec<NaiveDateTime>,
    busses: IndexSet<BusID>,
    components: IndexMap<ComponentID, Component>,
    flow_sum_limits: Vec<FlowSumLimit>,
}

impl EnergySystem {
    /// Create an empty energy system with the given time index
    pub fn new(timeindex: Vec<NaiveDateTime>) -> Self {
        Self {
            timeindex,
            busses: IndexSet::new(),
            components: IndexMap::new(),
            flow_sum_limits: Vec::new(),
        }
    }

    /// Declare a new bus
    pub fn add_bus(&mut self, id: &str) -> Result<BusID> {
        let id = BusID::from(id);
        ensure!(
            !self.components.contains_key(id.as_str()),
            "Bus {id} has the same label as a component"
        );
        ensure!(self.busses.insert(id.clone()), "Duplicate bus: {id}");

        Ok(id)
    }

    /// Add a component, checking that it only connects to declared busses
    pub fn add_component(&mut self, component: Component) -> Result<()> {
        let id = component.id.clone();
        ensure!(
            !self.busses.contains(id.as_str()),
            "Component {id} has the same label as a bus"
        );
        ensure!(
            !self.components.contains_key(&id),
            "Duplicate component: {id}"
        );
        for (key, _) in component.iter_flows() {
            ensure!(
                self.busses.contains(&key.bus),
                "Component {id} references undeclared bus {}",
                key.bus
            );
        }
        component
            .validate(self.timeindex.len())
            .with_context(|| format!("Invalid component {id}"))?;
        self.components.insert(id, component);

        Ok(())
    }

    /// Limit the sum of a flow over all timesteps
    pub fn add_flow_sum_limit(&mut self, flow: FlowKey, limit: Flow) -> Result<()> {
        let exists = self
            .get_component(&flow.component)
            .is_ok_and(|component| component.iter_flows().any(|(key, _)| key == flow));
        ensure!(exists, "Cannot limit unknown flow {flow}");
        ensure!(
            limit.is_finite() && limit >= Flow(0.0),
            "Limit for flow {flow} must be a finite number greater than or equal to zero"
        );
        self.flow_sum_limits.push(FlowSumLimit { flow, limit });

        Ok(())
    }

    /// The timestamps of the timesteps
    pub fn timeindex(&self) -> &[NaiveDateTime] {
        &self.timeindex
    }

    /// The number of timesteps
    pub fn n_timesteps(&self) -> usize {
        self.timeindex.len()
    }

    /// Iterate over busses in declaration order
    pub fn iter_busses(&self) -> impl Iterator<Item = &BusID> {
        self.busses.iter()
    }

    /// Iterate over components in declaration order
    pub fn iter_components(&self) -> impl Iterator<Item = &Component> {
        self.components.values()
    }

    /// Look up a component
    pub fn get_component(&self, id: &ComponentID) -> Result<&Component> {
        match self.components.get(id) {
            Some(component) => Ok(component),
            None => bail!("Unknown component: {id}"),
        }
    }

    /// Iterate over every flow in the system
    pub fn iter_flows(&self) -> impl Iterator<Item = (FlowKey, &FlowSpec)> {
        self.components.values().flat_map(Component::iter_flows)
    }

    /// Iterate over the limits on flow sums
    pub fn iter_flow_sum_limits(&self) -> impl Iterator<Item = &FlowSumLimit> {
        self.flow_sum_limits.iter()
    }

    /// Build a directed graph of the system, with busses and components as nodes and flows as
    /// edges
    pub fn to_graph(&self) -> Graph<String, String> {
        let mut graph = Graph::new();
        let mut nodes = HashMap::new();
        for bus in &self.busses {
            nodes.insert(bus.as_str(), graph.add_node(format!("bus: {bus}")));
        }
        for component in self.components.values() {
            nodes.insert(
                component.id.as_str(),
                graph.add_node(format!("{}: {}", component.kind.type_name(), component.id)),
            );
        }
        for (key, flow) in self.iter_flows() {
            let label = match &flow.capacity {
                Some(CapacityMode::Invest(_)) => "invest".to_string(),
                Some(CapacityMode::Fixed(capacity)) => format!("{capacity}"),
                None => String::new(),
            };
            graph.add_edge(nodes[key.source()], nodes[key.target()], label);
        }

        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, timeindex};
    use rstest::rstest;

    fn storage_params() -> StorageParams {
        StorageParams {
            capacity: CapacityMode::Fixed(Capacity(10.0)),
            capacity_loss: Dimensionless(0.01),
            inflow_conversion_factor: Dimensionless(0.9),
            outflow_conversion_factor: Dimensionless(0.9),
        }
    }

    #[rstest]
    #[case(0.0, true)]
    #[case(5.0, false)]
    #[case(1e-9, false)]
    fn capacity_mode_from_nominal(#[case] nominal: f64, #[case] expect_invest: bool) {
        let mode = CapacityMode::from_nominal(nominal, || {
            Ok(Investment::new(MoneyPerCapacity(100.0)))
        })
        .unwrap();
        assert_eq!(mode.is_invest(), expect_invest);
        if !expect_invest {
            assert_eq!(mode, CapacityMode::Fixed(Capacity(nominal)));
        }
    }

    #[rstest]
    #[case(-1.0)]
    #[case(f64::NAN)]
    #[case(f64::INFINITY)]
    fn capacity_mode_from_nominal_invalid(#[case] nominal: f64) {
        assert!(
            CapacityMode::from_nominal(nominal, || Ok(Investment::new(MoneyPerCapacity(1.0))))
                .is_err()
        );
    }

    #[test]
    fn capacity_mode_fixed_skips_investment() {
        let mode = CapacityMode::from_nominal(3.0, || bail!("should not be evaluated")).unwrap();
        assert_eq!(mode, CapacityMode::Fixed(Capacity(3.0)));
    }

    #[rstest]
    fn add_component_undeclared_bus(timeindex: Vec<NaiveDateTime>) {
        let mut system = EnergySystem::new(timeindex);
        let gas = system.add_bus("gas").unwrap();
        let heat = BusID::from("heat");
        let boiler = Component::transformer("boiler", "gas_boiler")
            .with_input(&gas, FlowSpec::new())
            .with_output(&heat, FlowSpec::new());
        assert_error!(
            system.add_component(boiler),
            "Component boiler references undeclared bus heat"
        );
    }

    #[rstest]
    fn add_duplicates(timeindex: Vec<NaiveDateTime>) {
        let mut system = EnergySystem::new(timeindex);
        let gas = system.add_bus("gas").unwrap();
        assert!(system.add_bus("gas").is_err());

        let source = Component::source("naturalgas", "grid", &gas, FlowSpec::new());
        system.add_component(source.clone()).unwrap();
        assert_error!(
            system.add_component(source),
            "Duplicate component: naturalgas"
        );
        assert!(system.add_bus("naturalgas").is_err());
    }

    #[rstest]
    fn profile_requires_capacity(timeindex: Vec<NaiveDateTime>) {
        let mut system = EnergySystem::new(timeindex);
        let cool = system.add_bus("cool").unwrap();
        let demand = Component::sink(
            "demand",
            "cooling_load",
            &cool,
            FlowSpec::new().with_profile(&[1.0, 2.0, 3.0]),
        );
        assert!(system.add_component(demand).is_err());
    }

    #[rstest]
    fn profile_too_short(timeindex: Vec<NaiveDateTime>) {
        let mut system = EnergySystem::new(timeindex);
        let cool = system.add_bus("cool").unwrap();
        let demand = Component::sink(
            "demand",
            "cooling_load",
            &cool,
            FlowSpec::new()
                .with_capacity(CapacityMode::Fixed(Capacity(1.0)))
                .with_profile(&[1.0]),
        );
        assert!(system.add_component(demand).is_err());
    }

    #[rstest]
    #[case(Dimensionless(1.0), Dimensionless(0.9))]
    #[case(Dimensionless(0.0), Dimensionless(0.0))]
    #[case(Dimensionless(0.1), Dimensionless(-0.5))]
    fn invalid_storage(
        timeindex: Vec<NaiveDateTime>,
        #[case] capacity_loss: Dimensionless,
        #[case] conversion_factor: Dimensionless,
    ) {
        let mut system = EnergySystem::new(timeindex);
        let heat = system.add_bus("heat").unwrap();
        let params = StorageParams {
            capacity_loss,
            inflow_conversion_factor: conversion_factor,
            ..storage_params()
        };
        let storage = Component::storage("storage_thermal", "hot_water_tank", &heat, params);
        assert!(system.add_component(storage).is_err());
    }

    #[rstest]
    fn flow_sum_limit_unknown_flow(timeindex: Vec<NaiveDateTime>) {
        let mut system = EnergySystem::new(timeindex);
        let gas = system.add_bus("gas").unwrap();
        system
            .add_component(Component::source("naturalgas", "grid", &gas, FlowSpec::new()))
            .unwrap();

        let flow = FlowKey {
            component: "naturalgas".into(),
            bus: gas.clone(),
            direction: FlowDirection::Input,
        };
        assert!(system.add_flow_sum_limit(flow, Flow(1.0)).is_err());

        let flow = FlowKey {
            component: "naturalgas".into(),
            bus: gas,
            direction: FlowDirection::Output,
        };
        system.add_flow_sum_limit(flow, Flow(1.0)).unwrap();
        assert_eq!(system.iter_flow_sum_limits().count(), 1);
    }

    #[rstest]
    fn to_graph_has_every_node_and_flow(timeindex: Vec<NaiveDateTime>) {
        let mut system = EnergySystem::new(timeindex);
        let heat = system.add_bus("heat").unwrap();
        system
            .add_component(Component::storage(
                "storage_thermal",
                "hot_water_tank",
                &heat,
                storage_params(),
            ))
            .unwrap();
        let graph = system.to_graph();
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn flow_key_display() {
        let key = FlowKey {
            component: "boiler".into(),
            bus: "gas".into(),
            direction: FlowDirection::Input,
        };
        assert_eq!(key.to_string(), "gas_boiler");
        assert_eq!(key.source(), "gas");
        assert_eq!(key.target(), "boiler");
    }
}
