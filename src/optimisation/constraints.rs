//! Code for adding constraints to the optimisation problem.
use super::VariableMap;
use super::problem::Problem;
use crate::system::{
    BusID, CapacityMode, Component, ComponentKind, EnergySystem, FlowDirection, FlowKey, FlowSpec,
    StorageParams,
};
use crate::units::UnitType;
use itertools::iproduct;

/// Add all constraints for the energy system.
///
/// # Arguments
///
/// * `problem` - The optimisation problem
/// * `variables` - The variables in the problem
/// * `system` - The energy system
pub fn add_model_constraints(
    problem: &mut Problem,
    variables: &VariableMap,
    system: &EnergySystem,
) {
    add_bus_balance_constraints(problem, variables, system);
    for component in system.iter_components() {
        if let ComponentKind::Transformer { .. } = &component.kind {
            add_conversion_constraints(problem, variables, component, system.n_timesteps());
        }
        if let ComponentKind::Storage(params) = &component.kind {
            add_storage_constraints(problem, variables, component, params, system.n_timesteps());
        }
        for (key, flow) in component.iter_flows() {
            add_investment_flow_constraints(problem, variables, &key, flow, system.n_timesteps());
        }
    }
    add_flow_sum_constraints(problem, variables, system);
}

/// Inflows to each bus must equal outflows in every timestep
fn add_bus_balance_constraints(
    problem: &mut Problem,
    variables: &VariableMap,
    system: &EnergySystem,
) {
    for (bus, t) in iproduct!(system.iter_busses(), 0..system.n_timesteps()) {
        let terms: Vec<_> = system
            .iter_flows()
            .filter(|(key, _)| key.bus == *bus)
            .map(|(key, _)| {
                let coeff = match key.direction {
                    FlowDirection::Output => 1.0,
                    FlowDirection::Input => -1.0,
                };
                (variables.get_flow_var(&key, t), coeff)
            })
            .collect();
        problem.add_row(&format!("bus_balance({bus}_{t})"), 0.0..=0.0, terms);
    }
}

/// Flows of a transformer are tied together by their conversion factors.
///
/// For every pair of input `i` and output `o`: `flow(i) * factor(o) = flow(o) * factor(i)`.
fn add_conversion_constraints(
    problem: &mut Problem,
    variables: &VariableMap,
    component: &Component,
    n_timesteps: usize,
) {
    for (input, output, t) in iproduct!(
        component.inputs.keys(),
        component.outputs.keys(),
        0..n_timesteps
    ) {
        let input_key = component_flow_key(component, input, FlowDirection::Input);
        let output_key = component_flow_key(component, output, FlowDirection::Output);
        let terms = [
            (
                variables.get_flow_var(&input_key, t),
                component.conversion_factor(output).value(),
            ),
            (
                variables.get_flow_var(&output_key, t),
                -component.conversion_factor(input).value(),
            ),
        ];
        problem.add_row(
            &format!("conversion({}_{input}_{output}_{t})", component.id),
            0.0..=0.0,
            terms,
        );
    }
}

fn component_flow_key(component: &Component, bus: &BusID, direction: FlowDirection) -> FlowKey {
    FlowKey {
        component: component.id.clone(),
        bus: bus.clone(),
        direction,
    }
}

/// Flows with an invested capacity are limited by it (or follow their profile times it)
fn add_investment_flow_constraints(
    problem: &mut Problem,
    variables: &VariableMap,
    key: &FlowKey,
    flow: &FlowSpec,
    n_timesteps: usize,
) {
    let Some(CapacityMode::Invest(_)) = flow.capacity else {
        return;
    };
    let invest = variables.get_flow_invest_var(key);
    for t in 0..n_timesteps {
        let var = variables.get_flow_var(key, t);
        let name = format!("investment_flow({key}_{t})");
        match &flow.profile {
            Some(profile) => problem.add_row(&name, 0.0..=0.0, [(var, 1.0), (invest, -profile[t])]),
            None => problem.add_row(&name, ..=0.0, [(var, 1.0), (invest, -1.0)]),
        }
    }
}

/// Storage content balance, cyclic boundary condition and invested capacity limits.
///
/// ```text
/// content(t) = content(t-1) * (1 - loss) + inflow(t) * inflow_factor
///              - outflow(t) / outflow_factor
/// ```
///
/// where `content(-1)` is the initial content, which must also equal the final content.
fn add_storage_constraints(
    problem: &mut Problem,
    variables: &VariableMap,
    component: &Component,
    params: &StorageParams,
    n_timesteps: usize,
) {
    let id = &component.id;
    let bus = component
        .inputs
        .keys()
        .next()
        .expect("Storage must have an input");
    let inflow_key = component_flow_key(component, bus, FlowDirection::Input);
    let outflow_key = component_flow_key(component, bus, FlowDirection::Output);
    let initial = variables.get_initial_content_var(id);
    let retention = 1.0 - params.capacity_loss.value();

    for t in 0..n_timesteps {
        let previous = if t == 0 {
            initial
        } else {
            variables.get_content_var(id, t - 1)
        };
        let terms = [
            (variables.get_content_var(id, t), 1.0),
            (previous, -retention),
            (
                variables.get_flow_var(&inflow_key, t),
                -params.inflow_conversion_factor.value(),
            ),
            (
                variables.get_flow_var(&outflow_key, t),
                1.0 / params.outflow_conversion_factor.value(),
            ),
        ];
        problem.add_row(&format!("storage_balance({id}_{t})"), 0.0..=0.0, terms);
    }

    problem.add_row(
        &format!("storage_balanced({id})"),
        0.0..=0.0,
        [
            (variables.get_content_var(id, n_timesteps - 1), 1.0),
            (initial, -1.0),
        ],
    );

    if let CapacityMode::Invest(_) = params.capacity {
        let invest = variables.get_storage_invest_var(id);
        problem.add_row(
            &format!("storage_initial_content({id})"),
            ..=0.0,
            [(initial, 1.0), (invest, -1.0)],
        );
        for t in 0..n_timesteps {
            problem.add_row(
                &format!("storage_content_limit({id}_{t})"),
                ..=0.0,
                [(variables.get_content_var(id, t), 1.0), (invest, -1.0)],
            );
        }
    }
}

/// The sum of a flow over all timesteps is limited
fn add_flow_sum_constraints(problem: &mut Problem, variables: &VariableMap, system: &EnergySystem) {
    for limit in system.iter_flow_sum_limits() {
        let terms: Vec<_> = (0..system.n_timesteps())
            .map(|t| (variables.get_flow_var(&limit.flow, t), 1.0))
            .collect();
        problem.add_row(
            &format!("flow_sum_limit({})", limit.flow),
            ..=limit.limit.value(),
            terms,
        );
    }
}
