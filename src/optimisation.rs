//! Code for turning an energy system into a linear programme and solving it.
//!
//! Decision variables are the flows in every timestep, invested capacities and storage contents.
//! The objective is the sum of variable flow costs and equivalent periodical investment costs.
use crate::system::{CapacityMode, ComponentID, ComponentKind, EnergySystem, FlowKey};
use crate::units::{Capacity, Flow, Money, UnitType};
use anyhow::{Context, Result, ensure};
use highs::{HighsModelStatus, Sense};
use indexmap::IndexMap;
use log::info;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::{Duration, Instant};

pub mod cbc;
mod constraints;
pub mod problem;
use constraints::add_model_constraints;
use problem::{Problem, Variable};

/// The solvers which can be used
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SolverKind {
    /// HiGHS, linked into the program
    #[default]
    Highs,
    /// The CBC command-line solver
    Cbc,
}

/// Options for a solve
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SolverOptions {
    /// Which solver to use
    pub solver: SolverKind,
    /// Whether to show the solver's own output
    pub verbose: bool,
}

/// What a capacity variable refers to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InvestKey {
    /// The capacity of a flow
    Flow(FlowKey),
    /// The storage capacity of a storage
    Storage(ComponentID),
}

impl InvestKey {
    /// The component the capacity belongs to
    pub fn component(&self) -> &ComponentID {
        match self {
            Self::Flow(key) => &key.component,
            Self::Storage(id) => id,
        }
    }
}

impl fmt::Display for InvestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flow(key) => write!(f, "{key}"),
            Self::Storage(id) => write!(f, "{id}"),
        }
    }
}

/// A map for easy lookup of variables in the problem.
///
/// Used both to define constraints and to read the values of variables from the solution.
#[derive(Debug, Default)]
pub struct VariableMap {
    flow_vars: IndexMap<FlowKey, Vec<Variable>>,
    invest_vars: IndexMap<InvestKey, Variable>,
    content_vars: IndexMap<ComponentID, Vec<Variable>>,
    initial_content_vars: IndexMap<ComponentID, Variable>,
}

impl VariableMap {
    /// Add all variables for the energy system to the problem
    fn new(problem: &mut Problem, system: &EnergySystem) -> Self {
        let mut variables = Self::default();
        let n_timesteps = system.n_timesteps();

        for (key, flow) in system.iter_flows() {
            let cost = flow.variable_costs.value();
            let vars = (0..n_timesteps)
                .map(|t| {
                    let name = format!("flow({key}_{t})");
                    match (&flow.capacity, &flow.profile) {
                        (Some(CapacityMode::Fixed(capacity)), Some(profile)) => {
                            let value = profile[t] * capacity.value();
                            problem.add_column(&name, cost, value..=value)
                        }
                        (Some(CapacityMode::Fixed(capacity)), None) => {
                            problem.add_column(&name, cost, 0.0..=capacity.value())
                        }
                        _ => problem.add_column(&name, cost, 0.0..),
                    }
                })
                .collect();
            variables.flow_vars.insert(key.clone(), vars);

            if let Some(CapacityMode::Invest(investment)) = &flow.capacity {
                let var = add_invest_column(
                    problem,
                    &format!("invest({key})"),
                    investment.ep_costs.value(),
                    investment.maximum,
                );
                variables.invest_vars.insert(InvestKey::Flow(key), var);
            }
        }

        for component in system.iter_components() {
            let ComponentKind::Storage(params) = &component.kind else {
                continue;
            };
            let id = &component.id;
            let upper = match params.capacity {
                CapacityMode::Fixed(capacity) => capacity.value(),
                CapacityMode::Invest(investment) => {
                    let var = add_invest_column(
                        problem,
                        &format!("invest({id})"),
                        investment.ep_costs.value(),
                        investment.maximum,
                    );
                    variables.invest_vars.insert(InvestKey::Storage(id.clone()), var);
                    f64::INFINITY
                }
            };
            let initial = problem.add_column(&format!("init_content({id})"), 0.0, 0.0..=upper);
            variables.initial_content_vars.insert(id.clone(), initial);
            let content = (0..n_timesteps)
                .map(|t| {
                    problem.add_column(&format!("storage_content({id}_{t})"), 0.0, 0.0..=upper)
                })
                .collect();
            variables.content_vars.insert(id.clone(), content);
        }

        variables
    }

    /// Get the flow [`Variable`] for the given timestep
    fn get_flow_var(&self, key: &FlowKey, t: usize) -> Variable {
        self.flow_vars.get(key).expect("No variable found for flow")[t]
    }

    fn get_flow_invest_var(&self, key: &FlowKey) -> Variable {
        *self
            .invest_vars
            .get(&InvestKey::Flow(key.clone()))
            .expect("No investment variable found for flow")
    }

    fn get_storage_invest_var(&self, id: &ComponentID) -> Variable {
        *self
            .invest_vars
            .get(&InvestKey::Storage(id.clone()))
            .expect("No investment variable found for storage")
    }

    fn get_content_var(&self, id: &ComponentID, t: usize) -> Variable {
        self.content_vars
            .get(id)
            .expect("No content variables found for storage")[t]
    }

    fn get_initial_content_var(&self, id: &ComponentID) -> Variable {
        *self
            .initial_content_vars
            .get(id)
            .expect("No initial content variable found for storage")
    }
}

fn add_invest_column(
    problem: &mut Problem,
    name: &str,
    ep_costs: f64,
    maximum: Option<Capacity>,
) -> Variable {
    let upper = maximum.map_or(f64::INFINITY, |maximum| maximum.value());
    problem.add_column(name, ep_costs, 0.0..=upper)
}

/// The termination status reported by a solver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolverStatus {
    /// An optimal solution was found
    Optimal,
    /// The problem has no feasible solution
    Infeasible,
    /// The objective is unbounded
    Unbounded,
    /// Any other status, as reported by the solver
    Other(String),
}

impl fmt::Display for SolverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Optimal => write!(f, "optimal"),
            Self::Infeasible => write!(f, "infeasible"),
            Self::Unbounded => write!(f, "unbounded"),
            Self::Other(status) => write!(f, "{status}"),
        }
    }
}

impl From<HighsModelStatus> for SolverStatus {
    fn from(status: HighsModelStatus) -> Self {
        match status {
            HighsModelStatus::Optimal => Self::Optimal,
            HighsModelStatus::Infeasible => Self::Infeasible,
            HighsModelStatus::Unbounded => Self::Unbounded,
            status => Self::Other(format!("{status:?}")),
        }
    }
}

/// Defines the possible errors that can occur when running the solver
#[derive(Debug, Clone)]
pub enum ModelError {
    /// The model definition is incoherent.
    ///
    /// Users should not be able to trigger this error.
    Incoherent(String),
    /// An optimal solution could not be found
    NonOptimal(SolverStatus),
    /// The solver could not be run or its output could not be read
    SolverFailed(String),
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::Incoherent(status) => write!(f, "Incoherent model: {status}"),
            ModelError::NonOptimal(status) => {
                write!(f, "Could not find optimal result: {status}")
            }
            ModelError::SolverFailed(msg) => write!(f, "Solver failed: {msg}"),
        }
    }
}

impl Error for ModelError {}

/// The raw output of a successful solve
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOutput {
    /// Value of every column
    pub columns: Vec<f64>,
    /// The objective value
    pub objective_value: f64,
    /// The termination status
    pub status: SolverStatus,
}

/// Try to solve the problem with HiGHS, returning an error if the model is incoherent or result is
/// non-optimal
pub fn solve_optimal(problem: &Problem, verbose: bool) -> Result<SolverOutput, ModelError> {
    let mut model = problem.to_highs().optimise(Sense::Minimise);
    model.set_option("output_flag", verbose);
    let solved = model
        .try_solve()
        .map_err(|status| ModelError::Incoherent(format!("{status:?}")))?;

    match solved.status() {
        HighsModelStatus::Optimal => Ok(SolverOutput {
            columns: solved.get_solution().columns().to_vec(),
            objective_value: solved.objective_value(),
            status: SolverStatus::Optimal,
        }),
        status => Err(ModelError::NonOptimal(status.into())),
    }
}

/// Statistics about a solve
#[derive(Debug, Clone, PartialEq)]
pub struct SolveMeta {
    /// The solver used
    pub solver: SolverKind,
    /// The termination status
    pub status: SolverStatus,
    /// Number of rows (constraints)
    pub n_rows: usize,
    /// Number of columns (variables)
    pub n_cols: usize,
    /// Number of nonzero coefficients
    pub n_nonzeros: usize,
    /// Wall-clock time taken by the solver
    pub duration: Duration,
}

/// The solution to the optimisation problem
#[derive(Debug)]
pub struct Solution {
    columns: Vec<f64>,
    variables: VariableMap,
    /// The objective value for the solution
    pub objective_value: Money,
    /// Statistics about the solve
    pub meta: SolveMeta,
}

impl Solution {
    /// The flow in each timestep
    pub fn flow(&self, key: &FlowKey) -> Option<Vec<Flow>> {
        let vars = self.variables.flow_vars.get(key)?;
        Some(vars.iter().map(|var| Flow(self.columns[var.index()])).collect())
    }

    /// Iterate over every flow with its value in each timestep
    pub fn iter_flows(&self) -> impl Iterator<Item = (&FlowKey, Vec<Flow>)> {
        self.variables.flow_vars.iter().map(|(key, vars)| {
            let values = vars
                .iter()
                .map(|var| Flow(self.columns[var.index()]))
                .collect();
            (key, values)
        })
    }

    /// Iterate over invested capacities
    pub fn iter_investments(&self) -> impl Iterator<Item = (&InvestKey, Capacity)> {
        self.variables
            .invest_vars
            .iter()
            .map(|(key, var)| (key, Capacity(self.columns[var.index()])))
    }

    /// The invested capacity for the given key, if it is a decision variable
    pub fn investment(&self, key: &InvestKey) -> Option<Capacity> {
        let var = self.variables.invest_vars.get(key)?;
        Some(Capacity(self.columns[var.index()]))
    }

    /// Iterate over storages with their initial content and content at the end of each timestep
    pub fn iter_storage_content(&self) -> impl Iterator<Item = (&ComponentID, f64, Vec<f64>)> {
        self.variables.content_vars.iter().map(|(id, vars)| {
            let initial = self.variables.initial_content_vars[id];
            let content = vars.iter().map(|var| self.columns[var.index()]).collect();
            (id, self.columns[initial.index()], content)
        })
    }
}

/// Build the optimisation problem for an energy system without solving it
pub fn build_problem(system: &EnergySystem) -> Result<(Problem, VariableMap)> {
    ensure!(
        system.n_timesteps() > 0,
        "The energy system must have at least one timestep"
    );
    let mut problem = Problem::default();
    let variables = VariableMap::new(&mut problem, system);
    add_model_constraints(&mut problem, &variables, system);

    Ok((problem, variables))
}

/// Write a problem to an LP file
pub fn write_lp_file(problem: &Problem, file_path: &Path) -> Result<()> {
    info!("Writing LP file to {}", file_path.display());
    let file = File::create(file_path)
        .with_context(|| format!("Could not create {}", file_path.display()))?;
    problem.write_lp(BufWriter::new(file))?;

    Ok(())
}

/// Build and solve the optimisation problem for an energy system.
///
/// # Arguments
///
/// * `system` - The energy system
/// * `options` - Which solver to use and how
/// * `lp_file_path` - If given, the problem is also written to this path in LP format
pub fn optimise(
    system: &EnergySystem,
    options: &SolverOptions,
    lp_file_path: Option<&Path>,
) -> Result<Solution> {
    let (problem, variables) = build_problem(system)?;
    info!(
        "Built problem with {} variables and {} constraints",
        problem.num_cols(),
        problem.num_rows()
    );
    if let Some(file_path) = lp_file_path {
        write_lp_file(&problem, file_path)?;
    }

    info!("Solving with {}", options.solver);
    let start = Instant::now();
    let output = match options.solver {
        SolverKind::Highs => solve_optimal(&problem, options.verbose),
        SolverKind::Cbc => cbc::solve(&problem, options.verbose),
    }?;
    let duration = start.elapsed();
    info!(
        "Solver finished with status {} and objective {} in {:.3}s",
        output.status,
        output.objective_value,
        duration.as_secs_f64()
    );

    Ok(Solution {
        meta: SolveMeta {
            solver: options.solver,
            status: output.status,
            n_rows: problem.num_rows(),
            n_cols: problem.num_cols(),
            n_nonzeros: problem.num_nonzeros(),
            duration,
        },
        objective_value: Money(output.objective_value),
        columns: output.columns,
        variables,
    })
}
