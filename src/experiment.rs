//! Experiment configuration: which inputs to use, how to solve and how to sample.
//!
//! An experiment is described by a YAML file. Input file paths in it are relative to the folder
//! containing that file.
use crate::id::ScenarioID;
use crate::input::bounds::ParameterTable;
use crate::input::{
    ScalarParameters, TimeSeries, read_parameter_table, read_scalar_parameters, read_timeseries,
    read_yaml,
};
use crate::model_runs::{ModelRun, ModelRunTable};
use crate::optimisation::{SolverKind, SolverOptions};
use crate::system::{EnergySystem, build_cooling_system};
use anyhow::{Context, Result, ensure};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use log::{debug, info};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// The number of timesteps used in debug mode
pub const DEBUG_TIMESTEPS: usize = 3;

/// The default file name for the model-run table
const DEFAULT_MODEL_RUNS_FILE_NAME: &str = "model_runs.csv";

/// A single file or a list of alternatives to choose from by variation number
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FileChoice {
    /// Always the same file
    One(PathBuf),
    /// One file per variation
    Many(Vec<PathBuf>),
}

impl FileChoice {
    fn len(&self) -> usize {
        match self {
            Self::One(_) => 1,
            Self::Many(paths) => paths.len(),
        }
    }

    fn get(&self, variation: usize) -> Option<&Path> {
        match self {
            Self::One(path) => Some(path),
            Self::Many(paths) => paths.get(variation).map(PathBuf::as_path),
        }
    }
}

/// Settings for sampling uncertain parameters
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SamplingConfig {
    /// The wide parameter table holding bounds of uncertain variables
    pub parameter_table: PathBuf,
    /// The scenarios to sample. Defaults to every scenario in the parameter table.
    pub scenarios: Option<Vec<String>>,
    /// The number of samples per scenario
    pub n_samples: usize,
    /// Seed for the random number generator. A random seed is used if absent.
    pub seed: Option<u64>,
    /// The file name of the model-run table, written to the experiment's results folder
    #[serde(default = "default_model_runs_file_name")]
    pub model_runs: String,
}

fn default_model_runs_file_name() -> String {
    DEFAULT_MODEL_RUNS_FILE_NAME.into()
}

fn default_start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2017, 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .expect("Default start date is valid")
}

/// The contents of an experiment configuration file
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExperimentConfig {
    /// Number of the experiment, used in run labels
    pub exp_number: u32,
    /// The number of hourly timesteps to model
    pub number_timesteps: usize,
    /// The solver to use
    #[serde(default)]
    pub solver: SolverKind,
    /// Debug mode: only model a few timesteps and write the LP file
    #[serde(default)]
    pub debug: bool,
    /// Whether to show the solver's output
    #[serde(default)]
    pub solver_verbose: bool,
    /// The start of the first timestep
    #[serde(default = "default_start")]
    pub start: NaiveDateTime,
    /// The scalar parameters of the energy system
    pub parameters_system: FileChoice,
    /// Scalar parameters which are varied between runs, e.g. price multipliers
    pub parameters_variation: FileChoice,
    /// Time series of solar gain, PV yield and cooling load
    pub time_series_file_name: PathBuf,
    /// Sampling of uncertain parameters
    pub sampling: Option<SamplingConfig>,
}

/// A loaded experiment
#[derive(Debug, Clone, PartialEq)]
pub struct Experiment {
    /// The configuration file the experiment was loaded from
    pub config_path: PathBuf,
    /// The configuration
    pub config: ExperimentConfig,
    dir: PathBuf,
}

impl Experiment {
    /// Load and validate an experiment configuration file
    pub fn load(config_path: &Path) -> Result<Self> {
        let config: ExperimentConfig = read_yaml(config_path)?;
        let dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let experiment = Self {
            config_path: config_path.to_path_buf(),
            config,
            dir,
        };
        experiment.validate().with_context(|| {
            format!(
                "Invalid experiment configuration {}",
                config_path.display()
            )
        })?;

        Ok(experiment)
    }

    fn validate(&self) -> Result<()> {
        let config = &self.config;
        ensure!(
            config.number_timesteps > 0,
            "number_timesteps must be greater than zero"
        );
        ensure!(
            !matches!(
                (&config.parameters_system, &config.parameters_variation),
                (FileChoice::Many(_), FileChoice::Many(_))
            ),
            "Only one of parameters_system and parameters_variation may be a list"
        );
        ensure!(
            self.n_variations() > 0,
            "The list of parameter files must not be empty"
        );
        if let Some(sampling) = &config.sampling {
            ensure!(sampling.n_samples > 0, "n_samples must be greater than zero");
            ensure!(
                sampling.scenarios.as_ref().is_none_or(|s| !s.is_empty()),
                "The list of scenarios must not be empty"
            );
        }

        Ok(())
    }

    /// Resolve a path relative to the experiment folder
    fn resolve(&self, path: &Path) -> PathBuf {
        self.dir.join(path)
    }

    /// The number of parameter variations
    pub fn n_variations(&self) -> usize {
        self.config
            .parameters_system
            .len()
            .max(self.config.parameters_variation.len())
    }

    /// The system and variation parameter files for the given variation
    pub fn parameter_files(&self, variation: usize) -> Result<[PathBuf; 2]> {
        let n_variations = self.n_variations();
        let get = |choice: &FileChoice| {
            choice.get(variation).map(|path| self.resolve(path)).with_context(|| {
                format!("Variation {variation} not found; there are {n_variations} variations")
            })
        };

        Ok([
            get(&self.config.parameters_system)?,
            get(&self.config.parameters_variation)?,
        ])
    }

    /// The number of timesteps to model, which is reduced in debug mode
    pub fn n_timesteps(&self) -> usize {
        if self.config.debug {
            DEBUG_TIMESTEPS.min(self.config.number_timesteps)
        } else {
            self.config.number_timesteps
        }
    }

    /// Hourly timestamps of the modelled timesteps
    pub fn timeindex(&self) -> Vec<NaiveDateTime> {
        (0..self.n_timesteps())
            .map(|hour| self.config.start + TimeDelta::hours(hour as i64))
            .collect()
    }

    /// The solver options from the configuration
    pub fn solver_options(&self) -> SolverOptions {
        SolverOptions {
            solver: self.config.solver,
            verbose: self.config.solver_verbose,
        }
    }

    /// The sampling settings, which are required for sampling and applying model runs
    pub fn sampling(&self) -> Result<&SamplingConfig> {
        self.config
            .sampling
            .as_ref()
            .context("No sampling settings in experiment configuration")
    }

    /// Read the parameter table
    pub fn read_parameter_table(&self) -> Result<ParameterTable> {
        read_parameter_table(&self.resolve(&self.sampling()?.parameter_table))
    }

    /// The scenarios to sample
    pub fn scenarios(&self, table: &ParameterTable) -> Vec<ScenarioID> {
        match self.sampling().ok().and_then(|s| s.scenarios.as_ref()) {
            Some(scenarios) => scenarios.iter().map(|s| s.as_str().into()).collect(),
            None => table.scenarios().into_iter().collect(),
        }
    }

    /// A label for a run, which is also the name of its output folder
    pub fn run_label(&self, variation: usize, run_id: Option<usize>) -> String {
        let label = format!("exp{}_var{variation}", self.config.exp_number);
        match run_id {
            Some(run_id) => format!("{label}_run{run_id}"),
            None => label,
        }
    }

    /// Read the scalar parameters for a variation
    pub fn read_parameters(&self, variation: usize) -> Result<ScalarParameters> {
        let [system, variation_file] = self.parameter_files(variation)?;
        info!(
            "Reading parameters from {} and {}",
            system.display(),
            variation_file.display()
        );
        read_scalar_parameters(&[&system, &variation_file])
    }

    /// Read the time series, keeping only the modelled timesteps
    pub fn read_timeseries(&self) -> Result<TimeSeries> {
        let file_path = self.resolve(&self.config.time_series_file_name);
        let mut series = read_timeseries(&file_path)?;
        series
            .truncate(self.n_timesteps())
            .with_context(|| format!("Not enough timesteps in {}", file_path.display()))?;

        Ok(series)
    }
}

/// Override parameters with the values of a model run.
///
/// The deterministic (`point`) values of the run's scenario are applied first, then the sampled
/// values.
pub fn apply_model_run(
    params: &mut ScalarParameters,
    table: &ParameterTable,
    runs: &ModelRunTable,
    run: &ModelRun,
) -> Result<()> {
    info!(
        "Applying run {} (scenario {}, sample {})",
        run.run_id, run.scenario, run.sample_id
    );
    for (key, value) in table.point_values(&run.scenario) {
        debug!("Applying point value for {key}");
        params
            .set(&key.name, value)
            .with_context(|| format!("Could not apply point value for {key}"))?;
    }

    runs.apply_to(run, params)
}

/// The inputs of a single run, with the energy system assembled from them
pub struct RunInputs {
    /// The scalar parameters, after any model-run overrides
    pub params: ScalarParameters,
    /// The assembled energy system
    pub system: EnergySystem,
}

/// Load the inputs for a run and assemble the energy system.
///
/// # Arguments
///
/// * `experiment` - The experiment
/// * `variation` - Which entry of the parameter file list to use
/// * `model_runs` - The model-run table and the ID of the run to apply, if any
pub fn load_run_inputs(
    experiment: &Experiment,
    variation: usize,
    model_runs: Option<(&ModelRunTable, usize)>,
) -> Result<RunInputs> {
    let mut params = experiment.read_parameters(variation)?;
    if let Some((runs, run_id)) = model_runs {
        let table = experiment.read_parameter_table()?;
        apply_model_run(&mut params, &table, runs, runs.get(run_id)?)?;
    }

    let series = experiment.read_timeseries()?;
    let system = build_cooling_system(&params, &series, experiment.timeindex())
        .context("Failed to assemble energy system")?;
    info!(
        "Assembled energy system with {} components over {} timesteps",
        system.iter_components().count(),
        system.n_timesteps()
    );

    Ok(RunInputs { params, system })
}
