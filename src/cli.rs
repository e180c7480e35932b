//! The command line interface for enersweep.
use crate::experiment::{Experiment, load_run_inputs};
use crate::log;
use crate::model_runs::{ModelRunTable, create_model_runs};
use crate::output::combine::{combine_scalars, drop_names, pivot, write_combined};
use crate::output::graph::{GRAPH_FILE_NAME, save_system_graph};
use crate::output::metadata::{RunMetadata, write_metadata};
use crate::output::{SCALARS_FILE_NAME, create_output_directory, get_output_dir};
use crate::sampling::create_rng;
use crate::settings::Settings;
use ::log::{info, warn};
use anyhow::{Context, Result, ensure};
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};

pub mod demo;
use demo::DemoSubcommands;

pub mod settings;
use settings::SettingsSubcommands;

/// The name of the folder for combined results, under the results root
const COMBINED_DIR_NAME: &str = "combined";

/// The name of the folder for graphs, under the experiment's results folder
const GRAPH_DIR_NAME: &str = "graph";

/// The command line interface for enersweep.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// The available commands.
    #[command(subcommand)]
    command: Option<Commands>,
    /// Flag to provide the CLI docs as markdown
    #[arg(long, hide = true)]
    markdown_help: bool,
}

/// Options for the `sample` command
#[derive(Args)]
pub struct SampleOpts {
    /// Directory to write the model-run table to
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
    /// Whether to overwrite an existing model-run table
    #[arg(long)]
    pub overwrite: bool,
}

/// Options for the `run` command
#[derive(Args, Default)]
pub struct RunOpts {
    /// Directory for output files
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
    /// Whether to overwrite the output directory if it already exists
    #[arg(long)]
    pub overwrite: bool,
    /// Only model a few timesteps and write the LP file
    #[arg(long)]
    pub debug: bool,
    /// Which entry of the list of parameter files to use
    #[arg(long, default_value_t = 0)]
    pub variation: usize,
    /// Apply the sampled values of this row of the model-run table
    #[arg(long)]
    pub run_id: Option<usize>,
    /// Path to the model-run table. Defaults to the one written by `sample`.
    #[arg(long, requires = "run_id")]
    pub model_runs: Option<PathBuf>,
}

/// Options for the `save-graph` command
#[derive(Args)]
pub struct GraphOpts {
    /// Directory for the graph file
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
    /// Whether to overwrite the output directory if it already exists
    #[arg(long)]
    pub overwrite: bool,
    /// Which entry of the list of parameter files to use
    #[arg(long, default_value_t = 0)]
    pub variation: usize,
}

/// Options for the `combine` command
#[derive(Args)]
pub struct CombineOpts {
    /// Directory for combined results
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
    /// Whether to overwrite the output directory if it already exists
    #[arg(long)]
    pub overwrite: bool,
    /// Drop the results of components with this name
    #[arg(long, value_name = "NAME")]
    pub drop: Vec<String>,
    /// Write a table of this variable with scenarios as rows and components as columns
    #[arg(long, value_name = "VAR_NAME")]
    pub pivot: Vec<String>,
    /// Only include this carrier in pivot tables
    #[arg(long)]
    pub carrier: Option<String>,
}

/// The available commands.
#[derive(Subcommand)]
enum Commands {
    /// Sample uncertain parameters and write the model-run table.
    Sample {
        /// Path to the experiment configuration file.
        config_path: PathBuf,
        /// Other options
        #[command(flatten)]
        opts: SampleOpts,
    },
    /// Solve an energy system model.
    Run {
        /// Path to the experiment configuration file.
        config_path: PathBuf,
        /// Other run options
        #[command(flatten)]
        opts: RunOpts,
    },
    /// Validate an experiment without solving it.
    Validate {
        /// Path to the experiment configuration file.
        config_path: PathBuf,
    },
    /// Write the energy system graph as a DOT file.
    SaveGraph {
        /// Path to the experiment configuration file.
        config_path: PathBuf,
        /// Other options
        #[command(flatten)]
        opts: GraphOpts,
    },
    /// Combine the scalar results of several runs.
    Combine {
        /// Result directories, one per scenario. Directory names are used as scenario labels.
        #[arg(required = true)]
        result_dirs: Vec<PathBuf>,
        /// Other options
        #[command(flatten)]
        opts: CombineOpts,
    },
    /// Manage demo experiments.
    Demo {
        /// The available subcommands for managing demo experiments.
        #[command(subcommand)]
        subcommand: DemoSubcommands,
    },
    /// Manage settings file.
    Settings {
        /// The subcommands for managing the settings file.
        #[command(subcommand)]
        subcommand: SettingsSubcommands,
    },
}

impl Commands {
    /// Execute the supplied CLI command
    fn execute(self) -> Result<()> {
        match self {
            Self::Sample { config_path, opts } => handle_sample_command(&config_path, &opts, None),
            Self::Run { config_path, opts } => handle_run_command(&config_path, &opts, None),
            Self::Validate { config_path } => handle_validate_command(&config_path, None),
            Self::SaveGraph { config_path, opts } => {
                handle_save_graph_command(&config_path, &opts, None)
            }
            Self::Combine { result_dirs, opts } => {
                handle_combine_command(&result_dirs, &opts, None)
            }
            Self::Demo { subcommand } => subcommand.execute(),
            Self::Settings { subcommand } => subcommand.execute(),
        }
    }
}

/// Parse CLI arguments and start enersweep
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    // Invoked as: `$ enersweep --markdown-help`
    if cli.markdown_help {
        clap_markdown::print_help_markdown::<Cli>();
        return Ok(());
    }

    if let Some(command) = cli.command {
        command.execute()?;
    } else {
        // No command provided. Show help.
        Cli::command().print_long_help()?;
    }

    Ok(())
}

/// Load program settings, if not provided
fn load_settings(settings: Option<Settings>) -> Result<Settings> {
    match settings {
        Some(settings) => Ok(settings),
        None => Settings::load().context("Failed to load settings."),
    }
}

/// Handle the `sample` command.
pub fn handle_sample_command(
    config_path: &Path,
    opts: &SampleOpts,
    settings: Option<Settings>,
) -> Result<()> {
    let settings = load_settings(settings)?;
    log::init(&settings.log_level, None).context("Failed to initialise logging.")?;

    let experiment = Experiment::load(config_path).context("Failed to load experiment.")?;
    let sampling = experiment.sampling()?;

    let output_path = match &opts.output_dir {
        Some(path) => path.clone(),
        None => get_output_dir(config_path, &settings.results_root)?,
    };
    fs::create_dir_all(&output_path)
        .with_context(|| format!("Failed to create {}", output_path.display()))?;
    let file_path = output_path.join(&sampling.model_runs);
    ensure!(
        opts.overwrite || settings.overwrite || !file_path.exists(),
        "{} already exists. Please delete it or pass the --overwrite command-line option.",
        file_path.display()
    );

    let table = experiment
        .read_parameter_table()
        .context("Failed to load parameter table.")?;
    let scenarios = experiment.scenarios(&table);
    let mut rng = create_rng(sampling.seed);
    let runs = create_model_runs(&table, &scenarios, sampling.n_samples, &mut rng)?;
    runs.write(&file_path)?;
    info!(
        "Wrote {} model runs for {} scenarios to {}",
        runs.len(),
        scenarios.len(),
        file_path.display()
    );

    Ok(())
}

/// Handle the `run` command.
pub fn handle_run_command(
    config_path: &Path,
    opts: &RunOpts,
    settings: Option<Settings>,
) -> Result<()> {
    let mut settings = load_settings(settings)?;
    if opts.overwrite {
        settings.overwrite = true;
    }

    let mut experiment = Experiment::load(config_path).context("Failed to load experiment.")?;
    if opts.debug {
        experiment.config.debug = true;
    }
    let label = experiment.run_label(opts.variation, opts.run_id);
    let experiment_dir = get_output_dir(config_path, &settings.results_root)?;

    // Get path to output folder
    let output_path = match &opts.output_dir {
        Some(path) => path.clone(),
        None => experiment_dir.join(&label),
    };
    let overwrite =
        create_output_directory(&output_path, settings.overwrite).with_context(|| {
            format!(
                "Failed to create output directory: {}",
                output_path.display()
            )
        })?;

    // Initialise program logger
    log::init(&settings.log_level, Some(&output_path))
        .context("Failed to initialise logging.")?;

    info!("Starting enersweep v{}", env!("CARGO_PKG_VERSION"));
    info!("Run {label} of experiment {}", config_path.display());
    info!("Output folder: {}", output_path.display());

    // NB: We have to wait until the logger is initialised to display this warning
    if overwrite {
        warn!("Output folder will be overwritten");
    }

    let model_runs = match opts.run_id {
        Some(run_id) => {
            let file_path = match &opts.model_runs {
                Some(path) => path.clone(),
                None => experiment_dir.join(&experiment.sampling()?.model_runs),
            };
            info!("Reading model runs from {}", file_path.display());
            Some((ModelRunTable::read(&file_path)?, run_id))
        }
        None => None,
    };
    let inputs = load_run_inputs(
        &experiment,
        opts.variation,
        model_runs.as_ref().map(|(runs, run_id)| (runs, *run_id)),
    )
    .context("Failed to load model inputs.")?;

    write_metadata(
        &output_path,
        RunMetadata::new(config_path, &label, opts.run_id, opts.variation),
    )?;
    crate::simulation::run(
        &inputs,
        &experiment.solver_options(),
        &output_path,
        experiment.config.debug,
    )?;
    info!("Run complete!");

    Ok(())
}

/// Handle the `validate` command.
pub fn handle_validate_command(config_path: &Path, settings: Option<Settings>) -> Result<()> {
    let settings = load_settings(settings)?;

    // Initialise program logger (we won't save log files when running the validate command)
    log::init(&settings.log_level, None).context("Failed to initialise logging.")?;

    let experiment = Experiment::load(config_path).context("Failed to validate experiment.")?;
    for variation in 0..experiment.n_variations() {
        load_run_inputs(&experiment, variation, None)
            .with_context(|| format!("Failed to validate variation {variation}."))?;
    }

    if experiment.config.sampling.is_some() {
        let table = experiment
            .read_parameter_table()
            .context("Failed to validate parameter table.")?;
        for scenario in experiment.scenarios(&table) {
            let bounds = table.uncertain_bounds(&scenario)?;
            ensure!(
                !bounds.is_empty(),
                "Scenario {scenario} has no uncertain variables"
            );
        }
    }
    info!("Experiment validation successful!");

    Ok(())
}

/// Handle the `save-graph` command.
pub fn handle_save_graph_command(
    config_path: &Path,
    opts: &GraphOpts,
    settings: Option<Settings>,
) -> Result<()> {
    let mut settings = load_settings(settings)?;
    if opts.overwrite {
        settings.overwrite = true;
    }

    let output_path = match &opts.output_dir {
        Some(path) => path.clone(),
        None => get_output_dir(config_path, &settings.results_root)?.join(GRAPH_DIR_NAME),
    };
    let overwrite =
        create_output_directory(&output_path, settings.overwrite).with_context(|| {
            format!(
                "Failed to create graph directory: {}",
                output_path.display()
            )
        })?;

    // Initialise program logger (we won't save log files when running this command)
    log::init(&settings.log_level, None).context("Failed to initialise logging.")?;

    // NB: We have to wait until the logger is initialised to display this warning
    if overwrite {
        warn!("Graph directory will be overwritten");
    }

    let experiment = Experiment::load(config_path).context("Failed to load experiment.")?;
    let inputs = load_run_inputs(&experiment, opts.variation, None)
        .context("Failed to build energy system.")?;
    let file_path = output_path.join(GRAPH_FILE_NAME);
    save_system_graph(&inputs.system, &file_path)?;
    info!("Graph saved to: {}", file_path.display());

    Ok(())
}

/// Handle the `combine` command.
pub fn handle_combine_command(
    result_dirs: &[PathBuf],
    opts: &CombineOpts,
    settings: Option<Settings>,
) -> Result<()> {
    let mut settings = load_settings(settings)?;
    if opts.overwrite {
        settings.overwrite = true;
    }

    let output_path = match &opts.output_dir {
        Some(path) => path.clone(),
        None => settings.results_root.join(COMBINED_DIR_NAME),
    };
    let overwrite =
        create_output_directory(&output_path, settings.overwrite).with_context(|| {
            format!(
                "Failed to create output directory: {}",
                output_path.display()
            )
        })?;

    log::init(&settings.log_level, None).context("Failed to initialise logging.")?;
    if overwrite {
        warn!("Output folder will be overwritten");
    }

    let mut rows = combine_scalars(result_dirs).context("Failed to combine results.")?;
    let file_path = output_path.join(SCALARS_FILE_NAME);
    write_combined(&file_path, &rows)?;
    info!("Saved combined results to {}", file_path.display());

    drop_names(&mut rows, &opts.drop);
    for var_name in &opts.pivot {
        let file_path = output_path.join(format!("{var_name}.csv"));
        pivot(&rows, var_name, opts.carrier.as_deref())?.write(&file_path)?;
        info!("Saved {var_name} table to {}", file_path.display());
    }

    Ok(())
}
