//! Code related to the demo experiments and the CLI commands for interacting with them.
use super::{RunOpts, handle_run_command};
use crate::demo::{DEMO_CONFIG_FILE_NAME, Demo, get_demo_names};
use crate::settings::Settings;
use anyhow::{Context, Result};
use clap::Subcommand;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// The available subcommands for managing demo experiments.
#[derive(Subcommand)]
pub enum DemoSubcommands {
    /// List available demos.
    List,
    /// Provide information about the specified demo.
    Info {
        /// The name of the demo.
        name: String,
    },
    /// Extract a demo experiment to a new directory.
    Extract {
        /// The name of the demo to extract.
        name: String,
        /// The destination folder for the demo.
        new_path: Option<PathBuf>,
    },
    /// Run a demo.
    Run {
        /// The name of the demo to run.
        name: String,
        /// Other run options
        #[command(flatten)]
        opts: RunOpts,
    },
}

impl DemoSubcommands {
    /// Execute the supplied demo subcommand
    pub fn execute(self) -> Result<()> {
        match self {
            Self::List => handle_demo_list_command(),
            Self::Info { name } => handle_demo_info_command(&name)?,
            Self::Extract { name, new_path } => {
                handle_demo_extract_command(&name, new_path.as_deref())?;
            }
            Self::Run { name, opts } => handle_demo_run_command(&name, &opts, None)?,
        }

        Ok(())
    }
}

/// Handle the `demo list` command.
fn handle_demo_list_command() {
    for name in get_demo_names() {
        println!("{name}");
    }
}

/// Handle the `demo info` command.
fn handle_demo_info_command(name: &str) -> Result<()> {
    // If we can't load it, it's a bug, hence why we panic
    let info = Demo::from_name(name)?
        .get_readme()
        .unwrap_or_else(|_| panic!("Could not load README.txt for '{name}' demo"));
    print!("{info}");

    Ok(())
}

/// Handle the `demo extract` command
fn handle_demo_extract_command(name: &str, dest: Option<&Path>) -> Result<()> {
    Demo::from_name(name)?.extract(dest.unwrap_or(Path::new(name)))
}

/// Handle the `demo run` command.
///
/// The demo is extracted to a temporary folder. Results go to the results root, under the
/// demo's name, unless an output folder is given.
pub fn handle_demo_run_command(
    name: &str,
    opts: &RunOpts,
    settings: Option<Settings>,
) -> Result<()> {
    let demo = Demo::from_name(name)?;
    let temp_dir = TempDir::new().context("Failed to create temporary directory")?;
    let demo_path = temp_dir.path().join(name);
    demo.extract(&demo_path)?;

    // Name the config file after the demo, so that results are saved under the demo's name
    let config_path = demo_path.join(format!("{name}.yaml"));
    std::fs::rename(demo_path.join(DEMO_CONFIG_FILE_NAME), &config_path)?;
    handle_run_command(&config_path, opts, settings)
}
