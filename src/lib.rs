//! Scenario sweeps and investment optimisation for small energy-system models.
//!
//! The crate samples uncertain model parameters with Latin Hypercube sampling, assembles a fixed
//! gas/thermal/electric/cooling network with storages and investment options, solves it as a
//! linear programme and writes the results as CSV tables.
#![warn(missing_docs)]
use std::env;
use std::path::PathBuf;

pub mod cli;
pub mod demo;
pub mod experiment;
pub mod finance;
pub mod id;
pub mod input;
pub mod log;
pub mod model_runs;
pub mod optimisation;
pub mod output;
pub mod sampling;
pub mod settings;
pub mod simulation;
pub mod system;
pub mod units;

#[cfg(test)]
mod fixture;

/// Get the directory from which program settings are read.
///
/// This can be overridden with the `ENERSWEEP_CONFIG_DIR` environment variable. Otherwise the
/// current working directory is used.
pub fn get_config_dir() -> PathBuf {
    if let Ok(dir) = env::var("ENERSWEEP_CONFIG_DIR") {
        return PathBuf::from(dir);
    }

    PathBuf::from(".")
}
