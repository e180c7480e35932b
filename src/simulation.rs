//! Functionality for carrying out a single model run.
use crate::experiment::RunInputs;
use crate::optimisation::{SolverOptions, optimise};
use crate::output::{DataWriter, LP_FILE_NAME};
use anyhow::{Context, Result};
use log::info;
use std::path::Path;

/// Solve the energy system of a run and write the results.
///
/// # Arguments:
///
/// * `inputs` - The parameters and assembled energy system
/// * `options` - Which solver to use and how
/// * `output_path` - The folder to which output files will be written
/// * `write_lp_file` - Whether to also write the problem in LP format
pub fn run(
    inputs: &RunInputs,
    options: &SolverOptions,
    output_path: &Path,
    write_lp_file: bool,
) -> Result<()> {
    let lp_file_path = write_lp_file.then(|| output_path.join(LP_FILE_NAME));
    let solution = optimise(&inputs.system, options, lp_file_path.as_deref())
        .context("Optimisation failed")?;
    info!("Total annual costs: {}", solution.objective_value);

    let mut writer = DataWriter::create(output_path)?;
    writer.write_solution(&inputs.system, &solution)?;
    writer.write_parameters(&inputs.system, &inputs.params)?;
    writer.write_scalars(&inputs.system, &solution)?;
    writer.flush()?;
    info!("Results written to {}", output_path.display());

    Ok(())
}
