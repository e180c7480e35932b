//! Solving problems with the CBC command-line solver.
//!
//! The problem is written to an LP file in a temporary directory and CBC is asked to write its
//! solution next to it.
use super::problem::Problem;
use super::{ModelError, SolverOutput, SolverStatus};
use log::{debug, info};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use std::process::{Command, Stdio};

/// The name of the CBC executable, looked up on `PATH`
pub const CBC_COMMAND: &str = "cbc";

/// Solve a problem with CBC
pub fn solve(problem: &Problem, verbose: bool) -> Result<SolverOutput, ModelError> {
    let dir = tempfile::tempdir().map_err(|err| ModelError::SolverFailed(err.to_string()))?;
    let lp_path = dir.path().join("problem.lp");
    let solution_path = dir.path().join("problem.sol");
    write_lp_file(problem, &lp_path).map_err(|err| ModelError::SolverFailed(err.to_string()))?;

    debug!("Running {CBC_COMMAND} on {}", lp_path.display());
    let output = Command::new(CBC_COMMAND)
        .arg(&lp_path)
        .arg("solve")
        .arg("solu")
        .arg(&solution_path)
        .stdin(Stdio::null())
        .output()
        .map_err(|err| {
            ModelError::SolverFailed(format!("Could not run {CBC_COMMAND}: {err}"))
        })?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    if verbose {
        for line in stdout.lines() {
            info!("{CBC_COMMAND}: {line}");
        }
    }
    if !output.status.success() {
        return Err(ModelError::SolverFailed(format!(
            "{CBC_COMMAND} exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let contents = fs::read_to_string(&solution_path).map_err(|err| {
        ModelError::SolverFailed(format!("Could not read {CBC_COMMAND} solution file: {err}"))
    })?;
    parse_solution(problem, &contents)
}

fn write_lp_file(problem: &Problem, file_path: &Path) -> std::io::Result<()> {
    let file = File::create(file_path)?;
    problem.write_lp(BufWriter::new(file))
}

/// Parse the status line of a CBC solution file (e.g. `Optimal - objective value 12.5`)
fn parse_status(line: &str) -> SolverStatus {
    let status = line.split(" - ").next().unwrap_or(line).trim();
    match status.to_lowercase().as_str() {
        "optimal" => SolverStatus::Optimal,
        "infeasible" => SolverStatus::Infeasible,
        "unbounded" => SolverStatus::Unbounded,
        _ => SolverStatus::Other(status.to_string()),
    }
}

/// Parse the contents of a CBC solution file.
///
/// Each line after the status line holds a column index, name, value and reduced cost, and may be
/// prefixed with `**` if the value violates a bound. Columns which are not listed are zero.
fn parse_solution(problem: &Problem, contents: &str) -> Result<SolverOutput, ModelError> {
    let mut lines = contents.lines();
    let status_line = lines
        .next()
        .ok_or_else(|| ModelError::SolverFailed("Empty solution file".into()))?;
    let status = parse_status(status_line);
    if status != SolverStatus::Optimal {
        return Err(ModelError::NonOptimal(status));
    }

    let col_idx: HashMap<&str, usize> = problem
        .iter_column_names()
        .enumerate()
        .map(|(idx, name)| (name, idx))
        .collect();
    let mut columns = vec![0.0; problem.num_cols()];
    for line in lines {
        let mut fields = line.split_whitespace().peekable();
        if fields.peek() == Some(&"**") {
            fields.next();
        }
        let (Some(_), Some(name), Some(value)) = (fields.next(), fields.next(), fields.next())
        else {
            continue;
        };
        let Some(&idx) = col_idx.get(name) else {
            // Rows can also be listed, depending on CBC's printing options
            continue;
        };
        columns[idx] = value.parse().map_err(|_| {
            ModelError::SolverFailed(format!("Invalid value '{value}' for column {name}"))
        })?;
    }

    Ok(SolverOutput {
        objective_value: problem.objective_value(&columns),
        columns,
        status,
    })
}
