//! The module responsible for writing the energy system graph to file.
use crate::system::EnergySystem;
use anyhow::{Context, Result};
use petgraph::dot::Dot;
use std::fs::File;
use std::io::Write as IoWrite;
use std::path::Path;

/// The file name for the energy system graph
pub const GRAPH_FILE_NAME: &str = "energy_system.dot";

/// Save the graph of busses, components and flows as a DOT file
pub fn save_system_graph(system: &EnergySystem, file_path: &Path) -> Result<()> {
    let graph = system.to_graph();
    let dot = Dot::new(&graph);
    let mut file = File::create(file_path)
        .with_context(|| format!("Could not create {}", file_path.display()))?;
    write!(file, "{dot}")?;

    Ok(())
}
