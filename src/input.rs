//! Common routines for handling input data.
use anyhow::{Context, Result, ensure};
use itertools::Itertools;
use serde::de::DeserializeOwned;
use std::fmt::Display;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;

pub mod bounds;
pub use bounds::{BoundType, UncertainBounds, read_parameter_table};
pub mod parameters;
pub use parameters::{ScalarParameters, read_scalar_parameters};
pub mod timeseries;
pub use timeseries::{TimeSeries, read_timeseries};

/// The maximum number of items to display when listing them in an error message
const MAX_ITEMS_IN_MESSAGE: usize = 10;

/// Format an error message to include the file path
pub fn input_err_msg<P: AsRef<Path>>(file_path: P) -> String {
    format!("Error reading {}", file_path.as_ref().display())
}

/// Format a list of items, truncating the list if it is too long
pub fn format_items_with_cap<I, T>(items: I) -> String
where
    I: IntoIterator<Item = T>,
    T: Display,
{
    let items = items.into_iter().collect_vec();
    let mut out = items
        .iter()
        .take(MAX_ITEMS_IN_MESSAGE)
        .map(ToString::to_string)
        .join(", ");
    if items.len() > MAX_ITEMS_IN_MESSAGE {
        out.push_str(&format!(
            " and {} more",
            items.len() - MAX_ITEMS_IN_MESSAGE
        ));
    }

    out
}

/// Guess the field delimiter from the header line of a delimited file.
///
/// Parameter tables come as either semicolon- or comma-separated files. If the header contains a
/// semicolon, the file is assumed to be semicolon-separated.
fn detect_delimiter(file_path: &Path) -> Result<u8> {
    let file = fs::File::open(file_path)?;
    let mut header = String::new();
    BufReader::new(file).read_line(&mut header)?;
    ensure!(!header.trim().is_empty(), "File is empty");

    Ok(if header.contains(';') { b';' } else { b',' })
}

/// Open a delimited file for reading, detecting its delimiter
pub fn open_csv(file_path: &Path) -> Result<csv::Reader<fs::File>> {
    let delimiter = detect_delimiter(file_path).with_context(|| input_err_msg(file_path))?;
    csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_path(file_path)
        .with_context(|| input_err_msg(file_path))
}

/// Read a series of type `T`s from a delimited file.
///
/// Both semicolon- and comma-separated files are accepted. Columns not named in `T` are ignored.
///
/// # Arguments
///
/// * `file_path` - Path to the file
pub fn read_csv<T: DeserializeOwned>(file_path: &Path) -> Result<Vec<T>> {
    let mut reader = open_csv(file_path)?;
    let records: Vec<T> = reader
        .deserialize()
        .try_collect()
        .with_context(|| input_err_msg(file_path))?;
    ensure!(
        !records.is_empty(),
        "{}: file contains no data rows",
        file_path.display()
    );

    Ok(records)
}

/// Parse a TOML file at the specified path.
///
/// # Arguments
///
/// * `file_path` - Path to the TOML file
///
/// # Returns
///
/// * The deserialised TOML data or an error if the file could not be read or parsed.
pub fn read_toml<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let toml_str = fs::read_to_string(file_path).with_context(|| input_err_msg(file_path))?;
    let toml_data = toml::from_str(&toml_str).with_context(|| input_err_msg(file_path))?;
    Ok(toml_data)
}

/// Parse a YAML file at the specified path.
pub fn read_yaml<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let yaml_str = fs::read_to_string(file_path).with_context(|| input_err_msg(file_path))?;
    let yaml_data = serde_yaml::from_str(&yaml_str).with_context(|| input_err_msg(file_path))?;
    Ok(yaml_data)
}
