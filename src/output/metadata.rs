//! Write run, build and platform metadata to a TOML file.
//!
//! The aggregated metadata is written as `metadata.toml` in the output directory of each run, so
//! that results can be traced back to the inputs and program version that produced them.
use anyhow::{Context, Result};
use chrono::prelude::*;
use platform_info::{PlatformInfo, PlatformInfoAPI, UNameAPI};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// The output filename used for metadata.
const METADATA_FILE_NAME: &str = "metadata.toml";

/// Build-time information included by the build script (via the `built` crate).
#[allow(clippy::doc_markdown)]
#[allow(clippy::needless_raw_strings)]
mod built_info {
    // The file has been placed there by the build script.
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

#[derive(Serialize)]
struct Metadata<'a> {
    run: RunMetadata<'a>,
    program: ProgramMetadata<'a>,
    platform: PlatformMetadata,
}

/// Information about the model run
#[derive(Debug, Clone, Serialize)]
pub struct RunMetadata<'a> {
    /// Path to the experiment configuration file
    pub config_path: &'a Path,
    /// The label of the run, which is also the name of its output folder
    pub label: &'a str,
    /// The row of the model-run table which was applied, if any
    pub run_id: Option<usize>,
    /// The entry of the parameter variation list which was used
    pub variation: usize,
    /// The date and time on which the run started
    pub datetime: String,
}

impl<'a> RunMetadata<'a> {
    /// Describe a run starting now
    pub fn new(
        config_path: &'a Path,
        label: &'a str,
        run_id: Option<usize>,
        variation: usize,
    ) -> Self {
        Self {
            config_path,
            label,
            run_id,
            variation,
            datetime: Local::now().to_rfc2822(),
        }
    }
}

#[derive(Serialize)]
struct ProgramMetadata<'a> {
    name: &'a str,
    version: &'a str,
    /// The target architecture for the build (e.g. x86_64-unknown-linux-gnu)
    target: &'a str,
    is_debug: bool,
    rustc_version: &'a str,
    build_time_utc: &'a str,
}

impl Default for ProgramMetadata<'_> {
    fn default() -> Self {
        Self {
            name: built_info::PKG_NAME,
            version: built_info::PKG_VERSION,
            target: built_info::TARGET,
            is_debug: built_info::DEBUG,
            rustc_version: built_info::RUSTC_VERSION,
            build_time_utc: built_info::BUILT_TIME_UTC,
        }
    }
}

/// Information about the platform the program is running on
#[derive(Serialize)]
struct PlatformMetadata {
    sysname: String,
    nodename: String,
    release: String,
    machine: String,
    osname: String,
}

impl PlatformMetadata {
    fn new() -> Result<Self> {
        let info = PlatformInfo::new()
            .map_err(|err| anyhow::anyhow!("{err}"))
            .context("Unable to determine platform info")?;

        Ok(Self {
            sysname: info.sysname().to_string_lossy().into(),
            nodename: info.nodename().to_string_lossy().into(),
            release: info.release().to_string_lossy().into(),
            machine: info.machine().to_string_lossy().into(),
            osname: info.osname().to_string_lossy().into(),
        })
    }
}

/// Write metadata to `metadata.toml` in the given output directory.
///
/// # Errors
///
/// Returns an error if the platform cannot be queried or writing the file fails.
pub fn write_metadata(output_path: &Path, run: RunMetadata) -> Result<()> {
    let metadata = Metadata {
        run,
        program: ProgramMetadata::default(),
        platform: PlatformMetadata::new()?,
    };
    let file_path = output_path.join(METADATA_FILE_NAME);
    fs::write(&file_path, toml::to_string(&metadata)?)
        .with_context(|| format!("Could not write {}", file_path.display()))?;

    Ok(())
}
