//! Program settings, read from `settings.toml` in the config directory.
use crate::get_config_dir;
use crate::input::read_toml;
use crate::log::DEFAULT_LOG_LEVEL;
use crate::output::OUTPUT_DIRECTORY_ROOT;
use anyhow::{Result, anyhow, bail};
use documented::DocumentedFields;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

const SETTINGS_FILE_NAME: &str = "settings.toml";

/// If set, any settings file is ignored
const USE_DEFAULTS_ENV_VAR: &str = "ENERSWEEP_USE_DEFAULT_SETTINGS";

/// Get the path to where the settings file will be read from
pub fn get_settings_file_path() -> PathBuf {
    get_config_dir().join(SETTINGS_FILE_NAME)
}

/// Options which apply to every command
#[derive(Debug, Clone, DocumentedFields, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Console log level: off, error, warn, info, debug or trace
    pub log_level: String,
    /// Replace the contents of existing output folders without needing --overwrite
    pub overwrite: bool,
    /// Folder under which each experiment gets its own results folder
    pub results_root: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            overwrite: false,
            results_root: PathBuf::from(OUTPUT_DIRECTORY_ROOT),
        }
    }
}

impl Settings {
    /// Load the settings for this invocation.
    ///
    /// Defaults are used if there is no settings file or `ENERSWEEP_USE_DEFAULT_SETTINGS` is set.
    pub fn load() -> Result<Self> {
        if env::var_os(USE_DEFAULTS_ENV_VAR).is_some() {
            return Ok(Self::default());
        }

        Self::from_file(&get_settings_file_path())
    }

    fn from_file(file_path: &Path) -> Result<Self> {
        if file_path.is_file() {
            read_toml(file_path)
        } else {
            Ok(Self::default())
        }
    }

    /// A settings file with every option set to its default, commented out, below its docs
    pub fn default_file_contents() -> Result<String> {
        let toml::Value::Table(defaults) = toml::Value::try_from(Self::default())? else {
            bail!("Settings did not serialise to a TOML table");
        };

        let mut out = format!(
            "# Settings for enersweep v{}. Uncomment an option to change it.\n",
            env!("CARGO_PKG_VERSION")
        );
        for (field, value) in &defaults {
            let docs = Self::get_field_docs(field)
                .map_err(|_| anyhow!("Setting {field} has no documentation"))?;
            out.push('\n');
            for line in docs.lines() {
                out.push_str(&format!("# # {}\n", line.trim()));
            }
            out.push_str(&format!("# {field} = {value}\n"));
        }

        Ok(out)
    }
}
