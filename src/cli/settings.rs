//! Code related to CLI commands for managing the settings file.
use crate::settings::{Settings, get_settings_file_path};
use anyhow::Result;
use clap::Subcommand;
use std::fs;

/// Subcommands for the settings file
#[derive(Subcommand)]
pub enum SettingsSubcommands {
    /// Show the contents of the settings file, if it exists.
    Show,
    /// Show the default settings file, with documentation.
    ShowDefault,
    /// Show the path to the settings file.
    Path,
}

impl SettingsSubcommands {
    /// Execute the supplied settings subcommand
    pub fn execute(self) -> Result<()> {
        match self {
            Self::Show => handle_show_command()?,
            Self::ShowDefault => print!("{}", Settings::default_file_contents()?),
            Self::Path => println!("{}", get_settings_file_path().display()),
        }

        Ok(())
    }
}

/// Handle the `settings show` command
fn handle_show_command() -> Result<()> {
    let file_path = get_settings_file_path();
    if file_path.is_file() {
        print!("{}", fs::read_to_string(&file_path)?);
    } else {
        eprintln!(
            "No settings file found at {}; default settings are used",
            file_path.display()
        );
    }

    Ok(())
}
