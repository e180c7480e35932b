//! The `log` module provides initialisation and configuration of the application's logging system.
//!
//! Messages at the configured level go to the console, with warnings and errors on stderr. If an
//! output folder is given, everything down to `debug` is also written to a log file there, so
//! that runs can be diagnosed after the fact.
use anyhow::{Result, bail};
use chrono::Local;
use fern::colors::{Color, ColoredLevelConfig};
use fern::{Dispatch, FormatCallback};
use log::{LevelFilter, Record};
use std::env;
use std::fmt::{Arguments, Display};
use std::io::IsTerminal;
use std::path::Path;
use std::sync::OnceLock;

/// The default log level for the program.
///
/// Used as a fallback if the user hasn't specified something else with the `ENERSWEEP_LOG_LEVEL`
/// environment variable or the settings.toml file.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// The file name for the log file written to the output folder
pub const LOG_FILE_NAME: &str = "enersweep.log";

/// The level of messages written to the log file
const LOG_FILE_LEVEL: LevelFilter = LevelFilter::Debug;

/// Used to ensure that logger is only initialised once
static LOGGER_INIT: OnceLock<()> = OnceLock::new();

/// Whether the program logger has been initialised
pub fn is_logger_initialised() -> bool {
    LOGGER_INIT.get().is_some()
}

/// Parse a log level name (case-insensitive)
fn parse_log_level(name: &str) -> Result<LevelFilter> {
    Ok(match name.to_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        unknown => bail!("Unknown log level: {unknown}"),
    })
}

/// Initialise the program logger using the `fern` logging library with colourised output.
///
/// The user can specify their preferred logging level via the `ENERSWEEP_LOG_LEVEL` environment
/// variable, which takes precedence over the level from the settings file. If the logger has
/// already been initialised, this function does nothing.
///
/// # Arguments
///
/// * `log_level_from_settings`: The log level specified in the settings file
/// * `output_path`: The folder to write the log file to, if any
pub fn init(log_level_from_settings: &str, output_path: Option<&Path>) -> Result<()> {
    if is_logger_initialised() {
        return Ok(());
    }

    let log_level = env::var("ENERSWEEP_LOG_LEVEL")
        .unwrap_or_else(|_| log_level_from_settings.to_string());
    let log_level = parse_log_level(&log_level)?;

    let colours = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue)
        .trace(Color::Magenta);
    let use_colour_stdout = std::io::stdout().is_terminal();
    let use_colour_stderr = std::io::stderr().is_terminal();

    let mut dispatch = Dispatch::new()
        .chain(
            Dispatch::new()
                .filter(|metadata| metadata.level() > LevelFilter::Warn)
                .format(move |out, message, record| {
                    write_log_colour(out, message, record, use_colour_stdout, &colours);
                })
                .level(log_level)
                .chain(std::io::stdout()),
        )
        .chain(
            Dispatch::new()
                .filter(|metadata| metadata.level() <= LevelFilter::Warn)
                .format(move |out, message, record| {
                    write_log_colour(out, message, record, use_colour_stderr, &colours);
                })
                .level(log_level)
                .chain(std::io::stderr()),
        );

    if let Some(output_path) = output_path {
        let file = fern::log_file(output_path.join(LOG_FILE_NAME))?;
        dispatch = dispatch.chain(
            Dispatch::new()
                .format(|out, message, record| {
                    write_log_plain(out, message, record);
                })
                .level(LOG_FILE_LEVEL.max(log_level))
                .chain(file),
        );
    }

    dispatch.apply()?;
    LOGGER_INIT
        .set(())
        .expect("Logger initialisation should only happen once");

    Ok(())
}

fn timestamp() -> impl Display {
    Local::now().format("%H:%M:%S")
}

/// Write a log message without colours
fn write_log_plain(out: FormatCallback, message: &Arguments, record: &Record) {
    out.finish(format_args!(
        "[{} {} {}] {}",
        timestamp(),
        record.level(),
        record.target(),
        message
    ));
}

/// Write a log message, with colours if enabled
fn write_log_colour(
    out: FormatCallback,
    message: &Arguments,
    record: &Record,
    use_colour: bool,
    colours: &ColoredLevelConfig,
) {
    if !use_colour {
        write_log_plain(out, message, record);
        return;
    }

    out.finish(format_args!(
        "[{} {} {}] {}",
        timestamp(),
        colours.color(record.level()),
        record.target(),
        message
    ));
}
