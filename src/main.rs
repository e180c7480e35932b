use enersweep::cli::run_cli;
use enersweep::log::is_logger_initialised;
use human_panic::setup_panic;
use log::error;
use std::process::ExitCode;

fn main() -> ExitCode {
    setup_panic!();

    let Err(err) = run_cli() else {
        return ExitCode::SUCCESS;
    };

    // Before logging is set up (e.g. a bad settings file) errors can only go to stderr
    if is_logger_initialised() {
        error!("{err:?}");
    } else {
        eprintln!("Error: {err:?}");
    }

    ExitCode::FAILURE
}
