use assert_cmd::Command;
use assert_cmd::cargo_bin_cmd;
use std::path::{Path, PathBuf};

/// The name of the bundled demo used in tests
#[allow(dead_code)]
pub const DEMO_NAME: &str = "cooling";

/// A command for the enersweep binary which ignores any user settings file
pub fn enersweep_cmd() -> Command {
    let mut cmd = cargo_bin_cmd!("enersweep");
    cmd.env("ENERSWEEP_USE_DEFAULT_SETTINGS", "1")
        .env_remove("ENERSWEEP_LOG_LEVEL");
    cmd
}

/// Run enersweep with the given arguments and check that it succeeds
#[allow(dead_code)]
pub fn assert_enersweep_runs(args: &[&str]) {
    enersweep_cmd().args(args).assert().success();
}

/// Run enersweep with the given arguments and return its stdout
#[allow(dead_code)]
pub fn get_enersweep_stdout(args: &[&str]) -> String {
    let output = enersweep_cmd().args(args).output().unwrap();
    assert!(output.status.success());
    String::from_utf8(output.stdout).unwrap()
}

/// Extract the demo into the given folder, returning the path to its configuration file
#[allow(dead_code)]
pub fn extract_demo(dir: &Path) -> PathBuf {
    let demo_path = dir.join(DEMO_NAME);
    assert_enersweep_runs(&["demo", "extract", DEMO_NAME, &demo_path.to_string_lossy()]);
    demo_path.join("experiment.yaml")
}
