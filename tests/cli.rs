//! Integration tests for CLI commands.
use itertools::Itertools;
use std::fs;
use tempfile::tempdir;

mod common;
use common::{
    DEMO_NAME, assert_enersweep_runs, enersweep_cmd, extract_demo, get_enersweep_stdout,
};

/// Test the `validate` command
#[test]
fn check_validate_command() {
    let tmp = tempdir().unwrap();
    let config_path = extract_demo(tmp.path());
    assert_enersweep_runs(&["validate", &config_path.to_string_lossy()]);
}

/// Test the `sample` command
#[test]
fn check_sample_command() {
    let tmp = tempdir().unwrap();
    let config_path = extract_demo(tmp.path());
    let output_dir = tmp.path().join("results");
    let config = config_path.to_string_lossy().to_string();
    let output = output_dir.to_string_lossy().to_string();
    let args = vec!["sample", config.as_str(), "--output-dir", output.as_str()];
    assert_enersweep_runs(&args);

    // Two scenarios with five samples each
    let contents = fs::read_to_string(output_dir.join("model_runs.csv")).unwrap();
    let lines = contents.lines().collect_vec();
    assert_eq!(lines[0], "run_id,scenario,sample_id,price.price_gas,price.price_electr");
    assert_eq!(lines.len(), 11);
    assert!(lines[10].starts_with("9,high_price,4,"));

    // The table is not overwritten by default
    enersweep_cmd().args(&args).assert().failure().code(1);
    let mut overwrite_args = args.clone();
    overwrite_args.push("--overwrite");
    assert_enersweep_runs(&overwrite_args);

    // The seed is fixed, so the same table is written again
    assert_eq!(
        fs::read_to_string(output_dir.join("model_runs.csv")).unwrap(),
        contents
    );
}

/// Test the `run` command, with and without a model run applied
#[test]
fn check_run_command() {
    let tmp = tempdir().unwrap();
    let config_path = extract_demo(tmp.path());
    let config = config_path.to_string_lossy().to_string();
    let model_runs_dir = tmp.path().join("samples");
    assert_enersweep_runs(&[
        "sample",
        &config,
        "--output-dir",
        &model_runs_dir.to_string_lossy(),
    ]);

    // Save results to non-existent directory to check that directory creation works
    let base_dir = tmp.path().join("results").join("base");
    assert_enersweep_runs(&[
        "run",
        &config,
        "--debug",
        "--output-dir",
        &base_dir.to_string_lossy(),
    ]);
    for file_name in [
        "flows.csv",
        "investments.csv",
        "storage_content.csv",
        "meta.csv",
        "parameters.csv",
        "scalar_parameters.csv",
        "scalars.csv",
        "metadata.toml",
        "problem.lp",
        "enersweep.log",
    ] {
        assert!(base_dir.join(file_name).is_file(), "Missing {file_name}");
    }

    let run_dir = tmp.path().join("results").join("run3");
    assert_enersweep_runs(&[
        "run",
        &config,
        "--debug",
        "--variation",
        "1",
        "--run-id",
        "3",
        "--model-runs",
        &model_runs_dir.join("model_runs.csv").to_string_lossy(),
        "--output-dir",
        &run_dir.to_string_lossy(),
    ]);
    let metadata = fs::read_to_string(run_dir.join("metadata.toml")).unwrap();
    assert!(metadata.contains("label = \"exp1_var1_run3\""));

    // Combine the two runs
    let combined_dir = tmp.path().join("combined");
    assert_enersweep_runs(&[
        "combine",
        &base_dir.to_string_lossy(),
        &run_dir.to_string_lossy(),
        "--output-dir",
        &combined_dir.to_string_lossy(),
        "--drop",
        "demand",
        "--pivot",
        "invest",
        "--pivot",
        "carrier_cost",
    ]);
    let combined = fs::read_to_string(combined_dir.join("scalars.csv")).unwrap();
    assert!(combined.starts_with("scenario,name,type,carrier,tech,var_name,var_value\n"));
    let invest = fs::read_to_string(combined_dir.join("invest.csv")).unwrap();
    let lines = invest.lines().collect_vec();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("scenario,"));
    assert!(lines[1].starts_with("base,"));
    assert!(lines[2].starts_with("run3,"));
    assert!(combined_dir.join("carrier_cost.csv").is_file());
}

/// Test that running with an unknown run ID fails
#[test]
fn check_run_command_missing_model_runs() {
    let tmp = tempdir().unwrap();
    let config_path = extract_demo(tmp.path());
    let config = config_path.to_string_lossy().to_string();
    let model_runs = tmp.path().join("missing.csv").to_string_lossy().to_string();
    let output = tmp.path().join("results").to_string_lossy().to_string();
    enersweep_cmd()
        .args([
            "run",
            config.as_str(),
            "--run-id",
            "0",
            "--model-runs",
            model_runs.as_str(),
            "--output-dir",
            output.as_str(),
        ])
        .assert()
        .failure()
        .code(1);
}

/// Test the `save-graph` command
#[test]
fn check_save_graph_command() {
    let tmp = tempdir().unwrap();
    let config_path = extract_demo(tmp.path());
    let output_dir = tmp.path().join("graph");
    assert_enersweep_runs(&[
        "save-graph",
        &config_path.to_string_lossy(),
        "--output-dir",
        &output_dir.to_string_lossy(),
    ]);

    let dot = fs::read_to_string(output_dir.join("energy_system.dot")).unwrap();
    assert!(dot.contains("transformer: absorption_chiller"));
}

/// Test the `demo list` command
#[test]
fn check_demo_list_command() {
    let stdout = get_enersweep_stdout(&["demo", "list"]);
    assert!(stdout.lines().any(|line| line == DEMO_NAME));
}

/// Test the `demo info` command
#[test]
fn check_demo_info_command() {
    assert!(!get_enersweep_stdout(&["demo", "info", DEMO_NAME]).is_empty());
}

/// Test that an unknown demo is an error
#[test]
fn check_demo_info_unknown() {
    enersweep_cmd()
        .args(["demo", "info", "heating"])
        .assert()
        .failure()
        .code(1);
}

/// Test the `settings show-default` command
#[test]
fn check_settings_show_default_command() {
    let stdout = get_enersweep_stdout(&["settings", "show-default"]);
    assert!(stdout.contains("# results_root = \"enersweep_results\""));
}

/// Test that running without a valid configuration file fails
#[test]
fn check_missing_config() {
    let tmp = tempdir().unwrap();
    let config = tmp.path().join("experiment.yaml").to_string_lossy().to_string();
    enersweep_cmd()
        .args(["validate", config.as_str()])
        .assert()
        .failure()
        .code(1);
}
