//! End-to-end tests for sampling uncertain parameters and persisting the model runs.
use enersweep::input::read_parameter_table;
use enersweep::model_runs::{ModelRunTable, create_model_runs};
use enersweep::sampling::create_rng;
use itertools::Itertools;
use std::fs;
use tempfile::tempdir;

const PARAMETER_TABLE: &str = "\
scenario;bound;var_group;var_name;var_value
basic;low;price;price_gas;0.02
basic;high;price;price_gas;0.04
basic;low;storage;capex_stor_el_variation;0.5
basic;high;storage;capex_stor_el_variation;1.0
cheap;low;price;price_gas;0.01
cheap;high;price;price_gas;0.02
cheap;low;storage;capex_stor_el_variation;0.2
cheap;high;storage;capex_stor_el_variation;0.5
dear;low;price;price_gas;0.05
dear;high;price;price_gas;0.1
dear;low;storage;capex_stor_el_variation;1.0
dear;high;storage;capex_stor_el_variation;1.5
dear;point;finance;wacc;0.08
";

#[test]
fn sample_three_scenarios() {
    let dir = tempdir().unwrap();
    let table_path = dir.path().join("parameter_table.csv");
    fs::write(&table_path, PARAMETER_TABLE).unwrap();
    let table = read_parameter_table(&table_path).unwrap();
    let scenarios = table.scenarios().into_iter().collect_vec();
    assert_eq!(scenarios.len(), 3);

    let runs = create_model_runs(&table, &scenarios, 5, &mut create_rng(Some(7))).unwrap();
    assert_eq!(runs.len(), 15);
    assert_eq!(
        runs.iter().map(|run| run.run_id).collect_vec(),
        (0..15).collect_vec()
    );
    assert_eq!(
        runs.variables().iter().map(ToString::to_string).collect_vec(),
        ["price.price_gas", "storage.capex_stor_el_variation"]
    );

    for run in runs.iter() {
        assert_eq!(run.sample_id, run.run_id % 5);
        assert_eq!(run.scenario, scenarios[run.run_id / 5]);
    }

    // Every value of the "dear" scenario lies within its bounds
    for run in runs.iter().filter(|run| run.scenario.as_str() == "dear") {
        assert!((0.05..=0.1).contains(&run.values[0]));
        assert!((1.0..=1.5).contains(&run.values[1]));
    }

    // Writing then reading gives the same table
    let runs_path = dir.path().join("model_runs.csv");
    runs.write(&runs_path).unwrap();
    assert_eq!(ModelRunTable::read(&runs_path).unwrap(), runs);
}

#[test]
fn sampling_is_reproducible() {
    let dir = tempdir().unwrap();
    let table_path = dir.path().join("parameter_table.csv");
    fs::write(&table_path, PARAMETER_TABLE).unwrap();
    let table = read_parameter_table(&table_path).unwrap();
    let scenarios = table.scenarios().into_iter().collect_vec();

    let first = create_model_runs(&table, &scenarios, 4, &mut create_rng(Some(1))).unwrap();
    let second = create_model_runs(&table, &scenarios, 4, &mut create_rng(Some(1))).unwrap();
    assert_eq!(first, second);
}

#[test]
fn missing_bound_is_error() {
    let dir = tempdir().unwrap();
    let table_path = dir.path().join("parameter_table.csv");
    let contents = PARAMETER_TABLE.replace("cheap;high;price;price_gas;0.02\n", "");
    fs::write(&table_path, contents).unwrap();
    let table = read_parameter_table(&table_path).unwrap();

    let err = create_model_runs(&table, &["cheap".into()], 5, &mut create_rng(Some(1)))
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Missing high bound for price.price_gas in scenario cheap"
    );
}
