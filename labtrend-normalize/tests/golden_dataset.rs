use std::fs;

use labtrend_core::DashboardConfig;
use labtrend_normalize::{check_integrity, load_dataset_str};
use serde_json::Value;

fn fixture_path(name: &str) -> String {
    format!("{}/tests/data/{name}", env!("CARGO_MANIFEST_DIR"))
}

#[test]
fn normalized_dataset_matches_golden() {
    let raw = fs::read_to_string(fixture_path("chemo_dataset.json"))
        .expect("failed to read sample dataset");

    let dataset =
        load_dataset_str(&raw, &DashboardConfig::default()).expect("failed to load dataset");

    let actual = serde_json::to_value(&dataset).expect("failed to serialize dataset");

    let expected = fs::read_to_string(fixture_path("chemo_dataset_normalized.json"))
        .expect("failed to read golden dataset");
    let expected: Value = serde_json::from_str(&expected).expect("golden file is not valid JSON");

    assert_eq!(actual, expected);

    let names: Vec<&str> = dataset.indicators.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["白细胞计数", "中性粒细胞计数", "血红蛋白浓度"]);
}

#[test]
fn sample_dataset_passes_integrity_checks() {
    let raw = fs::read_to_string(fixture_path("chemo_dataset.json"))
        .expect("failed to read sample dataset");
    let dataset =
        load_dataset_str(&raw, &DashboardConfig::default()).expect("failed to load dataset");

    assert!(check_integrity(&dataset).is_empty());
    assert_eq!(dataset.max_cycle(), 2);
}
