use std::fs::{self, File};

use chrono::NaiveDate;
use labtrend_core::{DashboardConfig, SampleValue};
use labtrend_normalize::{check_integrity, import_report, load_dataset_value};
use serde_json::Value;

fn fixture_path(name: &str) -> String {
    format!("{}/tests/data/{name}", env!("CARGO_MANIFEST_DIR"))
}

fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 8, 8).expect("valid start date")
}

#[test]
fn imported_report_matches_golden() {
    let file = File::open(fixture_path("chemo_report.csv")).expect("failed to open sample report");

    let dataset = import_report(file, start_date(), &DashboardConfig::default())
        .expect("failed to import report");

    let actual = serde_json::to_value(&dataset).expect("failed to serialize dataset");

    let expected = fs::read_to_string(fixture_path("chemo_report_dataset.json"))
        .expect("failed to read golden dataset");
    let expected: Value = serde_json::from_str(&expected).expect("golden file is not valid JSON");

    assert_eq!(actual, expected);

    let names: Vec<&str> = dataset.indicators.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["白细胞计数", "血小板计数", "C反应蛋白", "尿隐血"]);
}

#[test]
fn imported_report_loads_back_unchanged() {
    let file = File::open(fixture_path("chemo_report.csv")).expect("failed to open sample report");
    let config = DashboardConfig::default();
    let dataset = import_report(file, start_date(), &config).expect("failed to import report");

    let document = serde_json::to_value(&dataset).expect("failed to serialize dataset");
    let reloaded = load_dataset_value(&document, &config).expect("failed to load dataset");

    assert_eq!(reloaded, dataset);
    assert!(check_integrity(&reloaded).is_empty());
    assert_eq!(reloaded.max_cycle(), 2);
    assert_eq!(
        reloaded.indicators["血小板计数"].series[2].value,
        SampleValue::Missing
    );
}
