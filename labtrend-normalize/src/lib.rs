//! Dataset JSON to normalized [`DataSet`]: tolerant field extraction, then
//! indicator canonicalization and series merging.

use indexmap::IndexMap;
use labtrend_core::{
    parse_date, DashboardConfig, DataSet, IndicatorRecord, LabTrendError, ReferenceRange,
    SamplePoint, SampleValue,
};
use log::{debug, warn};
use serde_json::{Map, Value};

pub mod canonical;
pub mod integrity;
pub mod merge;
pub mod report;

pub use canonical::canonicalize;
pub use integrity::{check_integrity, IntegrityIssue};
pub use merge::{normalize_indicators, prefer_incoming};
pub use report::{import_report, import_report_str, ReportError};

/// Load and normalize a dataset from JSON text.
pub fn load_dataset_str(json: &str, config: &DashboardConfig) -> Result<DataSet, LabTrendError> {
    let value: Value =
        serde_json::from_str(json).map_err(|err| LabTrendError::Parse(err.to_string()))?;
    load_dataset_value(&value, config)
}

/// Load and normalize a dataset from an already parsed `serde_json::Value`.
///
/// Only `start_date` is mandatory. A missing or unusable `cycle_length_days` falls
/// back to `config.default_cycle_length_days`; missing `dates` or `indicators`
/// give empty collections.
pub fn load_dataset_value(
    root: &Value,
    config: &DashboardConfig,
) -> Result<DataSet, LabTrendError> {
    let obj = root.as_object().ok_or(LabTrendError::MissingData)?;

    let start_field = obj.get("start_date");
    let start_date = start_field
        .and_then(Value::as_str)
        .and_then(parse_date)
        .map(|dt| dt.date())
        .ok_or_else(|| LabTrendError::InvalidDate {
            field: "start_date",
            value: start_field.map(value_text).unwrap_or_default(),
        })?;

    let cycle_length_days = match obj.get("cycle_length_days").and_then(positive_integer) {
        Some(days) => days,
        None => {
            if let Some(raw) = obj.get("cycle_length_days") {
                warn!(
                    "unusable cycle_length_days {raw}, using {}",
                    config.default_cycle_length_days
                );
            }
            config.default_cycle_length_days
        }
    };

    let dates: Vec<String> = obj
        .get("dates")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().map(value_text).collect())
        .unwrap_or_default();
    for date in dates.iter().filter(|date| parse_date(date).is_none()) {
        warn!("report date {date:?} is not a readable date; it gets no phase");
    }

    let raw = obj
        .get("indicators")
        .and_then(Value::as_object)
        .map(extract_indicators)
        .unwrap_or_default();
    let indicators = normalize_indicators(&raw);

    debug!(
        "loaded dataset: {} raw indicators -> {} canonical, {} dates, start {start_date}, cycle {cycle_length_days}d",
        raw.len(),
        indicators.len(),
        dates.len()
    );

    Ok(DataSet {
        start_date,
        cycle_length_days,
        dates,
        indicators,
    })
}

/// Raw indicator records in document order, before canonicalization.
pub fn extract_indicators(obj: &Map<String, Value>) -> IndexMap<String, IndicatorRecord> {
    obj.iter()
        .map(|(name, record)| (name.clone(), extract_record(record)))
        .collect()
}

fn extract_record(record: &Value) -> IndicatorRecord {
    let unit = record
        .get("unit")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let reference = record.get("ref").and_then(extract_reference);

    let series = record
        .get("series")
        .and_then(Value::as_array)
        .map(|points| points.iter().filter_map(extract_point).collect())
        .unwrap_or_default();

    IndicatorRecord {
        unit,
        reference,
        series,
    }
}

fn extract_reference(value: &Value) -> Option<ReferenceRange> {
    match value {
        Value::Object(obj) => Some(ReferenceRange {
            lower: obj.get("lower").and_then(Value::as_f64),
            upper: obj.get("upper").and_then(Value::as_f64),
        }),
        Value::String(text) => ReferenceRange::parse_interval(text),
        _ => None,
    }
}

fn extract_point(value: &Value) -> Option<SamplePoint> {
    let Some(date) = value.get("date").and_then(Value::as_str) else {
        debug!("skipping sample without a date: {value}");
        return None;
    };

    let sample_value = match value.get("value") {
        Some(Value::Number(n)) => n.as_f64().map(SampleValue::Number).unwrap_or_default(),
        Some(Value::String(text)) => SampleValue::Text(text.clone()),
        _ => SampleValue::Missing,
    };

    let text_field = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);

    Some(SamplePoint {
        date: date.to_string(),
        value: sample_value,
        flag: text_field("flag"),
        status: text_field("status"),
        phase: text_field("phase"),
    })
}

fn positive_integer(value: &Value) -> Option<u32> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if number >= 1.0 && number.fract() == 0.0 && number <= f64::from(u32::MAX) {
        Some(number as u32)
    } else {
        None
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
