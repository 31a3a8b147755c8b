//! Lab-report CSV import.
//!
//! A report export holds one row per measured indicator with the columns
//! `报告日期, 检测指标, 结果, 状态, 参考值, 单位`; extra columns such as the report
//! number are ignored. Rows are folded into the dataset document the loader
//! reads: ISO dates, one unit and one reference interval per indicator, a flag
//! and a phase label on every point. Indicator names are kept as written, so
//! aliases are merged later by [`crate::load_dataset_value`].

use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;

use chrono::NaiveDate;
use csv::StringRecord;
use indexmap::IndexMap;
use labtrend_core::{
    cycle_and_day, flag_for, parse_date, DashboardConfig, DataSet, IndicatorRecord, LabelSet,
    ReferenceRange, SamplePoint, SampleValue, FLAG_HIGH, FLAG_IN_RANGE, FLAG_LOW,
};
use log::{debug, info, warn};

pub const DATE_COLUMN: &str = "报告日期";
pub const INDICATOR_COLUMN: &str = "检测指标";
pub const RESULT_COLUMN: &str = "结果";
pub const STATUS_COLUMN: &str = "状态";
pub const REFERENCE_COLUMN: &str = "参考值";
pub const UNIT_COLUMN: &str = "单位";

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("report has no `{0}` column")]
    MissingColumn(&'static str),
}

/// Import a report from CSV text.
pub fn import_report_str(
    text: &str,
    start_date: NaiveDate,
    config: &DashboardConfig,
) -> Result<DataSet, ReportError> {
    import_report(text.as_bytes(), start_date, config)
}

/// Import a report read from `source`.
///
/// Phases are computed against `start_date` and
/// `config.default_cycle_length_days`. When one indicator has several rows for
/// the same date the last row wins.
pub fn import_report<R: Read>(
    source: R,
    start_date: NaiveDate,
    config: &DashboardConfig,
) -> Result<DataSet, ReportError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source);
    let columns = Columns::locate(reader.headers()?)?;

    let mut indicators: IndexMap<String, IndicatorRows> = IndexMap::new();
    let mut dates = BTreeSet::new();
    let mut row_count = 0usize;

    for record in reader.records() {
        let record = record?;
        let name = cell(&record, Some(columns.indicator));
        if name.is_empty() {
            debug!("skipping report row without an indicator: {record:?}");
            continue;
        }
        row_count += 1;

        let date = normalize_report_date(cell(&record, Some(columns.date)));
        dates.insert(date.clone());

        indicators
            .entry(name.to_string())
            .or_default()
            .absorb(date, &record, &columns);
    }

    let cycle_length_days = config.default_cycle_length_days.max(1);
    let indicators: IndexMap<String, IndicatorRecord> = indicators
        .into_iter()
        .map(|(name, rows)| {
            let record = rows.into_record(start_date, cycle_length_days, &config.labels);
            (name, record)
        })
        .collect();

    info!(
        "imported {row_count} report rows: {} indicators over {} dates",
        indicators.len(),
        dates.len()
    );

    Ok(DataSet {
        start_date,
        cycle_length_days,
        dates: dates.into_iter().collect(),
        indicators,
    })
}

/// `YYYY-MM-DD` for a dashed or dotted report date; anything else is kept as written.
pub fn normalize_report_date(raw: &str) -> String {
    let raw = raw.trim();
    ["%Y-%m-%d", "%Y.%m.%d"]
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| {
            warn!("report date {raw:?} is not a readable date; kept as written");
            raw.to_string()
        })
}

/// Result cell to a value: blank or `-` is missing, unparsable text stays text.
pub fn parse_report_value(raw: &str) -> SampleValue {
    let raw = raw.trim();
    if raw.is_empty() || raw == "-" {
        return SampleValue::Missing;
    }
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => SampleValue::Number(value),
        _ => SampleValue::Text(raw.to_string()),
    }
}

/// Flag from the indicator's interval when the value is numeric and both bounds
/// are known, else the report's own status when it is `-`, `↑` or `↓`, else `-`.
pub fn report_flag(
    value: &SampleValue,
    reference: Option<&ReferenceRange>,
    status: &str,
) -> String {
    match (value.as_f64(), reference.filter(|r| r.is_complete())) {
        (Some(value), Some(range)) => flag_for(Some(value), Some(range), ""),
        _ if [FLAG_IN_RANGE, FLAG_HIGH, FLAG_LOW].contains(&status) => status.to_string(),
        _ => FLAG_IN_RANGE.to_string(),
    }
}

struct Columns {
    date: usize,
    indicator: usize,
    result: usize,
    status: Option<usize>,
    reference: Option<usize>,
    unit: Option<usize>,
}

impl Columns {
    fn locate(headers: &StringRecord) -> Result<Self, ReportError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|header| header.trim().trim_start_matches('\u{feff}') == name)
        };
        let required = |name: &'static str| find(name).ok_or(ReportError::MissingColumn(name));

        Ok(Self {
            date: required(DATE_COLUMN)?,
            indicator: required(INDICATOR_COLUMN)?,
            result: required(RESULT_COLUMN)?,
            status: find(STATUS_COLUMN),
            reference: find(REFERENCE_COLUMN),
            unit: find(UNIT_COLUMN),
        })
    }
}

fn cell(record: &StringRecord, index: Option<usize>) -> &str {
    index.and_then(|idx| record.get(idx)).unwrap_or("").trim()
}

struct ReportCell {
    value: SampleValue,
    status: String,
}

#[derive(Default)]
struct IndicatorRows {
    cells: BTreeMap<String, ReportCell>,
    units: Tally,
    references: Tally,
}

impl IndicatorRows {
    fn absorb(&mut self, date: String, record: &StringRecord, columns: &Columns) {
        let unit = cell(record, columns.unit);
        if !unit.is_empty() {
            self.units.add(unit);
        }
        let reference = cell(record, columns.reference);
        if ReferenceRange::parse_interval(reference).is_some() {
            self.references.add(reference);
        }

        let report = ReportCell {
            value: parse_report_value(cell(record, Some(columns.result))),
            status: cell(record, columns.status).to_string(),
        };
        if let Some(previous) = self.cells.insert(date, report) {
            debug!("duplicate report row replaced value {:?}", previous.value);
        }
    }

    fn into_record(
        self,
        start_date: NaiveDate,
        cycle_length_days: u32,
        labels: &LabelSet,
    ) -> IndicatorRecord {
        let IndicatorRows {
            cells,
            units,
            references,
        } = self;
        let unit = units.most_common().unwrap_or_default().to_string();
        let reference = references
            .most_common()
            .and_then(ReferenceRange::parse_interval);

        let series = cells
            .into_iter()
            .map(|(date, report)| {
                let flag = report_flag(&report.value, reference.as_ref(), &report.status);
                let phase = parse_date(&date).map(|parsed| {
                    cycle_and_day(parsed, start_date, cycle_length_days).label(labels)
                });
                SamplePoint {
                    date,
                    value: report.value,
                    flag: Some(flag),
                    status: Some(report.status).filter(|status| !status.is_empty()),
                    phase,
                }
            })
            .collect();

        IndicatorRecord {
            unit,
            reference,
            series,
        }
    }
}

/// Occurrence counts in first-seen order.
#[derive(Default)]
struct Tally(IndexMap<String, usize>);

impl Tally {
    fn add(&mut self, key: &str) {
        *self.0.entry(key.to_string()).or_insert(0) += 1;
    }

    /// Most frequent key; ties go to the key seen first.
    fn most_common(&self) -> Option<&str> {
        let mut best: Option<(&str, usize)> = None;
        for (key, &count) in &self.0 {
            if best.map_or(true, |(_, top)| count > top) {
                best = Some((key.as_str(), count));
            }
        }
        best.map(|(key, _)| key)
    }
}
