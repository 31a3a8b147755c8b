//! Shared data model for the chemotherapy lab-trend dashboard, plus the pure
//! derivations (phase, flag, trend) every presentation surface relies on.

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub mod flag;
pub mod phase;
pub mod trend;

pub use flag::{flag_for, is_abnormal, FLAG_HIGH, FLAG_IN_RANGE, FLAG_LOW};
pub use phase::{
    cycle_and_day, days_between, filter_by_cycle, max_cycle, parse_date, CycleRange, Phase,
};
pub use trend::{linear_fit, linear_fit_xy, loess, loess_series, LinearFit, TrendPoint};

/// Cycle length used whenever the dataset does not carry a usable one.
pub const DEFAULT_CYCLE_LENGTH_DAYS: u32 = 21;

/// Fraction of numeric points used as the LOESS neighbourhood.
pub const DEFAULT_LOESS_SPAN: f64 = 0.6;

/// Tunables shared by the loader, the view layer and the front ends.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DashboardConfig {
    /// Substituted when `cycle_length_days` is absent, zero or not a positive integer.
    pub default_cycle_length_days: u32,
    /// Neighbourhood fraction for the LOESS trend overlay.
    pub loess_span: f64,
    /// Indicators always charted and always present in the pivot table.
    pub core_indicators: Vec<String>,
    pub labels: LabelSet,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            default_cycle_length_days: DEFAULT_CYCLE_LENGTH_DAYS,
            loess_span: DEFAULT_LOESS_SPAN,
            core_indicators: vec![
                "白细胞计数".to_string(),
                "中性粒细胞计数".to_string(),
                "血小板计数".to_string(),
                "血红蛋白浓度".to_string(),
            ],
            labels: LabelSet::default(),
        }
    }
}

/// Display strings for phase labels and pivot headers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LabelSet {
    /// Label for dates before the first treatment day.
    pub pre_start: String,
    /// Text placed before the cycle number (`第` in `第2次化疗d5`).
    pub cycle_prefix: String,
    /// Text between cycle number and day number (`次化疗d`).
    pub cycle_day_separator: String,
    pub indicator_header: String,
    pub reference_header: String,
    pub phase_header: String,
    pub date_header: String,
    /// Caption of the dashed lower reference line.
    pub lower_limit: String,
    pub upper_limit: String,
}

impl Default for LabelSet {
    fn default() -> Self {
        Self {
            pre_start: "首次化疗前".to_string(),
            cycle_prefix: "第".to_string(),
            cycle_day_separator: "次化疗d".to_string(),
            indicator_header: "检测指标".to_string(),
            reference_header: "参考范围".to_string(),
            phase_header: "所属化疗周期".to_string(),
            date_header: "检测日期".to_string(),
            lower_limit: "下限".to_string(),
            upper_limit: "上限".to_string(),
        }
    }
}

/// Clinically normal interval of an indicator. Either bound may be unknown.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct ReferenceRange {
    #[serde(default)]
    pub lower: Option<f64>,
    #[serde(default)]
    pub upper: Option<f64>,
}

impl ReferenceRange {
    pub fn new(lower: Option<f64>, upper: Option<f64>) -> Self {
        Self { lower, upper }
    }

    /// Both bounds known.
    pub fn is_complete(&self) -> bool {
        self.lower.is_some() && self.upper.is_some()
    }

    pub fn has_any_bound(&self) -> bool {
        self.lower.is_some() || self.upper.is_some()
    }

    /// Parse a lab-report interval such as `"3.5~9.5"` or `" 125 ~ 350 "`.
    ///
    /// Only unsigned decimal bounds are accepted; anything else yields `None`.
    pub fn parse_interval(text: &str) -> Option<Self> {
        let (lower, upper) = text.trim().split_once('~')?;
        Some(Self {
            lower: Some(parse_unsigned_decimal(lower.trim())?),
            upper: Some(parse_unsigned_decimal(upper.trim())?),
        })
    }
}

fn parse_unsigned_decimal(token: &str) -> Option<f64> {
    let (int_part, frac_part) = match token.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (token, None),
    };
    let digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    if !digits(int_part) || frac_part.is_some_and(|f| !digits(f)) {
        return None;
    }
    token.parse().ok()
}

/// The value cell of one sample.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(untagged)]
pub enum SampleValue {
    Number(f64),
    /// Non-numeric cell text (e.g. `"阴性"`, `"<0.01"`), kept for display only.
    Text(String),
    #[default]
    Missing,
}

impl SampleValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SampleValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, SampleValue::Number(_))
    }
}

/// One measurement of an indicator on a given report date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SamplePoint {
    pub date: String,
    #[serde(default)]
    pub value: SampleValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag: Option<String>,
    /// Status column copied verbatim from the lab report.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Precomputed phase label; preferred over a computed one when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
}

impl SamplePoint {
    pub fn new(date: impl Into<String>, value: SampleValue, flag: Option<&str>) -> Self {
        Self {
            date: date.into(),
            value,
            flag: flag.map(str::to_string),
            status: None,
            phase: None,
        }
    }

    pub fn numeric(&self) -> Option<f64> {
        self.value.as_f64()
    }

    /// Explicit flag with surrounding whitespace removed, `""` when absent.
    pub fn explicit_flag(&self) -> &str {
        self.flag.as_deref().map(str::trim).unwrap_or("")
    }
}

/// Unit, reference range and time series of a single indicator.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct IndicatorRecord {
    #[serde(default)]
    pub unit: String,
    #[serde(rename = "ref", default)]
    pub reference: Option<ReferenceRange>,
    #[serde(default)]
    pub series: Vec<SamplePoint>,
}

impl IndicatorRecord {
    /// Sample recorded on `date`, if any.
    pub fn point_on(&self, date: &str) -> Option<&SamplePoint> {
        self.series.iter().find(|pt| pt.date == date)
    }

    pub fn complete_reference(&self) -> Option<&ReferenceRange> {
        self.reference.as_ref().filter(|r| r.is_complete())
    }
}

/// The normalized dataset. Treated as immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataSet {
    pub start_date: NaiveDate,
    pub cycle_length_days: u32,
    /// Report dates in the order the dataset lists them.
    pub dates: Vec<String>,
    pub indicators: IndexMap<String, IndicatorRecord>,
}

impl DataSet {
    /// Phase of a date string; `None` when the string is not a recognised date.
    pub fn phase_of(&self, date: &str) -> Option<Phase> {
        let parsed = parse_date(date)?;
        Some(cycle_and_day(parsed, self.start_date, self.cycle_length_days))
    }

    /// Highest treatment cycle reached by any dataset date (at least 1).
    pub fn max_cycle(&self) -> u32 {
        max_cycle(
            self.dates.iter().map(String::as_str),
            self.start_date,
            self.cycle_length_days,
        )
    }

    pub fn indicator(&self, name: &str) -> Option<&IndicatorRecord> {
        self.indicators.get(name)
    }
}

/// Errors raised while turning input into a [`DataSet`].
#[derive(Debug, thiserror::Error)]
pub enum LabTrendError {
    #[error("input dataset is not a JSON object")]
    MissingData,
    #[error("could not read dataset: {0}")]
    Parse(String),
    #[error("field `{field}` is not a valid date: {value:?}")]
    InvalidDate { field: &'static str, value: String },
}
