//! Consistency checks over a normalized dataset. Findings are reported, never fatal.

use std::cmp::Ordering;
use std::fmt;

use chrono::NaiveDate;
use labtrend_core::{parse_date, DataSet, FLAG_HIGH, FLAG_IN_RANGE, FLAG_LOW};
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntegrityIssue {
    /// A `dates` entry is not in `YYYY-MM-DD` form.
    NonIsoDate { date: String },
    /// `dates[index]` is earlier than the entry preceding it.
    DatesOutOfOrder { index: usize, date: String },
    /// An explicit flag outside `-`, `↑`, `↓` on the latest report date.
    UnexpectedFlag {
        indicator: String,
        date: String,
        flag: String,
    },
}

impl fmt::Display for IntegrityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityIssue::NonIsoDate { date } => write!(f, "date {date:?} is not YYYY-MM-DD"),
            IntegrityIssue::DatesOutOfOrder { index, date } => {
                write!(f, "date {date:?} at position {index} is out of order")
            }
            IntegrityIssue::UnexpectedFlag {
                indicator,
                date,
                flag,
            } => write!(f, "{indicator} on {date} has unexpected flag {flag:?}"),
        }
    }
}

/// Run every check and collect what it finds.
pub fn check_integrity(dataset: &DataSet) -> Vec<IntegrityIssue> {
    let mut issues = Vec::new();

    for date in &dataset.dates {
        if !is_iso_date(date) {
            issues.push(IntegrityIssue::NonIsoDate { date: date.clone() });
        }
    }

    for (index, pair) in dataset.dates.windows(2).enumerate() {
        if report_order(&pair[1], &pair[0]) == Ordering::Less {
            issues.push(IntegrityIssue::DatesOutOfOrder {
                index: index + 1,
                date: pair[1].clone(),
            });
        }
    }

    if let Some(latest) = dataset.dates.last() {
        for (name, record) in &dataset.indicators {
            for point in record.series.iter().filter(|pt| &pt.date == latest) {
                let flag = point.explicit_flag();
                if !flag.is_empty() && ![FLAG_IN_RANGE, FLAG_HIGH, FLAG_LOW].contains(&flag) {
                    issues.push(IntegrityIssue::UnexpectedFlag {
                        indicator: name.clone(),
                        date: latest.clone(),
                        flag: flag.to_string(),
                    });
                }
            }
        }
    }

    issues
}

/// Calendar order when both dates parse, text order otherwise.
fn report_order(a: &str, b: &str) -> Ordering {
    match (parse_date(a), parse_date(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}

fn is_iso_date(date: &str) -> bool {
    let bytes = date.as_bytes();
    bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && NaiveDate::parse_from_str(date, "%Y-%m-%d").is_ok()
}
