//! The indicator-by-date pivot table, in either orientation.

use labtrend_core::{flag_for, DashboardConfig, DataSet, IndicatorRecord, FLAG_HIGH, FLAG_LOW};
use serde::{Deserialize, Serialize};

use crate::format::{format_date_dot, format_number, format_reference, format_reference_or_unit};

/// Every pivot table starts with this many header rows.
pub const HEADER_ROWS: usize = 2;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PivotOrientation {
    /// One row per indicator, one column per date.
    #[default]
    Normal,
    /// One row per date, one column per indicator.
    Transposed,
}

impl PivotOrientation {
    pub fn from_transposed(transposed: bool) -> Self {
        if transposed {
            PivotOrientation::Transposed
        } else {
            PivotOrientation::Normal
        }
    }
}

/// Styling class of a value cell.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CellClass {
    Up,
    Down,
    Normal,
    /// No sample on that date.
    Missing,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PivotCell {
    pub text: String,
    /// `None` for header and label cells.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<CellClass>,
}

impl PivotCell {
    pub fn label(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            class: None,
        }
    }

    pub fn value(text: impl Into<String>, class: CellClass) -> Self {
        Self {
            text: text.into(),
            class: Some(class),
        }
    }
}

/// Two header rows followed by the body rows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PivotTable {
    pub orientation: PivotOrientation,
    pub rows: Vec<Vec<PivotCell>>,
}

impl PivotTable {
    pub fn headers(&self) -> &[Vec<PivotCell>] {
        &self.rows[..HEADER_ROWS.min(self.rows.len())]
    }

    pub fn body(&self) -> &[Vec<PivotCell>] {
        &self.rows[HEADER_ROWS.min(self.rows.len())..]
    }

    /// Plain cell text, row by row.
    pub fn text_rows(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| row.iter().map(|cell| cell.text.clone()).collect())
            .collect()
    }
}

/// Lay out `names` against every dataset date.
///
/// In the normal orientation indicators missing from the dataset are skipped.
/// In the transposed orientation they keep their column, filled with missing
/// cells. Phase labels are always computed from the date.
pub fn pivot_rows(
    dataset: &DataSet,
    names: &[String],
    orientation: PivotOrientation,
    config: &DashboardConfig,
) -> PivotTable {
    let labels = &config.labels;
    let phase_label = |date: &str| {
        dataset
            .phase_of(date)
            .map(|phase| phase.label(labels))
            .unwrap_or_default()
    };

    let mut rows = Vec::new();
    match orientation {
        PivotOrientation::Normal => {
            let mut dates_header = vec![
                PivotCell::label(labels.indicator_header.clone()),
                PivotCell::label(labels.reference_header.clone()),
            ];
            let mut phase_header = vec![
                PivotCell::label(labels.phase_header.clone()),
                PivotCell::label(""),
            ];
            for date in &dataset.dates {
                dates_header.push(PivotCell::label(format_date_dot(date)));
                phase_header.push(PivotCell::label(phase_label(date)));
            }
            rows.push(dates_header);
            rows.push(phase_header);

            for name in names {
                let Some(record) = dataset.indicator(name) else {
                    continue;
                };
                let mut row = vec![
                    PivotCell::label(name.clone()),
                    PivotCell::label(format_reference(record.reference.as_ref(), &record.unit)),
                ];
                row.extend(dataset.dates.iter().map(|date| value_cell(Some(record), date)));
                rows.push(row);
            }
        }
        PivotOrientation::Transposed => {
            let mut names_header = vec![
                PivotCell::label(labels.date_header.clone()),
                PivotCell::label(labels.phase_header.clone()),
            ];
            let mut reference_header = vec![PivotCell::label(""), PivotCell::label("")];
            for name in names {
                names_header.push(PivotCell::label(name.clone()));
                let text = dataset
                    .indicator(name)
                    .map(|record| format_reference_or_unit(record.reference.as_ref(), &record.unit))
                    .unwrap_or_default();
                reference_header.push(PivotCell::label(text));
            }
            rows.push(names_header);
            rows.push(reference_header);

            for date in &dataset.dates {
                let mut row = vec![
                    PivotCell::label(format_date_dot(date)),
                    PivotCell::label(phase_label(date)),
                ];
                row.extend(
                    names
                        .iter()
                        .map(|name| value_cell(dataset.indicator(name), date)),
                );
                rows.push(row);
            }
        }
    }

    PivotTable { orientation, rows }
}

fn value_cell(record: Option<&IndicatorRecord>, date: &str) -> PivotCell {
    let Some((record, point)) = record.and_then(|r| r.point_on(date).map(|pt| (r, pt))) else {
        return PivotCell::value("", CellClass::Missing);
    };
    let Some(value) = point.numeric() else {
        return PivotCell::value("", CellClass::Normal);
    };

    let flag = flag_for(Some(value), record.reference.as_ref(), point.explicit_flag());
    let number = format_number(value);
    match flag.as_str() {
        FLAG_HIGH => PivotCell::value(format!("{number} {FLAG_HIGH}"), CellClass::Up),
        FLAG_LOW => PivotCell::value(format!("{number} {FLAG_LOW}"), CellClass::Down),
        _ => PivotCell::value(number, CellClass::Normal),
    }
}
