//! Text exports of a pivot table.

use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::pivot::{PivotTable, HEADER_ROWS};

const UTF8_BOM: &str = "\u{FEFF}";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("export is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("unknown export format {0:?}, expected `csv` or `md`")]
    UnknownFormat(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExportFormat {
    #[serde(rename = "csv")]
    Csv,
    #[serde(rename = "md")]
    Markdown,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Markdown => "md",
        }
    }

    pub fn render(self, table: &PivotTable) -> Result<String, ExportError> {
        match self {
            ExportFormat::Csv => to_csv(table),
            ExportFormat::Markdown => Ok(to_markdown(table)),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "md" | "markdown" => Ok(ExportFormat::Markdown),
            other => Err(ExportError::UnknownFormat(other.to_string())),
        }
    }
}

/// `pivot-2025-08-08.csv`.
pub fn export_file_name(format: ExportFormat, date: NaiveDate) -> String {
    format!("pivot-{}.{}", date.format("%Y-%m-%d"), format.extension())
}

/// CSV with a UTF-8 byte order mark, `\n` line endings and quotes only where needed.
pub fn to_csv(table: &PivotTable) -> Result<String, ExportError> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    for row in table.text_rows() {
        writer.write_record(&row)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| std::io::Error::new(err.error().kind(), err.to_string()))?;
    let body = String::from_utf8(bytes)?;
    Ok(format!("{UTF8_BOM}{body}"))
}

/// Markdown table headed by the first header row. The second header row
/// (phases or reference ranges) is left out; body rows follow.
pub fn to_markdown(table: &PivotTable) -> String {
    let rows = table.text_rows();
    let header: &[String] = rows.first().map(Vec::as_slice).unwrap_or_default();

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(format!("| {} |", header.join(" | ")));
    lines.push(format!("|{}|", vec![" --- "; header.len()].join("|")));
    for row in rows.iter().skip(HEADER_ROWS) {
        let cells: Vec<String> = row.iter().map(|cell| cell.replace('\n', " ")).collect();
        lines.push(format!("| {} |", cells.join(" | ")));
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}
