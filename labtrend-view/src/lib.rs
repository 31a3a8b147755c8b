//! Presentation model for the lab-trend dashboard: chart series, the pivot
//! table and its text exports. Nothing here touches a DOM or a chart library.

pub mod export;
pub mod format;
pub mod pivot;
pub mod view;

pub use export::{export_file_name, to_csv, to_markdown, ExportError, ExportFormat};
pub use format::{
    format_date_dot, format_number, format_reference, format_reference_or_unit, format_with_unit,
};
pub use pivot::{pivot_rows, CellClass, PivotCell, PivotOrientation, PivotTable, HEADER_ROWS};
pub use view::{
    chart_series, derive_view, partition_indicators, ChartPoint, ChartSeries, DashboardView,
    ViewParams,
};
