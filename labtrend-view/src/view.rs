//! Everything the dashboard renders for one set of user choices.

use labtrend_core::{
    filter_by_cycle, flag_for, loess, CycleRange, DashboardConfig, DataSet, ReferenceRange,
    TrendPoint,
};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::format::{format_date_dot, format_with_unit};
use crate::pivot::{pivot_rows, PivotOrientation, PivotTable};

/// User choices driving a view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ViewParams {
    /// Extended indicators ticked by the user.
    pub selected: Vec<String>,
    pub start_cycle: u32,
    /// `None` means up to the last cycle in the dataset.
    pub end_cycle: Option<u32>,
    pub show_trend: bool,
    pub transposed: bool,
}

impl Default for ViewParams {
    fn default() -> Self {
        Self {
            selected: Vec::new(),
            start_cycle: 1,
            end_cycle: None,
            show_trend: false,
            transposed: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChartPoint {
    pub date: String,
    pub phase: String,
    /// Dotted date and phase on two lines, for the axis pointer.
    pub axis_label: String,
    pub value: Option<f64>,
    pub flag: String,
    /// Value with its unit, e.g. `5.1 × 10^9/L`.
    pub display: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChartSeries {
    pub name: String,
    /// `白细胞计数（10^9/L）`, or just the name when there is no unit.
    pub title: String,
    pub unit: String,
    pub reference: Option<ReferenceRange>,
    pub lower_label: Option<String>,
    pub upper_label: Option<String>,
    pub points: Vec<ChartPoint>,
    /// Present only when the trend overlay is enabled.
    pub trend: Option<Vec<TrendPoint>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardView {
    /// Extended indicators offered for selection, in dataset order.
    pub extended_indicators: Vec<String>,
    /// The subset of `extended_indicators` actually shown.
    pub selected: Vec<String>,
    pub max_cycle: u32,
    pub cycle_range: CycleRange,
    pub core_charts: Vec<ChartSeries>,
    pub extended_charts: Vec<ChartSeries>,
    pub pivot: PivotTable,
}

/// Split dataset indicators into core and extended ones, both in dataset order.
pub fn partition_indicators<'a>(
    dataset: &'a DataSet,
    config: &DashboardConfig,
) -> (Vec<&'a str>, Vec<&'a str>) {
    dataset
        .indicators
        .keys()
        .map(String::as_str)
        .partition(|name| config.core_indicators.iter().any(|core| core == name))
}

/// Derive charts and the pivot table.
///
/// Charts only show points inside the requested cycle range; the pivot table
/// always spans every dataset date. Selected names that are unknown or already
/// core are ignored.
pub fn derive_view(dataset: &DataSet, params: &ViewParams, config: &DashboardConfig) -> DashboardView {
    let (core, extended) = partition_indicators(dataset, config);
    let selected: Vec<String> = extended
        .iter()
        .filter(|name| params.selected.iter().any(|s| s == *name))
        .map(|name| name.to_string())
        .collect();

    let max_cycle = dataset.max_cycle();
    let cycle_range = CycleRange::new(params.start_cycle, params.end_cycle.unwrap_or(max_cycle));

    let charts = |names: &[&str]| -> Vec<ChartSeries> {
        names
            .iter()
            .filter_map(|name| chart_series(dataset, name, cycle_range, params.show_trend, config))
            .collect()
    };
    let core_charts = charts(&core);
    let selected_refs: Vec<&str> = selected.iter().map(String::as_str).collect();
    let extended_charts = charts(&selected_refs);

    let shown: Vec<String> = core
        .iter()
        .map(|name| name.to_string())
        .chain(selected.iter().cloned())
        .collect();
    let pivot = pivot_rows(
        dataset,
        &shown,
        PivotOrientation::from_transposed(params.transposed),
        config,
    );

    debug!(
        "view: {} core, {} of {} extended, cycles {}..={} of {max_cycle}",
        core_charts.len(),
        extended_charts.len(),
        extended.len(),
        cycle_range.start,
        cycle_range.end
    );

    DashboardView {
        extended_indicators: extended.iter().map(|name| name.to_string()).collect(),
        selected,
        max_cycle,
        cycle_range,
        core_charts,
        extended_charts,
        pivot,
    }
}

/// Chart data for one indicator; `None` when the dataset does not have it.
pub fn chart_series(
    dataset: &DataSet,
    name: &str,
    range: CycleRange,
    show_trend: bool,
    config: &DashboardConfig,
) -> Option<ChartSeries> {
    let record = dataset.indicator(name)?;
    let labels = &config.labels;
    let unit = record.unit.as_str();
    let reference = record.reference;

    let filtered = filter_by_cycle(
        &record.series,
        range,
        dataset.start_date,
        dataset.cycle_length_days,
    );

    let points = filtered
        .iter()
        .map(|pt| {
            let phase = match pt.phase.as_deref().filter(|p| !p.is_empty()) {
                Some(phase) => phase.to_string(),
                None => dataset
                    .phase_of(&pt.date)
                    .map(|phase| phase.label(labels))
                    .unwrap_or_default(),
            };
            let value = pt.numeric();
            ChartPoint {
                axis_label: format!("{}\n{phase}", format_date_dot(&pt.date)),
                date: pt.date.clone(),
                phase,
                value,
                flag: flag_for(value, reference.as_ref(), pt.explicit_flag()),
                display: format_with_unit(value, unit),
            }
        })
        .collect();

    let trend = show_trend.then(|| {
        let samples: Vec<(&str, Option<f64>)> = filtered
            .iter()
            .map(|pt| (pt.date.as_str(), pt.numeric()))
            .collect();
        loess(&samples, config.loess_span)
    });

    let bound_label = |caption: &str, bound: Option<f64>| {
        bound.map(|b| format!("{caption} {}", format_with_unit(Some(b), unit)))
    };

    Some(ChartSeries {
        name: name.to_string(),
        title: if unit.is_empty() {
            name.to_string()
        } else {
            format!("{name}（{unit}）")
        },
        unit: unit.to_string(),
        reference,
        lower_label: bound_label(&labels.lower_limit, reference.and_then(|r| r.lower)),
        upper_label: bound_label(&labels.upper_limit, reference.and_then(|r| r.upper)),
        points,
        trend,
    })
}
