//! Framework-neutral WASM <-> JavaScript bridge.

use labtrend_core::{loess, DashboardConfig, DataSet, LabTrendError, LabelSet, TrendPoint};
use labtrend_view::{ExportFormat, ViewParams};
use serde::{Deserialize, Serialize};
use serde_wasm_bindgen::{from_value, Serializer};
use wasm_bindgen::prelude::*;

#[derive(Deserialize)]
struct JsDashboardConfig {
    #[serde(default)]
    default_cycle_length_days: Option<u32>,
    #[serde(default)]
    loess_span: Option<f64>,
    #[serde(default)]
    core_indicators: Option<Vec<String>>,
    #[serde(default)]
    labels: Option<LabelSet>,
}

impl From<JsDashboardConfig> for DashboardConfig {
    fn from(cfg: JsDashboardConfig) -> Self {
        let mut base = DashboardConfig::default();
        if let Some(days) = cfg.default_cycle_length_days.filter(|days| *days > 0) {
            base.default_cycle_length_days = days;
        }
        if let Some(span) = cfg.loess_span.filter(|span| span.is_finite() && *span > 0.0) {
            base.loess_span = span;
        }
        if let Some(core) = cfg.core_indicators {
            base.core_indicators = core;
        }
        if let Some(labels) = cfg.labels {
            base.labels = labels;
        }
        base
    }
}

#[derive(Deserialize)]
struct JsSeriesPoint {
    date: String,
    #[serde(default)]
    value: Option<f64>,
}

/// Normalize a raw dataset: alias merging, typed values, sorted series.
#[wasm_bindgen]
pub fn normalize_dataset(input: JsValue, config: Option<JsValue>) -> Result<JsValue, JsValue> {
    init_panic_hook();
    let cfg = read_config(config)?;
    let dataset = read_dataset(input, &cfg)?;
    to_js(&dataset, "dataset")
}

/// Charts and pivot table for one set of user choices.
#[wasm_bindgen]
pub fn derive_view(
    dataset: JsValue,
    params: Option<JsValue>,
    config: Option<JsValue>,
) -> Result<JsValue, JsValue> {
    init_panic_hook();
    let cfg = read_config(config)?;
    let dataset = read_dataset(dataset, &cfg)?;
    let params = read_params(params)?;

    let view = labtrend_view::derive_view(&dataset, &params, &cfg);
    to_js(&view, "view")
}

/// Pivot table of the current view as CSV or Markdown text.
#[wasm_bindgen]
pub fn export_pivot(
    dataset: JsValue,
    params: Option<JsValue>,
    format: &str,
    config: Option<JsValue>,
) -> Result<String, JsValue> {
    init_panic_hook();
    let format: ExportFormat = format.parse().map_err(js_error)?;
    let cfg = read_config(config)?;
    let dataset = read_dataset(dataset, &cfg)?;
    let params = read_params(params)?;

    let view = labtrend_view::derive_view(&dataset, &params, &cfg);
    format.render(&view.pivot).map_err(js_error)
}

/// LOESS estimates for `[{ date, value }]`, one per input point.
#[wasm_bindgen]
pub fn smooth_series(points: JsValue, span: Option<f64>) -> Result<JsValue, JsValue> {
    init_panic_hook();
    let points: Vec<JsSeriesPoint> = from_value(points)
        .map_err(|err| JsValue::from_str(&format!("could not read series points: {err}")))?;
    let span = span.unwrap_or(DashboardConfig::default().loess_span);

    let samples: Vec<(&str, Option<f64>)> = points
        .iter()
        .map(|pt| (pt.date.as_str(), pt.value))
        .collect();
    let trend: Vec<TrendPoint> = loess(&samples, span);
    to_js(&trend, "trend")
}

fn init_panic_hook() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

fn read_config(config: Option<JsValue>) -> Result<DashboardConfig, JsValue> {
    match config {
        Some(js_cfg) if !js_cfg.is_undefined() && !js_cfg.is_null() => {
            let cfg: JsDashboardConfig = from_value(js_cfg)
                .map_err(|err| JsValue::from_str(&format!("could not read config: {err}")))?;
            Ok(DashboardConfig::from(cfg))
        }
        _ => Ok(DashboardConfig::default()),
    }
}

fn read_params(params: Option<JsValue>) -> Result<ViewParams, JsValue> {
    match params {
        Some(js_params) if !js_params.is_undefined() && !js_params.is_null() => from_value(js_params)
            .map_err(|err| JsValue::from_str(&format!("could not read view params: {err}"))),
        _ => Ok(ViewParams::default()),
    }
}

fn read_dataset(input: JsValue, cfg: &DashboardConfig) -> Result<DataSet, JsValue> {
    let value = from_value::<serde_json::Value>(input)
        .map_err(|err| JsValue::from_str(&format!("could not read dataset JSON: {err}")))?;
    labtrend_normalize::load_dataset_value(&value, cfg)
        .map_err(|err| JsValue::from_str(&format_dataset_error(err)))
}

fn to_js<T: Serialize>(value: &T, what: &str) -> Result<JsValue, JsValue> {
    value
        .serialize(&Serializer::json_compatible())
        .map_err(|err| JsValue::from_str(&format!("could not serialize {what}: {err}")))
}

fn js_error(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn format_dataset_error(err: LabTrendError) -> String {
    format!("Dataset error: {err}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partial(json: serde_json::Value) -> DashboardConfig {
        let cfg: JsDashboardConfig = serde_json::from_value(json).unwrap();
        DashboardConfig::from(cfg)
    }

    #[test]
    fn empty_config_keeps_defaults() {
        assert_eq!(partial(serde_json::json!({})), DashboardConfig::default());
    }

    #[test]
    fn partial_config_overrides_given_fields() {
        let cfg = partial(serde_json::json!({
            "default_cycle_length_days": 14,
            "loess_span": 0.4,
            "labels": { "pre_start": "Baseline" }
        }));
        assert_eq!(cfg.default_cycle_length_days, 14);
        assert_eq!(cfg.loess_span, 0.4);
        assert_eq!(cfg.labels.pre_start, "Baseline");
        assert_eq!(cfg.labels.cycle_prefix, "第");
        assert_eq!(cfg.core_indicators, DashboardConfig::default().core_indicators);
    }

    #[test]
    fn unusable_overrides_are_ignored() {
        let cfg = partial(serde_json::json!({
            "default_cycle_length_days": 0,
            "loess_span": -1.0,
            "core_indicators": ["血小板计数"]
        }));
        assert_eq!(cfg.default_cycle_length_days, 21);
        assert_eq!(cfg.loess_span, 0.6);
        assert_eq!(cfg.core_indicators, vec!["血小板计数"]);
    }
}
