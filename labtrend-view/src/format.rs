//! Display strings shared by charts, the pivot table and the exports.

use labtrend_core::{parse_date, ReferenceRange};

/// `2025-08-08` -> `2025.08.08`. Unreadable input is returned unchanged.
pub fn format_date_dot(date: &str) -> String {
    match parse_date(date) {
        Some(parsed) => parsed.format("%Y.%m.%d").to_string(),
        None => date.to_string(),
    }
}

/// Shortest decimal text for a number, spelled the way a browser would
/// (`5`, `5.6`, `1e+21`, `1e-7`).
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        let text = if value > 0.0 { "Infinity" } else { "-Infinity" };
        return text.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }

    let magnitude = value.abs();
    if !(1e-6..1e21).contains(&magnitude) {
        let text = format!("{value:e}");
        return match text.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                format!("{mantissa}e+{exponent}")
            }
            _ => text,
        };
    }
    value.to_string()
}

/// Value followed by its unit: `5.1 × 10^9/L` for scaled count units such as
/// `10^9/L`, `128 g/L` otherwise. Empty when there is no value.
pub fn format_with_unit(value: Option<f64>, unit: &str) -> String {
    let Some(value) = value else {
        return String::new();
    };
    let number = format_number(value);
    if is_scaled_count_unit(unit) {
        format!("{number} × {unit}")
    } else {
        format!("{number} {unit}").trim().to_string()
    }
}

/// `3.5 - 9.5 (10^9/L)` for a complete range, `""` otherwise.
pub fn format_reference(reference: Option<&ReferenceRange>, unit: &str) -> String {
    match reference.map(|r| (r.lower, r.upper)) {
        Some((Some(lower), Some(upper))) => format!(
            "{} - {} ({unit})",
            format_number(lower),
            format_number(upper)
        ),
        _ => String::new(),
    }
}

/// Like [`format_reference`] but falls back to the bare unit.
pub fn format_reference_or_unit(reference: Option<&ReferenceRange>, unit: &str) -> String {
    let text = format_reference(reference, unit);
    if text.is_empty() {
        unit.to_string()
    } else {
        text
    }
}

fn is_scaled_count_unit(unit: &str) -> bool {
    let Some(rest) = unit.strip_prefix("10^") else {
        return false;
    };
    let Some((exponent, per)) = rest.split_once('/') else {
        return false;
    };
    !exponent.is_empty()
        && exponent.bytes().all(|b| b.is_ascii_digit())
        && !per.is_empty()
        && per.bytes().all(|b| b.is_ascii_alphabetic())
}
