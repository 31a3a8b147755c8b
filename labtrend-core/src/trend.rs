//! Trend estimation: LOESS smoothing for the chart overlay and a plain
//! least-squares line.

use serde::{Deserialize, Serialize};

use crate::phase::{days_between, parse_date};
use crate::SamplePoint;

/// LOESS needs at least this many numeric points to fit anything.
pub const MIN_LOESS_POINTS: usize = 3;

const MIN_BANDWIDTH: f64 = 1e-6;
const DEGENERATE_DENOMINATOR: f64 = 1e-12;

/// Smoothed estimate at one input date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrendPoint {
    pub date: String,
    pub estimate: Option<f64>,
}

/// `y = slope * x + intercept`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Ordinary least squares of `values` against their positions `0..n`.
pub fn linear_fit(values: &[f64]) -> Option<LinearFit> {
    let xs: Vec<f64> = (0..values.len()).map(|i| i as f64).collect();
    linear_fit_xy(&xs, values)
}

/// Ordinary least squares over paired samples.
///
/// `None` when the slices differ in length, hold fewer than two points or every
/// `x` is identical.
pub fn linear_fit_xy(xs: &[f64], ys: &[f64]) -> Option<LinearFit> {
    let n = xs.len();
    if n < 2 || ys.len() != n {
        return None;
    }

    let (mut sum_x, mut sum_y, mut sum_xy, mut sum_xx) = (0.0, 0.0, 0.0, 0.0);
    for (&x, &y) in xs.iter().zip(ys) {
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_xx += x * x;
    }

    let n = n as f64;
    let denom = n * sum_xx - sum_x * sum_x;
    if denom == 0.0 {
        return None;
    }
    let slope = (n * sum_xy - sum_x * sum_y) / denom;
    let intercept = (sum_y - slope * sum_x) / n;
    Some(LinearFit { slope, intercept })
}

/// LOESS over a sample series; non-numeric values count as gaps.
pub fn loess_series(series: &[SamplePoint], span: f64) -> Vec<TrendPoint> {
    let points: Vec<(&str, Option<f64>)> = series
        .iter()
        .map(|pt| (pt.date.as_str(), pt.numeric()))
        .collect();
    loess(&points, span)
}

/// Locally weighted linear regression (tricube kernel, degree 1).
///
/// Returns one [`TrendPoint`] per input, in input order. The x axis is the number
/// of days since the first readable date. Every estimate is `None` when fewer than
/// [`MIN_LOESS_POINTS`] points carry both a value and a readable date; points
/// whose own date is unreadable never get an estimate.
///
/// Neighbourhoods use a stable sort on distance, so equal distances keep their
/// input order and the result is reproducible bit for bit.
pub fn loess(points: &[(&str, Option<f64>)], span: f64) -> Vec<TrendPoint> {
    let base = points.iter().find_map(|(date, _)| parse_date(date));
    let xs: Vec<Option<f64>> = points
        .iter()
        .map(|(date, _)| {
            let base = base?;
            parse_date(date).map(|d| days_between(d, base))
        })
        .collect();

    let samples: Vec<(f64, f64)> = points
        .iter()
        .zip(&xs)
        .filter_map(|((_, value), x)| Some(((*x)?, (*value)?)))
        .collect();

    if samples.len() < MIN_LOESS_POINTS {
        log::debug!(
            "loess skipped: {} numeric points, need {MIN_LOESS_POINTS}",
            samples.len()
        );
        return points
            .iter()
            .map(|(date, _)| TrendPoint {
                date: date.to_string(),
                estimate: None,
            })
            .collect();
    }

    let neighbours = neighbourhood_size(span, samples.len());

    points
        .iter()
        .zip(&xs)
        .map(|((date, _), x0)| TrendPoint {
            date: date.to_string(),
            estimate: x0.map(|x0| estimate_at(&samples, x0, neighbours)),
        })
        .collect()
}

fn neighbourhood_size(span: f64, count: usize) -> usize {
    let spanned = (span * count as f64).floor();
    let spanned = if spanned.is_finite() && spanned > 0.0 {
        spanned as usize
    } else {
        0
    };
    spanned.max(MIN_LOESS_POINTS).min(count)
}

fn estimate_at(samples: &[(f64, f64)], x0: f64, neighbours: usize) -> f64 {
    let mut distances: Vec<(usize, f64)> = samples
        .iter()
        .enumerate()
        .map(|(idx, (x, _))| (idx, (x - x0).abs()))
        .collect();
    distances.sort_by(|a, b| a.1.total_cmp(&b.1));
    distances.truncate(neighbours);

    let bandwidth = distances
        .last()
        .map(|(_, d)| *d)
        .unwrap_or(0.0)
        .max(MIN_BANDWIDTH);

    let (mut sw, mut swx, mut swx2, mut swy, mut swxy) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for &(idx, d) in &distances {
        let u = d / bandwidth;
        let w = (1.0 - u.powi(3)).powi(3);
        let (x, y) = samples[idx];
        sw += w;
        swx += w * x;
        swx2 += w * x * x;
        swy += w * y;
        swxy += w * x * y;
    }

    let denom = sw * swx2 - swx * swx;
    if denom.abs() < DEGENERATE_DENOMINATOR {
        let total_weight = if sw == 0.0 { DEGENERATE_DENOMINATOR } else { sw };
        return swy / total_weight;
    }
    let slope = (sw * swxy - swx * swy) / denom;
    let intercept = (swy - slope * swx) / sw;
    intercept + slope * x0
}
