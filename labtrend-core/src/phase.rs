//! Treatment-cycle arithmetic: which cycle and which day of it a report date falls on.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{LabelSet, SamplePoint};

const MILLIS_PER_DAY: i64 = 24 * 3600 * 1000;

/// Position of a date relative to the first treatment day.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Phase {
    /// Before the first treatment.
    PreStart,
    /// 1-indexed cycle and 1-indexed day within that cycle.
    Cycle { cycle: u32, day_in_cycle: u32 },
}

impl Phase {
    /// Cycle number, with `PreStart` counted as cycle 0.
    pub fn cycle_index(&self) -> u32 {
        match self {
            Phase::PreStart => 0,
            Phase::Cycle { cycle, .. } => *cycle,
        }
    }

    /// Human-readable label, e.g. `第2次化疗d5` or `首次化疗前` with the default labels.
    pub fn label(&self, labels: &LabelSet) -> String {
        match self {
            Phase::PreStart => labels.pre_start.clone(),
            Phase::Cycle {
                cycle,
                day_in_cycle,
            } => format!(
                "{}{cycle}{}{day_in_cycle}",
                labels.cycle_prefix, labels.cycle_day_separator
            ),
        }
    }
}

/// Inclusive range of cycle numbers used to narrow the charted points.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CycleRange {
    pub start: u32,
    pub end: u32,
}

impl CycleRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, phase: Phase) -> bool {
        let cycle = phase.cycle_index();
        cycle >= self.start && cycle <= self.end
    }
}

/// Parse a report date. Accepts `YYYY-MM-DD`, the dotted `YYYY.MM.DD` printed on
/// lab reports, RFC 3339 timestamps (normalized to UTC) and naive
/// `YYYY-MM-DDTHH:MM:SS` timestamps.
pub fn parse_date(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    for format in ["%Y-%m-%d", "%Y.%m.%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Some(date.and_time(NaiveTime::default()));
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc).naive_utc());
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S").ok()
}

/// Fractional number of days from `base` to `date` (negative when `date` is earlier).
pub fn days_between(date: NaiveDateTime, base: NaiveDateTime) -> f64 {
    date.signed_duration_since(base).num_milliseconds() as f64 / MILLIS_PER_DAY as f64
}

/// Cycle and day-in-cycle of `date` for a regimen that started on `start_date`.
///
/// `cycle_length_days` must be positive; the loader substitutes the default before
/// a dataset ever reaches this function.
pub fn cycle_and_day(date: NaiveDateTime, start_date: NaiveDate, cycle_length_days: u32) -> Phase {
    let cycle_length = i64::from(cycle_length_days.max(1));
    let start = start_date.and_time(NaiveTime::default());
    let delta_days = date
        .signed_duration_since(start)
        .num_milliseconds()
        .div_euclid(MILLIS_PER_DAY);

    if delta_days < 0 {
        return Phase::PreStart;
    }

    Phase::Cycle {
        cycle: to_u32(delta_days / cycle_length + 1),
        day_in_cycle: to_u32(delta_days % cycle_length + 1),
    }
}

/// Largest cycle reached by any of `dates`; 1 when no date is on or after the start.
pub fn max_cycle<'a, I>(dates: I, start_date: NaiveDate, cycle_length_days: u32) -> u32
where
    I: IntoIterator<Item = &'a str>,
{
    dates
        .into_iter()
        .filter_map(parse_date)
        .map(|date| cycle_and_day(date, start_date, cycle_length_days).cycle_index())
        .fold(1, u32::max)
}

/// Points whose cycle lies within `range`. Points with unreadable dates are dropped.
pub fn filter_by_cycle<'a>(
    series: &'a [SamplePoint],
    range: CycleRange,
    start_date: NaiveDate,
    cycle_length_days: u32,
) -> Vec<&'a SamplePoint> {
    series
        .iter()
        .filter(|pt| {
            parse_date(&pt.date)
                .map(|date| range.contains(cycle_and_day(date, start_date, cycle_length_days)))
                .unwrap_or(false)
        })
        .collect()
}

fn to_u32(value: i64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SampleValue;
    use chrono::Duration;
    use proptest::prelude::*;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, 8).unwrap()
    }

    fn at(date: NaiveDate) -> NaiveDateTime {
        date.and_time(NaiveTime::default())
    }

    #[test]
    fn start_date_is_cycle_one_day_one() {
        assert_eq!(
            cycle_and_day(at(start()), start(), 21),
            Phase::Cycle {
                cycle: 1,
                day_in_cycle: 1
            }
        );
    }

    #[test]
    fn day_before_start_is_pre_start() {
        assert_eq!(
            cycle_and_day(at(start() - Duration::days(1)), start(), 21),
            Phase::PreStart
        );
    }

    #[test]
    fn cycle_rolls_over_after_full_length() {
        assert_eq!(
            cycle_and_day(at(start() + Duration::days(21)), start(), 21),
            Phase::Cycle {
                cycle: 2,
                day_in_cycle: 1
            }
        );
        assert_eq!(
            cycle_and_day(at(start() + Duration::days(20)), start(), 21),
            Phase::Cycle {
                cycle: 1,
                day_in_cycle: 21
            }
        );
    }

    #[test]
    fn time_of_day_truncates_towards_start() {
        let late_evening = parse_date("2025-08-08T23:59:00").unwrap();
        assert_eq!(
            cycle_and_day(late_evening, start(), 21),
            Phase::Cycle {
                cycle: 1,
                day_in_cycle: 1
            }
        );
        let before = parse_date("2025-08-07T12:00:00Z").unwrap();
        assert_eq!(cycle_and_day(before, start(), 21), Phase::PreStart);
    }

    #[test]
    fn labels_follow_label_set() {
        let labels = LabelSet::default();
        assert_eq!(Phase::PreStart.label(&labels), "首次化疗前");
        let phase = Phase::Cycle {
            cycle: 3,
            day_in_cycle: 12,
        };
        assert_eq!(phase.label(&labels), "第3次化疗d12");
    }

    #[test]
    fn max_cycle_defaults_to_one() {
        assert_eq!(max_cycle(Vec::<&str>::new(), start(), 21), 1);
        assert_eq!(max_cycle(["2025-07-01", "2025-08-01"], start(), 21), 1);
        assert_eq!(
            max_cycle(["2025-07-01", "2025-09-20", "not a date"], start(), 21),
            3
        );
    }

    #[test]
    fn cycle_filter_excludes_out_of_range_points() {
        let series: Vec<SamplePoint> = [
            "2025-08-01", // pre-start
            "2025-08-08", // cycle 1
            "2025-08-29", // cycle 2
            "2025-09-25", // cycle 3
            "2025-10-10", // cycle 4
            "garbage",
        ]
        .into_iter()
        .map(|d| SamplePoint::new(d, SampleValue::Number(1.0), None))
        .collect();

        let kept: Vec<&str> = filter_by_cycle(&series, CycleRange::new(2, 3), start(), 21)
            .into_iter()
            .map(|pt| pt.date.as_str())
            .collect();
        assert_eq!(kept, vec!["2025-08-29", "2025-09-25"]);

        let with_pre: Vec<&str> = filter_by_cycle(&series, CycleRange::new(0, 1), start(), 21)
            .into_iter()
            .map(|pt| pt.date.as_str())
            .collect();
        assert_eq!(with_pre, vec!["2025-08-01", "2025-08-08"]);
    }

    #[test]
    fn fractional_days_between_dates() {
        let base = parse_date("2025-08-08").unwrap();
        let later = parse_date("2025-08-09T12:00:00").unwrap();
        assert_eq!(days_between(later, base), 1.5);
        assert_eq!(days_between(base, later), -1.5);
    }

    #[test]
    fn dotted_report_dates_parse() {
        assert_eq!(
            parse_date("2025.08.15"),
            Some(at(NaiveDate::from_ymd_opt(2025, 8, 15).unwrap()))
        );
        assert_eq!(parse_date(" 2025.08.15 "), parse_date("2025-08-15"));
        assert_eq!(parse_date("2025.13.01"), None);
        assert_eq!(
            cycle_and_day(parse_date("2025.08.15").unwrap(), start(), 21),
            Phase::Cycle {
                cycle: 1,
                day_in_cycle: 8
            }
        );
    }

    proptest! {
        #[test]
        fn cycle_and_day_decomposes_the_offset(delta in 0i64..5_000, len in 1u32..400) {
            let date = at(start() + Duration::days(delta));
            match cycle_and_day(date, start(), len) {
                Phase::Cycle { cycle, day_in_cycle } => {
                    prop_assert!(cycle >= 1);
                    prop_assert!((1..=len).contains(&day_in_cycle));
                    let rebuilt = i64::from(cycle - 1) * i64::from(len) + i64::from(day_in_cycle) - 1;
                    prop_assert_eq!(rebuilt, delta);
                }
                Phase::PreStart => prop_assert!(false, "offset {} is not before the start", delta),
            }
        }

        #[test]
        fn dates_before_start_are_pre_start(delta in 1i64..5_000, len in 0u32..400) {
            let date = at(start() - Duration::days(delta));
            prop_assert_eq!(cycle_and_day(date, start(), len), Phase::PreStart);
        }
    }
}
