//! Consolidates indicator records whose names canonicalize to the same indicator.

use std::collections::btree_map::{self, BTreeMap};

use indexmap::map::{Entry, IndexMap};
use labtrend_core::{is_abnormal, IndicatorRecord, ReferenceRange, SamplePoint};
use log::debug;

use crate::canonical::canonicalize;

/// Merge raw indicator records under their canonical names.
///
/// Records are visited in map order; the first record seen for a canonical name
/// seeds it and later ones only fill gaps:
///
/// * the unit is adopted only while the merged unit is still empty,
/// * the reference range is replaced wholesale only when the merged one is
///   incomplete and the incoming one is complete,
/// * samples on new dates are added, samples on a known date go through
///   [`prefer_incoming`].
///
/// Every resulting series is sorted by date string and holds one sample per date.
pub fn normalize_indicators(
    raw: &IndexMap<String, IndicatorRecord>,
) -> IndexMap<String, IndicatorRecord> {
    let mut merged: IndexMap<String, MergeAccumulator> = IndexMap::new();

    for (name, record) in raw {
        let canonical = canonicalize(name);
        match merged.entry(canonical) {
            Entry::Occupied(mut entry) => {
                debug!("merging `{name}` into `{}`", entry.key());
                entry.get_mut().absorb(record);
            }
            Entry::Vacant(entry) => {
                entry.insert(MergeAccumulator::seed(record));
            }
        }
    }

    merged
        .into_iter()
        .map(|(name, acc)| (name, acc.finish()))
        .collect()
}

/// Conflict rule for two samples on the same date.
///
/// A numeric value beats a non-numeric one. Between two numeric values the
/// incoming one wins unless only the existing one carries an abnormal flag
/// (`↑`/`↓`). A non-numeric incoming value never replaces anything.
pub fn prefer_incoming(existing: &SamplePoint, incoming: &SamplePoint) -> bool {
    match (existing.value.is_numeric(), incoming.value.is_numeric()) {
        (false, true) => true,
        (true, true) => abnormality(incoming) >= abnormality(existing),
        _ => false,
    }
}

fn abnormality(point: &SamplePoint) -> u8 {
    u8::from(is_abnormal(point.flag.as_deref()))
}

struct MergeAccumulator {
    unit: String,
    reference: Option<ReferenceRange>,
    by_date: BTreeMap<String, SamplePoint>,
}

impl MergeAccumulator {
    fn seed(record: &IndicatorRecord) -> Self {
        let mut acc = Self {
            unit: record.unit.clone(),
            reference: record.reference,
            by_date: BTreeMap::new(),
        };
        acc.insert_series(&record.series);
        acc
    }

    fn absorb(&mut self, record: &IndicatorRecord) {
        if self.unit.is_empty() && !record.unit.is_empty() {
            self.unit = record.unit.clone();
        }

        let current_complete = self.reference.is_some_and(|r| r.is_complete());
        let incoming_complete = record.reference.is_some_and(|r| r.is_complete());
        if !current_complete && incoming_complete {
            self.reference = record.reference;
        }

        self.insert_series(&record.series);
    }

    fn insert_series(&mut self, series: &[SamplePoint]) {
        for point in series {
            match self.by_date.entry(point.date.clone()) {
                btree_map::Entry::Vacant(entry) => {
                    entry.insert(point.clone());
                }
                btree_map::Entry::Occupied(mut entry) => {
                    if prefer_incoming(entry.get(), point) {
                        entry.insert(point.clone());
                    }
                }
            }
        }
    }

    fn finish(self) -> IndicatorRecord {
        IndicatorRecord {
            unit: self.unit,
            reference: self.reference,
            series: self.by_date.into_values().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labtrend_core::SampleValue;
    use proptest::prelude::*;

    fn point(date: &str, value: f64, flag: &str) -> SamplePoint {
        SamplePoint::new(date, SampleValue::Number(value), Some(flag))
    }

    fn record(unit: &str, reference: Option<ReferenceRange>, series: Vec<SamplePoint>) -> IndicatorRecord {
        IndicatorRecord {
            unit: unit.to_string(),
            reference,
            series,
        }
    }

    fn merge_pair(first: IndicatorRecord, second: IndicatorRecord) -> IndicatorRecord {
        let mut raw = IndexMap::new();
        raw.insert("血红蛋白".to_string(), first);
        raw.insert("血红蛋白浓度".to_string(), second);
        let merged = normalize_indicators(&raw);
        assert_eq!(merged.len(), 1);
        merged["血红蛋白浓度"].clone()
    }

    #[test]
    fn abnormal_incoming_beats_plain_existing() {
        let merged = merge_pair(
            record("", None, vec![point("2024-01-01", 5.0, "")]),
            record("", None, vec![point("2024-01-01", 7.0, "↑")]),
        );
        assert_eq!(merged.series, vec![point("2024-01-01", 7.0, "↑")]);
    }

    #[test]
    fn abnormal_existing_survives_plain_incoming() {
        let merged = merge_pair(
            record("", None, vec![point("2024-01-01", 7.0, "↑")]),
            record("", None, vec![point("2024-01-01", 5.0, "")]),
        );
        assert_eq!(merged.series, vec![point("2024-01-01", 7.0, "↑")]);
    }

    #[test]
    fn equal_abnormality_goes_to_incoming() {
        let both_plain = merge_pair(
            record("", None, vec![point("2024-01-01", 5.0, "-")]),
            record("", None, vec![point("2024-01-01", 6.0, "")]),
        );
        assert_eq!(both_plain.series[0].numeric(), Some(6.0));

        let both_abnormal = merge_pair(
            record("", None, vec![point("2024-01-01", 2.0, "↓")]),
            record("", None, vec![point("2024-01-01", 12.0, "↑")]),
        );
        assert_eq!(both_abnormal.series[0].numeric(), Some(12.0));
    }

    #[test]
    fn numeric_values_outrank_non_numeric() {
        let text = SamplePoint::new("2024-01-01", SampleValue::Text("溶血".into()), Some("↑"));
        let missing = SamplePoint::new("2024-01-01", SampleValue::Missing, None);

        let filled = merge_pair(
            record("", None, vec![missing.clone()]),
            record("", None, vec![point("2024-01-01", 5.0, "")]),
        );
        assert_eq!(filled.series[0].numeric(), Some(5.0));

        let kept = merge_pair(
            record("", None, vec![point("2024-01-01", 5.0, "")]),
            record("", None, vec![text.clone()]),
        );
        assert_eq!(kept.series[0].numeric(), Some(5.0));

        let neither = merge_pair(record("", None, vec![missing]), record("", None, vec![text]));
        assert_eq!(neither.series[0].value, SampleValue::Missing);
    }

    #[test]
    fn unit_is_adopted_only_when_empty() {
        let adopted = merge_pair(record("", None, vec![]), record("g/L", None, vec![]));
        assert_eq!(adopted.unit, "g/L");

        let kept = merge_pair(record("g/L", None, vec![]), record("g/dL", None, vec![]));
        assert_eq!(kept.unit, "g/L");
    }

    #[test]
    fn reference_is_replaced_wholesale() {
        let partial = ReferenceRange::new(Some(115.0), None);
        let complete = ReferenceRange::new(Some(130.0), Some(175.0));
        let other = ReferenceRange::new(Some(1.0), Some(2.0));

        let replaced = merge_pair(record("", Some(partial), vec![]), record("", Some(complete), vec![]));
        assert_eq!(replaced.reference, Some(complete));

        let kept = merge_pair(record("", Some(complete), vec![]), record("", Some(other), vec![]));
        assert_eq!(kept.reference, Some(complete));

        let never_field_merged = merge_pair(
            record("", Some(partial), vec![]),
            record("", Some(ReferenceRange::new(None, Some(175.0))), vec![]),
        );
        assert_eq!(never_field_merged.reference, Some(partial));

        let from_none = merge_pair(record("", None, vec![]), record("", Some(complete), vec![]));
        assert_eq!(from_none.reference, Some(complete));
    }

    #[test]
    fn series_are_sorted_and_merged_by_date() {
        let merged = merge_pair(
            record("", None, vec![point("2024-03-01", 3.0, ""), point("2024-01-01", 1.0, "")]),
            record("", None, vec![point("2024-02-01", 2.0, "")]),
        );
        let dates: Vec<&str> = merged.series.iter().map(|p| p.date.as_str()).collect();
        assert_eq!(dates, vec!["2024-01-01", "2024-02-01", "2024-03-01"]);
    }

    #[test]
    fn single_source_records_are_sorted_too() {
        let mut raw = IndexMap::new();
        raw.insert(
            "白细胞计数".to_string(),
            record("10^9/L", None, vec![point("2024-02-01", 2.0, ""), point("2024-01-01", 1.0, "")]),
        );
        let merged = normalize_indicators(&raw);
        assert_eq!(merged["白细胞计数"].series[0].date, "2024-01-01");
    }

    #[test]
    fn canonical_order_follows_first_occurrence() {
        let mut raw = IndexMap::new();
        raw.insert("白细胞计数".to_string(), IndicatorRecord::default());
        raw.insert("红细胞数".to_string(), IndicatorRecord::default());
        raw.insert("血小板计数".to_string(), IndicatorRecord::default());
        raw.insert("红细胞".to_string(), IndicatorRecord::default());
        let merged = normalize_indicators(&raw);
        let names: Vec<&str> = merged.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["白细胞计数", "红细胞", "血小板计数"]);
    }

    #[test]
    fn input_is_not_mutated() {
        let mut raw = IndexMap::new();
        raw.insert(
            "红细胞数".to_string(),
            record("", None, vec![point("2024-02-01", 2.0, ""), point("2024-01-01", 1.0, "")]),
        );
        let before = raw.clone();
        let _ = normalize_indicators(&raw);
        assert_eq!(raw, before);
    }

    fn arb_point() -> impl Strategy<Value = SamplePoint> {
        (
            prop::sample::select(vec!["2024-01-01", "2024-01-08", "2024-01-15", "2024-02-01"]),
            prop::option::of(0.0f64..500.0),
            prop::sample::select(vec!["", "-", "↑", "↓"]),
        )
            .prop_map(|(date, value, flag)| {
                let value = value.map(SampleValue::Number).unwrap_or_default();
                SamplePoint::new(date, value, Some(flag))
            })
    }

    proptest! {
        #[test]
        fn merged_series_sorted_and_unique(
            a in prop::collection::vec(arb_point(), 0..8),
            b in prop::collection::vec(arb_point(), 0..8),
        ) {
            let mut raw = IndexMap::new();
            raw.insert("红细胞计数".to_string(), record("", None, a));
            raw.insert("红细胞数".to_string(), record("", None, b));
            let merged = normalize_indicators(&raw);
            let series = &merged["红细胞"].series;
            for pair in series.windows(2) {
                prop_assert!(pair[0].date < pair[1].date);
            }
        }

        #[test]
        fn merged_dates_are_union_of_inputs(
            a in prop::collection::vec(arb_point(), 0..8),
            b in prop::collection::vec(arb_point(), 0..8),
        ) {
            let mut expected: Vec<String> = a.iter().chain(&b).map(|p| p.date.clone()).collect();
            expected.sort();
            expected.dedup();

            let mut raw = IndexMap::new();
            raw.insert("红细胞计数".to_string(), record("", None, a));
            raw.insert("红细胞数".to_string(), record("", None, b));
            let merged = normalize_indicators(&raw);
            let dates: Vec<String> = merged["红细胞"].series.iter().map(|p| p.date.clone()).collect();
            prop_assert_eq!(dates, expected);
        }
    }
}
