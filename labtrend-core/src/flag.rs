//! Reference-range flags shown next to each value.

use crate::ReferenceRange;

pub const FLAG_HIGH: &str = "↑";
pub const FLAG_LOW: &str = "↓";
/// Value inside a known range.
pub const FLAG_IN_RANGE: &str = "-";

/// Flag to display for `value`.
///
/// A non-blank `explicit` flag from the lab report always wins and is returned as
/// given. Otherwise the flag is derived from `reference`: `↓` below the lower
/// bound, `↑` above the upper bound, `-` when some bound exists, `""` when no
/// range is known or there is no value.
pub fn flag_for(value: Option<f64>, reference: Option<&ReferenceRange>, explicit: &str) -> String {
    if !explicit.trim().is_empty() {
        return explicit.to_string();
    }
    let Some(value) = value else {
        return String::new();
    };
    let lower = reference.and_then(|r| r.lower);
    let upper = reference.and_then(|r| r.upper);

    let flag = match (lower, upper) {
        (Some(lower), _) if value < lower => FLAG_LOW,
        (_, Some(upper)) if value > upper => FLAG_HIGH,
        (None, None) => "",
        _ => FLAG_IN_RANGE,
    };
    flag.to_string()
}

/// `↑` and `↓` are abnormal; everything else (including no flag) is not.
pub fn is_abnormal(flag: Option<&str>) -> bool {
    matches!(flag, Some(FLAG_HIGH) | Some(FLAG_LOW))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn range() -> ReferenceRange {
        ReferenceRange::new(Some(4.0), Some(9.0))
    }

    #[test]
    fn derives_flag_from_complete_range() {
        assert_eq!(flag_for(Some(10.0), Some(&range()), ""), "↑");
        assert_eq!(flag_for(Some(3.0), Some(&range()), ""), "↓");
        assert_eq!(flag_for(Some(5.0), Some(&range()), ""), "-");
        assert_eq!(flag_for(Some(4.0), Some(&range()), ""), "-");
        assert_eq!(flag_for(Some(5.0), None, ""), "");
    }

    #[test]
    fn half_open_ranges_still_flag() {
        let lower_only = ReferenceRange::new(Some(4.0), None);
        assert_eq!(flag_for(Some(3.9), Some(&lower_only), ""), "↓");
        assert_eq!(flag_for(Some(400.0), Some(&lower_only), ""), "-");

        let upper_only = ReferenceRange::new(None, Some(9.0));
        assert_eq!(flag_for(Some(9.5), Some(&upper_only), ""), "↑");

        assert_eq!(flag_for(Some(5.0), Some(&ReferenceRange::default()), ""), "");
    }

    #[test]
    fn explicit_flag_wins() {
        assert_eq!(flag_for(Some(5.0), Some(&range()), "↑"), "↑");
        assert_eq!(flag_for(None, None, "↓"), "↓");
        assert_eq!(flag_for(Some(10.0), Some(&range()), "   "), "↑");
    }

    #[test]
    fn missing_value_has_no_flag() {
        assert_eq!(flag_for(None, Some(&range()), ""), "");
    }

    #[test]
    fn abnormal_flags() {
        assert!(is_abnormal(Some("↑")));
        assert!(is_abnormal(Some("↓")));
        assert!(!is_abnormal(Some("-")));
        assert!(!is_abnormal(Some("")));
        assert!(!is_abnormal(None));
    }

    fn bound() -> impl Strategy<Value = Option<f64>> {
        prop_oneof![Just(None), any::<f64>().prop_map(Some)]
    }

    proptest! {
        #[test]
        fn flag_is_derived_or_explicit(
            value in prop::option::of(any::<f64>()),
            lower in bound(),
            upper in bound(),
            with_range in any::<bool>(),
            explicit in prop_oneof![Just(String::new()), Just("  ".to_string()), "\\PC{1,4}"],
        ) {
            let range = ReferenceRange::new(lower, upper);
            let reference = with_range.then_some(&range);
            let flag = flag_for(value, reference, &explicit);

            if explicit.trim().is_empty() {
                prop_assert!(
                    [FLAG_HIGH, FLAG_LOW, FLAG_IN_RANGE, ""].contains(&flag.as_str()),
                    "unexpected flag {:?}",
                    flag
                );
            } else {
                prop_assert_eq!(flag, explicit);
            }
        }
    }
}
