//! Threshold-rule matching.
//!
//! Rules are stored unordered. Evaluation order is derived on every call:
//! highest `min_glucose` first, so overlapping bands resolve toward the more
//! urgent rule. Ties on `min_glucose` go to emergency rules, then to the lower
//! `order`, then to collection position.

use crate::status::CRITICAL_LOW_MAX;
use crate::DosageRule;
use once_cell::sync::Lazy;
use std::cmp::Ordering;

/// Cached stock rule table - built once and reused
static DEFAULT_RULES: Lazy<Vec<DosageRule>> = Lazy::new(build_default_rules);

/// Get a reference to the cached stock rule table
pub fn get_default_rules() -> &'static [DosageRule] {
    &DEFAULT_RULES
}

/// Build an owned copy of the stock rule table.
///
/// These are the thresholds the application ships with before a caregiver
/// edits them: fixed correction doses at 250/350/450 and sugar intake below 90.
/// Adjacent bands share their boundary value; the higher band wins it.
pub fn default_rules() -> Vec<DosageRule> {
    DEFAULT_RULES.clone()
}

fn build_default_rules() -> Vec<DosageRule> {
    vec![
        DosageRule {
            min_glucose: 450.0,
            max_glucose: None,
            insulin_units: Some(4.0),
            recommendation: "Take 4 units of regular human insulin.".into(),
            is_emergency: true,
            order: 0,
        },
        DosageRule {
            min_glucose: 350.0,
            max_glucose: Some(450.0),
            insulin_units: Some(3.0),
            recommendation: "Take 3 units of regular human insulin.".into(),
            is_emergency: false,
            order: 1,
        },
        DosageRule {
            min_glucose: 250.0,
            max_glucose: Some(350.0),
            insulin_units: Some(2.0),
            recommendation: "Take 2 units of regular human insulin.".into(),
            is_emergency: false,
            order: 2,
        },
        DosageRule {
            min_glucose: 90.0,
            max_glucose: Some(250.0),
            insulin_units: None,
            recommendation: "Blood glucose stable. Keep monitoring normally.".into(),
            is_emergency: false,
            order: 3,
        },
        DosageRule {
            min_glucose: just_above(CRITICAL_LOW_MAX),
            max_glucose: Some(90.0),
            insulin_units: None,
            recommendation: "Eat something sweet to raise your blood glucose.".into(),
            is_emergency: false,
            order: 4,
        },
        DosageRule {
            min_glucose: f64::NEG_INFINITY,
            max_glucose: Some(CRITICAL_LOW_MAX),
            insulin_units: None,
            recommendation: "Eat something sweet IMMEDIATELY and go to the hospital \
                             if the condition persists."
                .into(),
            is_emergency: true,
            order: 5,
        },
    ]
}

/// Smallest f64 greater than `value` (finite, positive `value`)
fn just_above(value: f64) -> f64 {
    f64::from_bits(value.to_bits() + 1)
}

/// Rules in the order they are tried.
pub fn evaluation_order(rules: &[DosageRule]) -> Vec<&DosageRule> {
    let mut ordered: Vec<&DosageRule> = rules.iter().collect();
    // sort_by is stable: equal keys keep collection order
    ordered.sort_by(|a, b| {
        b.min_glucose
            .total_cmp(&a.min_glucose)
            .then_with(|| emergency_first(a, b))
            .then_with(|| a.order.cmp(&b.order))
    });
    ordered
}

fn emergency_first(a: &DosageRule, b: &DosageRule) -> Ordering {
    b.is_emergency.cmp(&a.is_emergency)
}

/// Find the applicable rule for `value`, first match wins.
pub fn match_rule(rules: &[DosageRule], value: f64) -> Option<&DosageRule> {
    let found = evaluation_order(rules)
        .into_iter()
        .find(|rule| rule.covers(value));

    match found {
        Some(rule) => tracing::debug!(
            "Matched rule min={} max={:?} for glucose {}",
            rule.min_glucose,
            rule.max_glucose,
            value
        ),
        None => tracing::debug!("No rule matched glucose {} ({} rules)", value, rules.len()),
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(min: f64, max: Option<f64>, units: Option<f64>, text: &str) -> DosageRule {
        DosageRule {
            min_glucose: min,
            max_glucose: max,
            insulin_units: units,
            recommendation: text.into(),
            is_emergency: false,
            order: 0,
        }
    }

    #[test]
    fn test_single_band_match() {
        let rules = vec![rule(250.0, Some(350.0), Some(2.0), "Take 2 units")];

        let matched = match_rule(&rules, 300.0).unwrap();
        assert_eq!(matched, &rules[0]);
        assert!(match_rule(&rules, 249.0).is_none());
        assert!(match_rule(&rules, 351.0).is_none());
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let rules = vec![rule(250.0, Some(350.0), Some(2.0), "band")];
        assert!(match_rule(&rules, 250.0).is_some());
        assert!(match_rule(&rules, 350.0).is_some());
    }

    #[test]
    fn test_unbounded_max() {
        let rules = vec![rule(400.0, None, Some(5.0), "above")];
        assert!(match_rule(&rules, 10_000.0).is_some());
    }

    #[test]
    fn test_overlap_prefers_higher_threshold() {
        // Collection order deliberately puts the lower band first
        let rules = vec![
            rule(100.0, Some(400.0), Some(1.0), "wide"),
            rule(300.0, Some(400.0), Some(3.0), "narrow"),
        ];

        assert_eq!(match_rule(&rules, 320.0).unwrap().recommendation, "narrow");
        assert_eq!(match_rule(&rules, 200.0).unwrap().recommendation, "wide");
    }

    #[test]
    fn test_equal_min_prefers_emergency() {
        let mut urgent = rule(300.0, None, None, "urgent");
        urgent.is_emergency = true;
        urgent.order = 9;
        let rules = vec![rule(300.0, None, Some(2.0), "plain"), urgent];

        assert_eq!(match_rule(&rules, 310.0).unwrap().recommendation, "urgent");
    }

    #[test]
    fn test_equal_min_then_lower_order() {
        let mut first = rule(300.0, None, Some(2.0), "first");
        first.order = 1;
        let mut second = rule(300.0, None, Some(3.0), "second");
        second.order = 2;
        let rules = vec![second, first];

        assert_eq!(match_rule(&rules, 310.0).unwrap().recommendation, "first");
    }

    #[test]
    fn test_full_tie_keeps_collection_position() {
        let rules = vec![
            rule(300.0, None, Some(2.0), "a"),
            rule(300.0, None, Some(3.0), "b"),
        ];
        assert_eq!(match_rule(&rules, 310.0).unwrap().recommendation, "a");

        let swapped = vec![rules[1].clone(), rules[0].clone()];
        assert_eq!(match_rule(&swapped, 310.0).unwrap().recommendation, "b");
    }

    #[test]
    fn test_inverted_band_matches_nothing() {
        let rules = vec![rule(300.0, Some(200.0), Some(2.0), "inverted")];
        for v in [150.0, 200.0, 250.0, 300.0, 350.0] {
            assert!(match_rule(&rules, v).is_none(), "matched at {}", v);
        }
    }

    #[test]
    fn test_inverted_band_does_not_shadow_lower_rules() {
        let rules = vec![
            rule(300.0, Some(200.0), Some(9.0), "inverted"),
            rule(100.0, Some(400.0), Some(1.0), "fallback"),
        ];
        assert_eq!(match_rule(&rules, 320.0).unwrap().recommendation, "fallback");
    }

    #[test]
    fn test_missing_hypo_rule_leaves_gap() {
        let mut help = rule(60.0, None, None, "seek help");
        help.is_emergency = true;
        let rules = vec![help];

        assert!(match_rule(&rules, 40.0).is_none());
    }

    #[test]
    fn test_nan_threshold_never_matches() {
        let rules = vec![
            rule(f64::NAN, None, Some(2.0), "broken"),
            rule(0.0, None, None, "floor"),
        ];
        assert_eq!(match_rule(&rules, 120.0).unwrap().recommendation, "floor");
    }

    #[test]
    fn test_empty_rules() {
        assert!(match_rule(&[], 120.0).is_none());
    }

    #[test]
    fn test_matching_is_deterministic() {
        let rules = default_rules();
        for v in [30.0, 75.0, 150.0, 260.0, 380.0, 500.0] {
            let first = match_rule(&rules, v).cloned();
            for _ in 0..10 {
                assert_eq!(match_rule(&rules, v).cloned(), first);
            }
        }
    }

    #[test]
    fn test_default_rules_cover_every_band() {
        let rules = get_default_rules();
        assert_eq!(rules.len(), 6);

        assert_eq!(match_rule(rules, 500.0).unwrap().insulin_units, Some(4.0));
        assert_eq!(match_rule(rules, 400.0).unwrap().insulin_units, Some(3.0));
        assert_eq!(match_rule(rules, 300.0).unwrap().insulin_units, Some(2.0));
        assert_eq!(match_rule(rules, 150.0).unwrap().insulin_units, None);
        assert!(!match_rule(rules, 70.0).unwrap().is_emergency);
        assert!(match_rule(rules, 45.0).unwrap().is_emergency);
        assert!(match_rule(rules, -5.0).is_some());
    }

    #[test]
    fn test_default_rules_have_no_gaps() {
        let rules = get_default_rules();
        for step in 0..=60_000 {
            let v = step as f64 / 100.0;
            assert!(match_rule(rules, v).is_some(), "no rule for {}", v);
        }
    }

    #[test]
    fn test_default_rules_just_above_critical_low() {
        let rules = get_default_rules();
        for v in [just_above(60.0), 60.01, 60.05, 60.09] {
            let matched = match_rule(rules, v).unwrap();
            assert!(!matched.is_emergency, "emergency at {}", v);
            assert!(matched.recommendation.contains("Eat something sweet"));
        }
        assert!(match_rule(rules, 60.0).unwrap().is_emergency);
    }
}
