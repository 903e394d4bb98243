//! Severity classification of glucose readings.
//!
//! The displayed tier always comes from fixed numeric thresholds. A matched
//! rule only contributes its emergency flag, so a misconfigured dosage table
//! cannot relabel a reading.

use crate::{DosageRule, SeverityTier, StatusColor};
use std::cmp::Ordering;
use std::fmt;

/// At or below this value a reading is severe hypoglycemia.
pub const CRITICAL_LOW_MAX: f64 = 60.0;
/// Below this value a reading is hypoglycemia; insulin is never dosed.
pub const LOW_BELOW: f64 = 90.0;
/// From this value a reading is hyperglycemia.
pub const HIGH_FROM: f64 = 250.0;
/// From this value a reading is high hyperglycemia.
pub const VERY_HIGH_FROM: f64 = 350.0;
/// From this value a reading is severe hyperglycemia (formula mode only).
pub const CRITICAL_HIGH_FROM: f64 = 450.0;

/// Classify a reading given the rule that matched it, if any.
///
/// 1. Emergency rule → `CriticalLow` at or below 60, `CriticalHigh` otherwise
/// 2. Otherwise the fixed ladder: >= 350, >= 250, < 90, else normal
pub fn classify(rule: Option<&DosageRule>, value: f64) -> SeverityTier {
    if rule.is_some_and(|r| r.is_emergency) {
        return if value <= CRITICAL_LOW_MAX {
            SeverityTier::CriticalLow
        } else {
            SeverityTier::CriticalHigh
        };
    }

    if value >= VERY_HIGH_FROM {
        SeverityTier::VeryHigh
    } else if value >= HIGH_FROM {
        SeverityTier::High
    } else if value < LOW_BELOW {
        SeverityTier::Low
    } else {
        SeverityTier::Normal
    }
}

impl SeverityTier {
    /// Position in the clinical-risk ordering.
    ///
    /// Acute hypoglycemia outranks hyperglycemia of the same grade.
    pub const fn risk_rank(self) -> u8 {
        match self {
            SeverityTier::Normal => 0,
            SeverityTier::High => 1,
            SeverityTier::Low => 2,
            SeverityTier::VeryHigh => 3,
            SeverityTier::CriticalHigh => 4,
            SeverityTier::CriticalLow => 5,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            SeverityTier::CriticalLow => "Severe hypoglycemia",
            SeverityTier::Low => "Hypoglycemia",
            SeverityTier::Normal => "Normal",
            SeverityTier::High => "Hyperglycemia",
            SeverityTier::VeryHigh => "High hyperglycemia",
            SeverityTier::CriticalHigh => "Severe hyperglycemia",
        }
    }

    pub const fn color(self) -> StatusColor {
        match self {
            SeverityTier::CriticalLow | SeverityTier::CriticalHigh => StatusColor::Danger,
            SeverityTier::Low | SeverityTier::High | SeverityTier::VeryHigh => {
                StatusColor::Warning
            }
            SeverityTier::Normal => StatusColor::Success,
        }
    }

    pub const fn is_critical(self) -> bool {
        matches!(self, SeverityTier::CriticalLow | SeverityTier::CriticalHigh)
    }
}

impl PartialOrd for SeverityTier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SeverityTier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.risk_rank().cmp(&other.risk_rank())
    }
}

impl fmt::Display for SeverityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(min: f64, max: Option<f64>, emergency: bool) -> DosageRule {
        DosageRule {
            min_glucose: min,
            max_glucose: max,
            insulin_units: None,
            recommendation: "test".into(),
            is_emergency: emergency,
            order: 0,
        }
    }

    #[test]
    fn test_fixed_ladder_without_rule() {
        assert_eq!(classify(None, 40.0), SeverityTier::Low);
        assert_eq!(classify(None, 89.9), SeverityTier::Low);
        assert_eq!(classify(None, 90.0), SeverityTier::Normal);
        assert_eq!(classify(None, 249.9), SeverityTier::Normal);
        assert_eq!(classify(None, 250.0), SeverityTier::High);
        assert_eq!(classify(None, 349.0), SeverityTier::High);
        assert_eq!(classify(None, 350.0), SeverityTier::VeryHigh);
        assert_eq!(classify(None, 600.0), SeverityTier::VeryHigh);
    }

    #[test]
    fn test_emergency_rule_splits_at_sixty() {
        let r = rule(0.0, None, true);
        assert_eq!(classify(Some(&r), 60.0), SeverityTier::CriticalLow);
        assert_eq!(classify(Some(&r), 60.1), SeverityTier::CriticalHigh);
        assert_eq!(classify(Some(&r), 150.0), SeverityTier::CriticalHigh);
    }

    #[test]
    fn test_tier_ignores_matched_band() {
        // A normal-band rule matched at 300 still reads as High
        let misconfigured = rule(90.0, Some(400.0), false);
        assert_eq!(classify(Some(&misconfigured), 300.0), SeverityTier::High);
        assert_eq!(classify(Some(&misconfigured), 100.0), SeverityTier::Normal);
    }

    #[test]
    fn test_risk_ordering() {
        assert!(SeverityTier::CriticalLow > SeverityTier::CriticalHigh);
        assert!(SeverityTier::CriticalHigh > SeverityTier::VeryHigh);
        assert!(SeverityTier::Low > SeverityTier::High);
        assert!(SeverityTier::High > SeverityTier::Normal);

        let mut tiers = vec![
            SeverityTier::CriticalLow,
            SeverityTier::Normal,
            SeverityTier::VeryHigh,
            SeverityTier::Low,
        ];
        tiers.sort();
        assert_eq!(tiers.first(), Some(&SeverityTier::Normal));
        assert_eq!(tiers.last(), Some(&SeverityTier::CriticalLow));
    }

    #[test]
    fn test_labels_and_colors() {
        assert_eq!(SeverityTier::CriticalLow.label(), "Severe hypoglycemia");
        assert_eq!(SeverityTier::CriticalHigh.color(), StatusColor::Danger);
        assert_eq!(SeverityTier::VeryHigh.color(), StatusColor::Warning);
        assert_eq!(SeverityTier::Normal.color(), StatusColor::Success);
        assert!(SeverityTier::CriticalHigh.is_critical());
        assert!(!SeverityTier::Low.is_critical());
    }
}
