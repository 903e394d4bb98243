//! Recommendation selector: turns a glucose reading into advice.
//!
//! Routing:
//! - **Rule mode** (or formula mode with no formula): match the rule table
//! - **Formula mode**: fixed glucose ladder, dose from the formula
//! - **Fallback**: any formula failure reroutes that one call to the rules
//!
//! Two safety overrides hold on every route: no insulin at or below 60 mg/dL
//! and no insulin below 90 mg/dL.

use crate::config::DosageConfig;
use crate::formula::{round_units, Formula, FormulaError};
use crate::rules::match_rule;
use crate::status::{
    classify, CRITICAL_HIGH_FROM, CRITICAL_LOW_MAX, HIGH_FROM, LOW_BELOW, VERY_HIGH_FROM,
};
use crate::{DosageRule, Error, FormulaConfig, Icon, Recommendation, Result, SeverityTier};

/// Insulin name used in messages when the formula has no label
pub const DEFAULT_INSULIN_LABEL: &str = "insulin";

const CRITICAL_LOW_MESSAGE: &str =
    "Eat something sweet IMMEDIATELY and seek emergency care if the condition persists.";
const LOW_MESSAGE: &str = "Eat something sweet to raise your blood glucose.";
const STABLE_MESSAGE: &str = "Blood glucose stable. Keep monitoring normally.";
const CONFIGURATION_REQUIRED_MESSAGE: &str =
    "No dosage rules configured. Set up your dosage table before relying on recommendations.";

/// Which path produced a recommendation
#[derive(Clone, Debug, PartialEq)]
pub enum Route {
    Rules,
    Formula,
    /// Formula mode, but the formula failed and the rules answered
    Fallback(FormulaError),
}

/// A recommendation plus how it was reached
#[derive(Clone, Debug, PartialEq)]
pub struct Decision {
    pub recommendation: Recommendation,
    pub route: Route,
}

impl Decision {
    fn rules(recommendation: Recommendation) -> Self {
        Self {
            recommendation,
            route: Route::Rules,
        }
    }

    fn formula(recommendation: Recommendation) -> Self {
        Self {
            recommendation,
            route: Route::Formula,
        }
    }

    /// Why the formula was bypassed, if it was
    pub fn fallback_reason(&self) -> Option<&FormulaError> {
        match &self.route {
            Route::Fallback(reason) => Some(reason),
            _ => None,
        }
    }

    /// Non-fatal notice for the caller when the stored formula is broken
    pub fn warning(&self) -> Option<String> {
        self.fallback_reason().map(|reason| {
            format!(
                "The stored insulin formula could not be used ({}). \
                 Your dosage rules were applied instead.",
                reason
            )
        })
    }

    pub fn into_recommendation(self) -> Recommendation {
        self.recommendation
    }
}

/// Recommend for `value` under the stored dosage settings.
///
/// Errors only for non-finite input; every configuration problem degrades
/// to a rule-based answer.
pub fn recommend(value: f64, config: &DosageConfig) -> Result<Decision> {
    if !value.is_finite() {
        return Err(Error::InvalidGlucose(value));
    }

    let decision = match config.active_formula() {
        Some(formula) => recommend_from_formula(formula, &config.rules, value),
        None => Decision::rules(recommend_from_rules(&config.rules, value)),
    };

    tracing::debug!(
        "Glucose {} -> {:?} via {:?}",
        value,
        decision.recommendation.tier,
        decision.route
    );
    Ok(decision)
}

/// Rule-table recommendation.
///
/// An empty table yields a distinct "configuration required" answer; a table
/// with no matching band yields the stable default.
pub fn recommend_from_rules(rules: &[DosageRule], value: f64) -> Recommendation {
    if rules.is_empty() {
        return configuration_required();
    }

    let Some(rule) = match_rule(rules, value) else {
        return stable();
    };

    let mut insulin_units = rule.insulin_units.filter(|u| u.is_finite() && *u > 0.0);
    if value < LOW_BELOW && insulin_units.is_some() {
        tracing::warn!(
            "Rule starting at {} doses {:?} units at glucose {}; insulin suppressed",
            rule.min_glucose,
            insulin_units,
            value
        );
        insulin_units = None;
    }

    Recommendation {
        message: rule.recommendation.clone(),
        tier: classify(Some(rule), value),
        insulin_units,
        is_emergency: rule.is_emergency,
        icon: rule_icon(rule, insulin_units, value),
    }
}

fn rule_icon(rule: &DosageRule, insulin_units: Option<f64>, value: f64) -> Icon {
    if rule.is_emergency {
        if value <= CRITICAL_LOW_MAX {
            Icon::Sos
        } else {
            Icon::Siren
        }
    } else if insulin_units.is_some() {
        Icon::Syringe
    } else if value < LOW_BELOW {
        Icon::Candy
    } else {
        Icon::Check
    }
}

/// Formula-mode recommendation, falling back to `rules` on any failure.
pub fn recommend_from_formula(
    config: &FormulaConfig,
    rules: &[DosageRule],
    value: f64,
) -> Decision {
    match formula_recommendation(config, value) {
        Ok(recommendation) => Decision::formula(recommendation),
        Err(reason) => {
            tracing::warn!(
                "Formula {:?} unusable for glucose {}: {}. Falling back to dosage rules",
                config.expression,
                value,
                reason
            );
            Decision {
                recommendation: recommend_from_rules(rules, value),
                route: Route::Fallback(reason),
            }
        }
    }
}

fn formula_recommendation(
    config: &FormulaConfig,
    value: f64,
) -> std::result::Result<Recommendation, FormulaError> {
    // A formula that does not compile is broken for every value
    let formula = Formula::compile(&config.expression)?;

    // Hypoglycemia: insulin is never dosed, whatever the formula says
    if value <= CRITICAL_LOW_MAX {
        return Ok(Recommendation {
            message: CRITICAL_LOW_MESSAGE.to_string(),
            tier: SeverityTier::CriticalLow,
            insulin_units: None,
            is_emergency: true,
            icon: Icon::Sos,
        });
    }
    if value < LOW_BELOW {
        return Ok(Recommendation {
            message: LOW_MESSAGE.to_string(),
            tier: SeverityTier::Low,
            insulin_units: None,
            is_emergency: false,
            icon: Icon::Candy,
        });
    }
    if value < HIGH_FROM {
        return Ok(stable());
    }

    let units = round_units(formula.dose(value)?);
    let dose = Some(units).filter(|u| *u > 0.0);
    let label = config
        .insulin_label
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .unwrap_or(DEFAULT_INSULIN_LABEL);

    let recommendation = if value >= CRITICAL_HIGH_FROM {
        Recommendation {
            message: match dose {
                Some(u) => format!(
                    "Take {} units of {} and seek medical attention immediately.",
                    u, label
                ),
                None => "Seek medical attention immediately.".to_string(),
            },
            tier: SeverityTier::CriticalHigh,
            insulin_units: dose,
            is_emergency: true,
            icon: Icon::Siren,
        }
    } else if value >= VERY_HIGH_FROM {
        Recommendation {
            message: match dose {
                Some(u) => format!("Take {} units of {}. Recheck your glucose soon.", u, label),
                None => "Blood glucose very high. Keep monitoring closely.".to_string(),
            },
            tier: SeverityTier::VeryHigh,
            insulin_units: dose,
            is_emergency: false,
            icon: Icon::Warning,
        }
    } else {
        Recommendation {
            message: match dose {
                Some(u) => format!("Take {} units of {}.", u, label),
                None => "Blood glucose high. Keep monitoring.".to_string(),
            },
            tier: SeverityTier::High,
            insulin_units: dose,
            is_emergency: false,
            icon: Icon::Chart,
        }
    };

    Ok(recommendation)
}

fn stable() -> Recommendation {
    Recommendation {
        message: STABLE_MESSAGE.to_string(),
        tier: SeverityTier::Normal,
        insulin_units: None,
        is_emergency: false,
        icon: Icon::Check,
    }
}

fn configuration_required() -> Recommendation {
    Recommendation {
        message: CONFIGURATION_REQUIRED_MESSAGE.to_string(),
        tier: SeverityTier::Normal,
        insulin_units: None,
        is_emergency: false,
        icon: Icon::Settings,
    }
}
