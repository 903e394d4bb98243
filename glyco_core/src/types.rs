//! Core domain types for the dosage decision engine.
//!
//! This module defines the plain data exchanged with the engine:
//! - Dosage rules and formula configuration (inputs)
//! - Calculation mode selection
//! - Severity tiers, icons and the final recommendation (output)

use serde::{Deserialize, Serialize};

// ============================================================================
// Configuration Types
// ============================================================================

/// A threshold band in the user's dosage table.
///
/// `max_glucose` and `insulin_units` are genuinely optional: an absent upper
/// bound means "and above", absent units means "no insulin for this band".
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DosageRule {
    pub min_glucose: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_glucose: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insulin_units: Option<f64>,
    pub recommendation: String,
    #[serde(default)]
    pub is_emergency: bool,
    #[serde(default)]
    pub order: i32,
}

impl DosageRule {
    /// Band test: `value >= min` and (`max` unbounded or `value <= max`).
    ///
    /// A rule whose max is below its min matches nothing.
    pub fn covers(&self, value: f64) -> bool {
        value >= self.min_glucose && self.max_glucose.map_or(true, |max| value <= max)
    }
}

/// Caregiver-authored insulin formula
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FormulaConfig {
    pub expression: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insulin_label: Option<String>,
}

impl FormulaConfig {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            insulin_label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.insulin_label = Some(label.into());
        self
    }
}

/// How the dose is decided
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum CalculationMode {
    #[default]
    #[serde(rename = "rules")]
    RuleBased,
    #[serde(rename = "formula")]
    FormulaBased,
}

// ============================================================================
// Output Types
// ============================================================================

/// Clinical severity of a reading.
///
/// Declared low-to-high by glucose; ordering (`Ord`) is by clinical risk,
/// see [`SeverityTier::risk_rank`].
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum SeverityTier {
    CriticalLow,
    Low,
    Normal,
    High,
    VeryHigh,
    CriticalHigh,
}

/// Display colour class for a tier
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StatusColor {
    Danger,
    Warning,
    Success,
}

/// Symbolic icon attached to a recommendation
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Icon {
    Sos,
    Siren,
    Warning,
    Chart,
    Syringe,
    Candy,
    Check,
    Settings,
}

impl Icon {
    pub fn glyph(self) -> &'static str {
        match self {
            Icon::Sos => "🆘",
            Icon::Siren => "🚨",
            Icon::Warning => "⚠️",
            Icon::Chart => "📊",
            Icon::Syringe => "💉",
            Icon::Candy => "🍬",
            Icon::Check => "✅",
            Icon::Settings => "⚙️",
        }
    }
}

/// The engine's single output value
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    pub message: String,
    pub tier: SeverityTier,
    pub insulin_units: Option<f64>,
    pub is_emergency: bool,
    pub icon: Icon,
}
