//! Configuration file support for Glyco.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/glyco/config.toml`.

use crate::formula;
use crate::rules::default_rules;
use crate::{CalculationMode, DosageRule, Error, FormulaConfig, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub dosage: DosageConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Stored dosage settings, handed to the engine on every call
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DosageConfig {
    #[serde(default)]
    pub mode: CalculationMode,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<FormulaConfig>,

    #[serde(default = "default_rules")]
    pub rules: Vec<DosageRule>,
}

impl Default for DosageConfig {
    fn default() -> Self {
        Self {
            mode: CalculationMode::RuleBased,
            formula: None,
            rules: default_rules(),
        }
    }
}

impl DosageConfig {
    /// Rule mode over the given table
    pub fn with_rules(rules: Vec<DosageRule>) -> Self {
        Self {
            mode: CalculationMode::RuleBased,
            formula: None,
            rules,
        }
    }

    /// Formula mode, keeping `rules` as the fallback table
    pub fn with_formula(formula: FormulaConfig, rules: Vec<DosageRule>) -> Self {
        Self {
            mode: CalculationMode::FormulaBased,
            formula: Some(formula),
            rules,
        }
    }

    /// The formula in effect, if any.
    ///
    /// Only formula mode has one, and a blank expression counts as none.
    pub fn active_formula(&self) -> Option<&FormulaConfig> {
        match self.mode {
            CalculationMode::RuleBased => None,
            CalculationMode::FormulaBased => self
                .formula
                .as_ref()
                .filter(|f| !f.expression.trim().is_empty()),
        }
    }

    /// Lint the stored settings. An empty list means nothing to report.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.mode == CalculationMode::FormulaBased {
            match self.active_formula() {
                None => errors.push(
                    "Formula mode is selected but no formula is configured; \
                     dosage rules will be used"
                        .to_string(),
                ),
                Some(f) => {
                    if let Err(e) = formula::validate(&f.expression) {
                        errors.push(format!("Formula '{}' is invalid: {}", f.expression, e));
                    }
                    if f.insulin_label.as_deref().map_or(true, |l| l.trim().is_empty()) {
                        errors.push("Formula mode requires an insulin label".to_string());
                    }
                }
            }
        }

        if self.rules.is_empty() {
            errors.push("No dosage rules configured".to_string());
        }

        for (i, rule) in self.rules.iter().enumerate() {
            let n = i + 1;
            if rule.min_glucose.is_nan() {
                errors.push(format!("Rule {} has no numeric minimum", n));
            }
            match rule.max_glucose {
                Some(max) if max.is_nan() => {
                    errors.push(format!("Rule {} has no numeric maximum", n));
                }
                Some(max) if max < rule.min_glucose => {
                    errors.push(format!(
                        "Rule {} has maximum {} below minimum {} and will never match",
                        n, max, rule.min_glucose
                    ));
                }
                _ => {}
            }
            if let Some(units) = rule.insulin_units {
                if !units.is_finite() || units < formula::MIN_UNITS {
                    errors.push(format!("Rule {} has invalid insulin units {}", n, units));
                } else if units > formula::MAX_UNITS {
                    errors.push(format!(
                        "Rule {} doses {} units, above the {} unit limit",
                        n,
                        units,
                        formula::MAX_UNITS
                    ));
                }
            }
            if rule.recommendation.trim().is_empty() {
                errors.push(format!("Rule {} has an empty recommendation", n));
            }
        }

        errors
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("glyco")
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> Result<PathBuf> {
        let base = dirs::config_dir()
            .ok_or_else(|| Error::Config("Unable to locate a config directory".into()))?;
        Ok(base.join("glyco").join("config.toml"))
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path()?;
        self.save_to(&config_path)
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
