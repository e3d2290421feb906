//! User settings for the allowance engine
//!
//! Tunables for classification, redistribution and the signal pipeline.
//! Every field has a serde default so older config files keep loading.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use super::paths::AllowancePaths;
use crate::error::AllowanceError;
use crate::models::{Money, SpendingCategory, TierThresholdTable};

/// How the redistribution engine groups plan entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RedistributionScope {
    /// Transfers only between days of the same category
    #[default]
    PerCategory,
    /// All categories share one pool
    CrossCategory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    #[serde(default = "default_currency")]
    pub currency_symbol: String,

    /// Region used when a profile has none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_region: Option<String>,

    /// Fraction below a tier ceiling where blending starts
    #[serde(default = "default_transition_band")]
    pub transition_band: f64,

    /// Deficit on a single entry that triggers an automatic redistribution
    #[serde(default = "default_auto_threshold")]
    pub auto_redistribute_threshold: Money,

    #[serde(default)]
    pub redistribution_scope: RedistributionScope,

    /// Per-signal timeout in milliseconds
    #[serde(default = "default_signal_timeout_ms")]
    pub signal_timeout_ms: u64,

    /// Extra or replacement regional threshold tables
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub region_thresholds: Vec<TierThresholdTable>,

    /// Category share overrides in basis points (100 = 1%)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub category_goals: BTreeMap<SpendingCategory, u32>,

    #[serde(default)]
    pub setup_completed: bool,
}

fn default_schema_version() -> u32 {
    1
}

fn default_currency() -> String {
    "$".to_string()
}

fn default_transition_band() -> f64 {
    0.05
}

fn default_auto_threshold() -> Money {
    Money::from_dollars(10)
}

fn default_signal_timeout_ms() -> u64 {
    250
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            currency_symbol: default_currency(),
            default_region: None,
            transition_band: default_transition_band(),
            auto_redistribute_threshold: default_auto_threshold(),
            redistribution_scope: RedistributionScope::default(),
            signal_timeout_ms: default_signal_timeout_ms(),
            region_thresholds: Vec::new(),
            category_goals: BTreeMap::new(),
            setup_completed: false,
        }
    }
}

impl Settings {
    pub fn signal_timeout(&self) -> Duration {
        Duration::from_millis(self.signal_timeout_ms)
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<(), AllowanceError> {
        if !(0.0..0.5).contains(&self.transition_band) {
            return Err(AllowanceError::Config(format!(
                "transition_band must be in [0, 0.5), got {}",
                self.transition_band
            )));
        }
        if self.auto_redistribute_threshold.is_negative() {
            return Err(AllowanceError::Config(
                "auto_redistribute_threshold cannot be negative".into(),
            ));
        }
        for table in &self.region_thresholds {
            table
                .validate()
                .map_err(|e| AllowanceError::Config(e.to_string()))?;
        }
        let goal_total: u32 = self.category_goals.values().sum();
        if goal_total > 10_000 {
            return Err(AllowanceError::Config(format!(
                "category_goals add up to {} bps, more than 100%",
                goal_total
            )));
        }
        Ok(())
    }

    /// Load settings from disk, or return defaults if the file doesn't exist
    pub fn load_or_create(paths: &AllowancePaths) -> Result<Self, AllowanceError> {
        let settings_path = paths.settings_file();

        if settings_path.exists() {
            let contents = std::fs::read_to_string(&settings_path).map_err(|e| {
                AllowanceError::Io(format!("Failed to read settings file: {}", e))
            })?;

            let settings: Settings = serde_json::from_str(&contents).map_err(|e| {
                AllowanceError::Config(format!("Failed to parse settings file: {}", e))
            })?;

            settings.validate()?;
            Ok(settings)
        } else {
            // Don't save yet - let caller decide when to persist
            Ok(Settings::default())
        }
    }

    pub fn save(&self, paths: &AllowancePaths) -> Result<(), AllowanceError> {
        paths.ensure_directories()?;

        let contents = serde_json::to_string_pretty(self).map_err(|e| {
            AllowanceError::Config(format!("Failed to serialize settings: {}", e))
        })?;

        std::fs::write(paths.settings_file(), contents).map_err(|e| {
            AllowanceError::Io(format!("Failed to write settings file: {}", e))
        })?;

        Ok(())
    }
}
