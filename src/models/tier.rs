//! Income tiers and regional threshold tables

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::money::Money;

/// One of five ordered income bands within a region
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IncomeTier {
    Low,
    LowerMiddle,
    Middle,
    UpperMiddle,
    High,
}

impl IncomeTier {
    /// All tiers, lowest first
    pub const ALL: [IncomeTier; 5] = [
        Self::Low,
        Self::LowerMiddle,
        Self::Middle,
        Self::UpperMiddle,
        Self::High,
    ];

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// The tier above this one, if any
    pub fn next(&self) -> Option<Self> {
        Self::from_index(self.index() + 1)
    }

    /// Category-mix band: the outer pairs share a table
    pub fn band(&self) -> CategoryBand {
        match self {
            Self::Low | Self::LowerMiddle => CategoryBand::Low,
            Self::Middle => CategoryBand::Middle,
            Self::UpperMiddle | Self::High => CategoryBand::High,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::LowerMiddle => "lower-middle",
            Self::Middle => "middle",
            Self::UpperMiddle => "upper-middle",
            Self::High => "high",
        }
    }
}

impl fmt::Display for IncomeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IncomeTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['_', ' '], "-");
        Self::ALL
            .iter()
            .find(|t| t.as_str() == normalized)
            .copied()
            .ok_or_else(|| format!("Unknown income tier: {}", s))
    }
}

/// Category-mix lookup key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryBand {
    Low,
    Middle,
    High,
}

/// Annual income ceilings for one region.
///
/// `ceilings[i]` is the inclusive upper bound of tier `i` for the four lower
/// tiers; `High` is open-ended. Ceilings are strictly increasing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierThresholdTable {
    pub region: String,
    pub ceilings: [Money; 4],
}

impl TierThresholdTable {
    /// Build a table, rejecting non-positive or non-increasing ceilings
    pub fn new(
        region: impl Into<String>,
        ceilings: [Money; 4],
    ) -> Result<Self, ThresholdValidationError> {
        let table = Self {
            region: region.into().trim().to_uppercase(),
            ceilings,
        };
        table.validate()?;
        Ok(table)
    }

    /// Build from whole-dollar ceilings
    pub fn from_dollars(
        region: impl Into<String>,
        dollars: [i64; 4],
    ) -> Result<Self, ThresholdValidationError> {
        Self::new(region, dollars.map(Money::from_dollars))
    }

    pub fn validate(&self) -> Result<(), ThresholdValidationError> {
        if self.region.is_empty() {
            return Err(ThresholdValidationError::EmptyRegion);
        }
        if !self.ceilings[0].is_positive() {
            return Err(ThresholdValidationError::NonPositive(self.region.clone()));
        }
        if self.ceilings.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ThresholdValidationError::NotIncreasing(self.region.clone()));
        }
        Ok(())
    }

    /// Tier whose inclusive ceiling contains `annual_income`
    pub fn tier_for(&self, annual_income: Money) -> IncomeTier {
        self.ceilings
            .iter()
            .position(|ceiling| annual_income <= *ceiling)
            .and_then(IncomeTier::from_index)
            .unwrap_or(IncomeTier::High)
    }

    /// Ceiling of `tier`, i.e. the boundary to the next tier up
    pub fn ceiling_of(&self, tier: IncomeTier) -> Option<Money> {
        self.ceilings.get(tier.index()).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThresholdValidationError {
    EmptyRegion,
    NonPositive(String),
    NotIncreasing(String),
}

impl fmt::Display for ThresholdValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyRegion => write!(f, "Threshold table needs a region code"),
            Self::NonPositive(r) => write!(f, "Thresholds for {} must be positive", r),
            Self::NotIncreasing(r) => {
                write!(f, "Thresholds for {} must be strictly increasing", r)
            }
        }
    }
}

impl std::error::Error for ThresholdValidationError {}

/// Result of classifying an income
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeClassification {
    pub primary_tier: IncomeTier,
    pub secondary_tier: Option<IncomeTier>,
    pub primary_weight: f64,
    pub secondary_weight: f64,
    pub in_transition: bool,
    /// Region whose table was applied
    pub region: String,
    /// True when the requested region was unknown and the default table was used
    pub region_fallback: bool,
    pub annual_income: Money,
}

impl IncomeClassification {
    /// Unblended classification
    pub fn single(tier: IncomeTier, region: String, annual_income: Money) -> Self {
        Self {
            primary_tier: tier,
            secondary_tier: None,
            primary_weight: 1.0,
            secondary_weight: 0.0,
            in_transition: false,
            region,
            region_fallback: false,
            annual_income,
        }
    }

    /// (tier, weight) pairs with non-zero weight
    pub fn weighted_tiers(&self) -> Vec<(IncomeTier, f64)> {
        let mut tiers = vec![(self.primary_tier, self.primary_weight)];
        if let Some(secondary) = self.secondary_tier {
            tiers.push((secondary, self.secondary_weight));
        }
        tiers
    }
}
