//! User financial profile
//!
//! Profiles are never deleted. Changing income or region appends a new
//! version and stamps the previous one as superseded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::UserId;
use super::money::Money;
use super::tier::{IncomeClassification, IncomeTier};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserFinancialProfile {
    pub user_id: UserId,
    pub monthly_income: Money,
    /// Region/state code; None uses the default table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub income_tier: IncomeTier,
    /// (primary, secondary) weights when near a tier boundary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition_weights: Option<TransitionWeights>,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superseded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransitionWeights {
    pub secondary_tier: IncomeTier,
    pub primary_weight: f64,
    pub secondary_weight: f64,
}

impl UserFinancialProfile {
    /// Build a profile from an already computed classification
    pub fn new(
        user_id: UserId,
        monthly_income: Money,
        region: Option<String>,
        classification: &IncomeClassification,
    ) -> Self {
        Self {
            user_id,
            monthly_income,
            region: region.map(|r| r.trim().to_uppercase()),
            income_tier: classification.primary_tier,
            transition_weights: transition_weights(classification),
            version: 1,
            created_at: Utc::now(),
            superseded_at: None,
        }
    }

    /// Next version of this profile carrying the new figures
    pub fn supersede_with(
        &self,
        monthly_income: Money,
        region: Option<String>,
        classification: &IncomeClassification,
    ) -> Self {
        let mut next = Self::new(self.user_id.clone(), monthly_income, region, classification);
        next.version = self.version + 1;
        next
    }

    pub fn is_current(&self) -> bool {
        self.superseded_at.is_none()
    }

    pub fn validate(&self) -> Result<(), ProfileValidationError> {
        if self.monthly_income.is_negative() {
            return Err(ProfileValidationError::NegativeIncome);
        }
        Ok(())
    }
}

fn transition_weights(classification: &IncomeClassification) -> Option<TransitionWeights> {
    classification
        .secondary_tier
        .map(|secondary_tier| TransitionWeights {
            secondary_tier,
            primary_weight: classification.primary_weight,
            secondary_weight: classification.secondary_weight,
        })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileValidationError {
    NegativeIncome,
}

impl std::fmt::Display for ProfileValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NegativeIncome => write!(f, "Monthly income cannot be negative"),
        }
    }
}

impl std::error::Error for ProfileValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn classification(tier: IncomeTier) -> IncomeClassification {
        IncomeClassification::single(tier, "US".into(), Money::from_dollars(60_000))
    }

    #[test]
    fn test_new_profile_normalizes_region() {
        let profile = UserFinancialProfile::new(
            UserId::parse("alice").unwrap(),
            Money::from_dollars(5000),
            Some(" ca ".into()),
            &classification(IncomeTier::Middle),
        );
        assert_eq!(profile.region.as_deref(), Some("CA"));
        assert_eq!(profile.version, 1);
        assert!(profile.transition_weights.is_none());
        assert!(profile.is_current());
    }

    #[test]
    fn test_supersede_bumps_version() {
        let profile = UserFinancialProfile::new(
            UserId::parse("alice").unwrap(),
            Money::from_dollars(5000),
            None,
            &classification(IncomeTier::Middle),
        );
        let mut blended = classification(IncomeTier::Middle);
        blended.secondary_tier = Some(IncomeTier::UpperMiddle);
        blended.primary_weight = 0.6;
        blended.secondary_weight = 0.4;

        let next = profile.supersede_with(Money::from_dollars(9000), None, &blended);
        assert_eq!(next.version, 2);
        assert_eq!(
            next.transition_weights.map(|w| w.secondary_tier),
            Some(IncomeTier::UpperMiddle)
        );
    }

    #[test]
    fn test_negative_income_invalid() {
        let mut profile = UserFinancialProfile::new(
            UserId::parse("bob").unwrap(),
            Money::from_dollars(100),
            None,
            &classification(IncomeTier::Low),
        );
        profile.monthly_income = Money::from_cents(-1);
        assert_eq!(profile.validate(), Err(ProfileValidationError::NegativeIncome));
    }
}
