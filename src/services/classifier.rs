//! Income classifier
//!
//! Maps a monthly income and optional region to one of five income tiers.
//! Thresholds are annual ceilings, so monthly income is annualized before
//! comparison. Incomes just below a ceiling are blended with the next tier
//! up so allocations change smoothly across the boundary.

use std::collections::BTreeMap;

use crate::config::Settings;
use crate::error::{AllowanceError, AllowanceResult};
use crate::models::{IncomeClassification, Money, TierThresholdTable};

/// Region used when none is given and none is configured
pub const NATIONAL_REGION: &str = "US";

/// Default blending band: the top 5% below each ceiling
pub const DEFAULT_TRANSITION_BAND: f64 = 0.05;

/// Reference annual ceilings (whole dollars) for low, lower-middle, middle
/// and upper-middle. Derived from regional median household income at
/// 50%, 75%, 150% and 225%.
const REFERENCE_TABLES: &[(&str, [i64; 4])] = &[
    (NATIONAL_REGION, [44_935, 67_402, 134_805, 202_207]),
    ("CA", [47_760, 71_640, 143_281, 214_922]),
    ("FL", [33_958, 50_937, 101_875, 152_813]),
    ("MA", [49_929, 74_893, 149_787, 224_680]),
    ("MS", [26_492, 39_738, 79_477, 119_216]),
    ("NY", [40_693, 61_039, 122_079, 183_118]),
    ("TX", [36_517, 54_776, 109_552, 164_328]),
    ("WA", [45_653, 68_479, 136_959, 205_438]),
];

/// Region-aware five-tier income classifier
#[derive(Debug, Clone)]
pub struct IncomeClassifier {
    tables: BTreeMap<String, TierThresholdTable>,
    default_region: String,
    transition_band: f64,
}

impl Default for IncomeClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl IncomeClassifier {
    /// Classifier over the built-in reference tables
    pub fn new() -> Self {
        let tables = REFERENCE_TABLES
            .iter()
            .filter_map(|(region, ceilings)| {
                TierThresholdTable::from_dollars(*region, *ceilings).ok()
            })
            .map(|table| (table.region.clone(), table))
            .collect();

        Self {
            tables,
            default_region: NATIONAL_REGION.to_string(),
            transition_band: DEFAULT_TRANSITION_BAND,
        }
    }

    /// Reference tables plus the user's overrides, band and default region
    pub fn from_settings(settings: &Settings) -> AllowanceResult<Self> {
        let mut classifier = Self::new().with_transition_band(settings.transition_band)?;
        for table in &settings.region_thresholds {
            classifier.register_table(table.clone())?;
        }
        if let Some(region) = &settings.default_region {
            classifier.default_region = region.trim().to_uppercase();
        }
        Ok(classifier)
    }

    pub fn with_transition_band(mut self, band: f64) -> AllowanceResult<Self> {
        if !(0.0..0.5).contains(&band) {
            return Err(AllowanceError::Config(format!(
                "transition band must be in [0, 0.5), got {}",
                band
            )));
        }
        self.transition_band = band;
        Ok(self)
    }

    /// Add or replace a region's table
    pub fn register_table(&mut self, table: TierThresholdTable) -> AllowanceResult<()> {
        table
            .validate()
            .map_err(|e| AllowanceError::Config(e.to_string()))?;
        self.tables.insert(table.region.clone(), table);
        Ok(())
    }

    pub fn regions(&self) -> Vec<&str> {
        self.tables.keys().map(String::as_str).collect()
    }

    pub fn table(&self, region: &str) -> Option<&TierThresholdTable> {
        self.tables.get(&region.trim().to_uppercase())
    }

    pub fn transition_band(&self) -> f64 {
        self.transition_band
    }

    /// Classify a monthly income
    pub fn classify(
        &self,
        monthly_income: Money,
        region: Option<&str>,
    ) -> AllowanceResult<IncomeClassification> {
        if monthly_income.is_negative() {
            return Err(AllowanceError::InvalidIncome(format!(
                "monthly income cannot be negative ({})",
                monthly_income
            )));
        }
        let annual = Money::from_cents(monthly_income.cents().saturating_mul(12));
        self.classify_annual(annual, region)
    }

    /// Classify an annual income against the region's ceilings
    pub fn classify_annual(
        &self,
        annual_income: Money,
        region: Option<&str>,
    ) -> AllowanceResult<IncomeClassification> {
        if annual_income.is_negative() {
            return Err(AllowanceError::InvalidIncome(format!(
                "annual income cannot be negative ({})",
                annual_income
            )));
        }

        let (table, region_fallback) = self.resolve_table(region)?;
        let tier = table.tier_for(annual_income);
        let mut classification =
            IncomeClassification::single(tier, table.region.clone(), annual_income);
        classification.region_fallback = region_fallback;

        if let (Some(ceiling), Some(next)) = (table.ceiling_of(tier), tier.next()) {
            let band_start = ceiling.scale(1.0 - self.transition_band);
            if annual_income > band_start && ceiling > band_start {
                // Weight shifts linearly from 1.0 at the band start to 0.0 at the ceiling,
                // meeting the next tier's unblended weight just above it
                let into_band = (annual_income - band_start).as_decimal()
                    / (ceiling - band_start).as_decimal();
                let distance = into_band.clamp(0.0, 1.0);

                classification.secondary_tier = Some(next);
                classification.primary_weight = 1.0 - distance;
                classification.secondary_weight = distance;
                classification.in_transition = true;
            }
        }

        tracing::debug!(
            region = %classification.region,
            tier = %classification.primary_tier,
            in_transition = classification.in_transition,
            "Income classified"
        );

        Ok(classification)
    }

    /// Requested region's table, or the default table with the fallback flag set
    fn resolve_table(&self, region: Option<&str>) -> AllowanceResult<(&TierThresholdTable, bool)> {
        let requested = region
            .map(|r| r.trim().to_uppercase())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| self.default_region.clone());

        if let Some(table) = self.tables.get(&requested) {
            return Ok((table, false));
        }

        let unknown = AllowanceError::UnknownRegion(requested);
        tracing::warn!(error = %unknown, fallback = NATIONAL_REGION, "Using national thresholds");

        self.tables
            .get(NATIONAL_REGION)
            .map(|table| (table, true))
            .ok_or(unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IncomeTier;
    use crate::services::allocator::blended_ratio;

    fn annual(dollars: i64) -> Money {
        Money::from_dollars(dollars)
    }

    #[test]
    fn test_boundary_resolves_to_lower_tier() {
        let classifier = IncomeClassifier::new();

        let at = classifier.classify_annual(annual(44_935), None).unwrap();
        assert_eq!(at.primary_tier, IncomeTier::Low);

        let above = classifier.classify_annual(annual(44_936), None).unwrap();
        assert_eq!(above.primary_tier, IncomeTier::LowerMiddle);
    }

    #[test]
    fn test_monotonic_tiers() {
        let classifier = IncomeClassifier::new();
        let mut previous = IncomeTier::Low;
        for dollars in (0..400_000).step_by(2_500) {
            let tier = classifier
                .classify_annual(annual(dollars), Some("CA"))
                .unwrap()
                .primary_tier;
            assert!(tier >= previous, "tier dropped at {}", dollars);
            previous = tier;
        }
        assert_eq!(previous, IncomeTier::High);
    }

    #[test]
    fn test_monthly_income_is_annualized() {
        let classifier = IncomeClassifier::new();
        // $3,000/month = $36,000/year: low nationally, well clear of the band
        let result = classifier.classify(Money::from_dollars(3_000), None).unwrap();
        assert_eq!(result.primary_tier, IncomeTier::Low);
        assert_eq!(result.annual_income, annual(36_000));
        assert!(!result.in_transition);
        assert_eq!(result.primary_weight, 1.0);
        assert_eq!(result.secondary_tier, None);
    }

    #[test]
    fn test_blend_inside_band() {
        let classifier = IncomeClassifier::new();
        // Low ceiling 44,935; band starts at 42,688.25
        let result = classifier.classify_annual(annual(44_000), None).unwrap();

        assert_eq!(result.primary_tier, IncomeTier::Low);
        assert_eq!(result.secondary_tier, Some(IncomeTier::LowerMiddle));
        assert!(result.in_transition);
        assert!(result.primary_weight > 0.0 && result.primary_weight < 1.0);
        assert!((result.primary_weight + result.secondary_weight - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_weight_decreases_toward_ceiling() {
        let classifier = IncomeClassifier::new();
        let near = classifier.classify_annual(annual(43_000), None).unwrap();
        let nearer = classifier.classify_annual(annual(44_900), None).unwrap();
        assert!(nearer.primary_weight < near.primary_weight);

        let at = classifier.classify_annual(annual(44_935), None).unwrap();
        assert!(at.primary_weight.abs() < 1e-9);
        assert!((at.secondary_weight - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_flexible_ratio_is_continuous_across_ceiling() {
        let classifier = IncomeClassifier::new();
        for (region, ceilings) in REFERENCE_TABLES {
            for ceiling in ceilings {
                let at = classifier
                    .classify_annual(annual(*ceiling), Some(*region))
                    .unwrap();
                let above = classifier
                    .classify_annual(annual(ceiling + 1), Some(*region))
                    .unwrap();
                assert_ne!(at.primary_tier, above.primary_tier);
                assert!(
                    (blended_ratio(&at) - blended_ratio(&above)).abs() < 1e-9,
                    "ratio jumps at {} {}",
                    region,
                    ceiling
                );
            }
        }
    }

    #[test]
    fn test_high_tier_never_blends() {
        let classifier = IncomeClassifier::new();
        let result = classifier.classify_annual(annual(500_000), None).unwrap();
        assert_eq!(result.primary_tier, IncomeTier::High);
        assert!(!result.in_transition);
    }

    #[test]
    fn test_zero_band_disables_blending() {
        let classifier = IncomeClassifier::new().with_transition_band(0.0).unwrap();
        let result = classifier.classify_annual(annual(44_900), None).unwrap();
        assert!(!result.in_transition);
    }

    #[test]
    fn test_negative_income_rejected() {
        let classifier = IncomeClassifier::new();
        let err = classifier.classify(Money::from_cents(-1), None).unwrap_err();
        assert!(matches!(err, AllowanceError::InvalidIncome(_)));
    }

    #[test]
    fn test_unknown_region_falls_back() {
        let classifier = IncomeClassifier::new();
        let result = classifier
            .classify(Money::from_dollars(3_000), Some("zz"))
            .unwrap();
        assert!(result.region_fallback);
        assert_eq!(result.region, NATIONAL_REGION);
    }

    #[test]
    fn test_region_lookup_is_case_insensitive() {
        let classifier = IncomeClassifier::new();
        let result = classifier
            .classify_annual(annual(30_000), Some(" ms "))
            .unwrap();
        assert_eq!(result.region, "MS");
        assert_eq!(result.primary_tier, IncomeTier::LowerMiddle);
        assert!(!result.region_fallback);
    }

    #[test]
    fn test_settings_override_table() {
        let mut settings = Settings::default();
        settings.region_thresholds =
            vec![TierThresholdTable::from_dollars("XY", [10_000, 20_000, 30_000, 40_000]).unwrap()];
        settings.default_region = Some("xy".into());

        let classifier = IncomeClassifier::from_settings(&settings).unwrap();
        let result = classifier.classify_annual(annual(25_000), None).unwrap();
        assert_eq!(result.region, "XY");
        assert_eq!(result.primary_tier, IncomeTier::Middle);
    }
}
