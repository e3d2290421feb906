//! Calendar allocator
//!
//! Turns an income classification into a month of daily plan entries:
//! flexible budget from the tier ratio, split across the real days of the
//! month, then across categories by the band's mix.

use std::collections::BTreeMap;

use chrono::Utc;

use crate::config::Settings;
use crate::error::{AllowanceError, AllowanceResult};
use crate::models::plan::FULL_SHARE_BPS;
use crate::models::{
    BillingMonth, BudgetState, CategoryBand, CategoryMix, DailyPlanEntry, IncomeClassification,
    IncomeTier, Money, MonthlyBudget, SpendingCategory, UserId,
};

/// Share of income available for day-to-day spending, per tier
pub fn flexible_ratio(tier: IncomeTier) -> f64 {
    match tier {
        IncomeTier::Low => 0.35,
        IncomeTier::LowerMiddle => 0.40,
        IncomeTier::Middle => 0.45,
        IncomeTier::UpperMiddle => 0.50,
        IncomeTier::High => 0.55,
    }
}

/// Weighted average of the classification's tier ratios
pub fn blended_ratio(classification: &IncomeClassification) -> f64 {
    classification
        .weighted_tiers()
        .iter()
        .map(|(tier, weight)| flexible_ratio(*tier) * weight)
        .sum()
}

/// Reference category shares for a band, in basis points
fn band_mix(band: CategoryBand) -> [(SpendingCategory, u32); 6] {
    use SpendingCategory::*;
    match band {
        CategoryBand::Low => [
            (Groceries, 4000),
            (Dining, 1000),
            (Transport, 2000),
            (Entertainment, 800),
            (Shopping, 1000),
            (Personal, 1200),
        ],
        CategoryBand::Middle => [
            (Groceries, 3000),
            (Dining, 1800),
            (Transport, 1700),
            (Entertainment, 1200),
            (Shopping, 1300),
            (Personal, 1000),
        ],
        CategoryBand::High => [
            (Groceries, 2200),
            (Dining, 2300),
            (Transport, 1400),
            (Entertainment, 1600),
            (Shopping, 1700),
            (Personal, 800),
        ],
    }
}

/// Builds baseline monthly plans
#[derive(Debug, Clone, Default)]
pub struct CalendarAllocator {
    /// Category share overrides in basis points
    goals: BTreeMap<SpendingCategory, u32>,
}

impl CalendarAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_goals(goals: BTreeMap<SpendingCategory, u32>) -> AllowanceResult<Self> {
        let total: u32 = goals.values().sum();
        if total > FULL_SHARE_BPS {
            return Err(AllowanceError::Validation(format!(
                "category goals total {} bps, more than 100%",
                total
            )));
        }
        if goals.len() == SpendingCategory::ALL.len() && total != FULL_SHARE_BPS {
            return Err(AllowanceError::Validation(
                "category goals must total 100% when every category is set".into(),
            ));
        }
        Ok(Self { goals })
    }

    pub fn from_settings(settings: &Settings) -> AllowanceResult<Self> {
        Self::with_goals(settings.category_goals.clone())
    }

    /// Category mix for a tier with goal overrides applied.
    ///
    /// Overridden categories take their goal share; the rest split what is
    /// left in proportion to the band's reference shares.
    pub fn category_mix(&self, tier: IncomeTier) -> CategoryMix {
        let reference = band_mix(tier.band());
        if self.goals.is_empty() {
            return CategoryMix::from_bps(reference);
        }

        let fixed: u32 = self.goals.values().sum();
        let free: Vec<(SpendingCategory, u32)> = reference
            .iter()
            .filter(|(c, _)| !self.goals.contains_key(c))
            .copied()
            .collect();

        let weights: Vec<i64> = free.iter().map(|(_, bps)| i64::from(*bps)).collect();
        // Same largest-remainder split used for cents
        let rescaled = Money::from_cents(i64::from(FULL_SHARE_BPS - fixed)).apportion(&weights);

        let shares = free
            .iter()
            .zip(rescaled)
            .map(|((category, _), share)| (*category, share.cents() as u32))
            .chain(self.goals.iter().map(|(c, bps)| (*c, *bps)));

        CategoryMix::from_bps(shares)
    }

    /// Build a draft budget with one entry per (day, category)
    pub fn allocate(
        &self,
        user_id: &UserId,
        month: BillingMonth,
        monthly_income: Money,
        classification: &IncomeClassification,
    ) -> AllowanceResult<MonthlyBudget> {
        if monthly_income.is_negative() {
            return Err(AllowanceError::InvalidIncome(format!(
                "monthly income cannot be negative ({})",
                monthly_income
            )));
        }

        let ratio = blended_ratio(classification);
        let monthly_flexible_budget = monthly_income.scale(ratio);
        let category_mix = self.category_mix(classification.primary_tier);

        let categories: Vec<(SpendingCategory, i64)> = category_mix
            .iter()
            .map(|(c, bps)| (c, i64::from(bps)))
            .collect();
        let weights: Vec<i64> = categories.iter().map(|(_, w)| *w).collect();

        let days: Vec<_> = month.days().collect();
        let daily = monthly_flexible_budget.split_evenly(days.len());

        let mut entries = Vec::with_capacity(days.len() * categories.len());
        for (date, day_amount) in days.iter().zip(daily) {
            let split = day_amount.apportion(&weights);
            for ((category, _), planned) in categories.iter().zip(split) {
                entries.push(DailyPlanEntry::new(*date, *category, planned));
            }
        }

        tracing::debug!(
            user = %user_id,
            month = %month,
            ratio,
            budget = %monthly_flexible_budget,
            "Allocated monthly plan"
        );

        let now = Utc::now();
        Ok(MonthlyBudget {
            user_id: user_id.clone(),
            month,
            state: BudgetState::Draft,
            monthly_income,
            classification: classification.clone(),
            flexible_ratio: ratio,
            monthly_flexible_budget,
            category_mix,
            entries,
            redistribution_started_at: None,
            created_at: now,
            updated_at: now,
            closed_at: None,
        })
    }
}

/// Even share of a month's flexible budget for one day (first-day rounding)
pub fn daily_baseline(monthly_flexible_budget: Money, month: BillingMonth) -> Money {
    monthly_flexible_budget
        .split_evenly(month.days_in_month() as usize)
        .first()
        .copied()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn middle(income_annual: i64) -> IncomeClassification {
        IncomeClassification::single(
            IncomeTier::Middle,
            "US".into(),
            Money::from_dollars(income_annual),
        )
    }

    fn user() -> UserId {
        UserId::parse("alice").unwrap()
    }

    #[test]
    fn test_ratios_strictly_increase() {
        let ratios: Vec<f64> = IncomeTier::ALL.iter().map(|t| flexible_ratio(*t)).collect();
        assert!(ratios.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_band_mixes_are_whole() {
        for band in [CategoryBand::Low, CategoryBand::Middle, CategoryBand::High] {
            let total: u32 = band_mix(band).iter().map(|(_, bps)| bps).sum();
            assert_eq!(total, FULL_SHARE_BPS);
        }
    }

    #[test]
    fn test_five_thousand_middle_thirty_days() {
        let allocator = CalendarAllocator::new();
        let month = BillingMonth::new(2025, 4).unwrap(); // 30 days

        let budget = allocator
            .allocate(&user(), month, Money::from_dollars(5_000), &middle(60_000))
            .unwrap();

        assert_eq!(budget.monthly_flexible_budget, Money::from_dollars(2_250));
        assert_eq!(daily_baseline(budget.monthly_flexible_budget, month), Money::from_dollars(75));
        assert_eq!(budget.planned_for(month.start_date()), Money::from_dollars(75));
        assert_eq!(budget.entries.len(), 30 * 6);
        assert_eq!(budget.state, BudgetState::Draft);
        assert!(budget.validate().is_ok());
    }

    #[test]
    fn test_remainder_cents_go_to_earliest_days() {
        let allocator = CalendarAllocator::new();
        let month = BillingMonth::new(2025, 1).unwrap(); // 31 days
        let budget = allocator
            .allocate(&user(), month, Money::from_cents(100_000), &middle(12_000))
            .unwrap();

        // 45,000 cents over 31 days: 1451 each with 19 days getting one more
        assert_eq!(budget.total_planned(), Money::from_cents(45_000));
        assert_eq!(budget.planned_for(month.start_date()), Money::from_cents(1_452));
        assert_eq!(budget.planned_for(month.end_date()), Money::from_cents(1_451));
    }

    #[test]
    fn test_blended_ratio_is_weighted() {
        let mut classification = middle(60_000);
        classification.secondary_tier = Some(IncomeTier::UpperMiddle);
        classification.primary_weight = 0.75;
        classification.secondary_weight = 0.25;
        classification.in_transition = true;

        let ratio = blended_ratio(&classification);
        assert!((ratio - (0.45 * 0.75 + 0.50 * 0.25)).abs() < 1e-12);
    }

    #[test]
    fn test_goal_override_rescales_others() {
        let goals = BTreeMap::from([(SpendingCategory::Groceries, 5000)]);
        let allocator = CalendarAllocator::with_goals(goals).unwrap();
        let mix = allocator.category_mix(IncomeTier::Middle);

        assert_eq!(mix.bps(SpendingCategory::Groceries), 5000);
        assert_eq!(mix.total_bps(), FULL_SHARE_BPS);
        // Dining keeps its relative weight among the free categories: 1800/7000 of 5000
        assert_eq!(mix.bps(SpendingCategory::Dining), 1286);
    }

    #[test]
    fn test_goals_over_one_hundred_percent_rejected() {
        let goals = BTreeMap::from([
            (SpendingCategory::Groceries, 6000),
            (SpendingCategory::Dining, 5000),
        ]);
        assert!(CalendarAllocator::with_goals(goals).is_err());
    }

    #[test]
    fn test_every_tier_mix_sums_to_one() {
        let allocator = CalendarAllocator::new();
        for tier in IncomeTier::ALL {
            let mix = allocator.category_mix(tier);
            let total: f64 = SpendingCategory::ALL.iter().map(|c| mix.percentage(*c)).sum();
            assert!((total - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_zero_income_gives_zero_plan() {
        let allocator = CalendarAllocator::new();
        let month = BillingMonth::new(2024, 2).unwrap();
        let budget = allocator
            .allocate(&user(), month, Money::zero(), &middle(0))
            .unwrap();
        assert_eq!(budget.entries.len(), 29 * 6);
        assert!(budget.total_planned().is_zero());
    }
}
