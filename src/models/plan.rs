//! Monthly budget and daily plan entries
//!
//! A `MonthlyBudget` owns one `DailyPlanEntry` per (day, category). The sum of
//! planned amounts always equals the month's flexible budget, to the cent.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::category::SpendingCategory;
use super::ids::UserId;
use super::money::Money;
use super::period::BillingMonth;
use super::tier::IncomeClassification;

/// Basis points that make up 100%
pub const FULL_SHARE_BPS: u32 = 10_000;

/// The atomic unit of budget: planned vs spent for one category on one date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyPlanEntry {
    pub date: NaiveDate,
    pub category: SpendingCategory,
    pub planned_amount: Money,
    pub spent_amount: Money,
    /// Allocator's original figure; never changed after generation
    pub baseline_amount: Money,
    /// Bumped on every persisted write
    #[serde(default)]
    pub version: u64,
}

impl DailyPlanEntry {
    pub fn new(date: NaiveDate, category: SpendingCategory, planned: Money) -> Self {
        Self {
            date,
            category,
            planned_amount: planned,
            spent_amount: Money::zero(),
            baseline_amount: planned,
            version: 0,
        }
    }

    /// Unspent allowance (zero when overspent)
    pub fn surplus(&self) -> Money {
        (self.planned_amount - self.spent_amount).max_zero()
    }

    /// Overspend beyond the plan (zero when within plan)
    pub fn deficit(&self) -> Money {
        (self.spent_amount - self.planned_amount).max_zero()
    }

    /// Planned minus spent; negative when overspent
    pub fn available(&self) -> Money {
        self.planned_amount - self.spent_amount
    }

    pub fn key(&self) -> (NaiveDate, SpendingCategory) {
        (self.date, self.category)
    }
}

/// Lifecycle of a monthly budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BudgetState {
    /// Allocation computed, not yet persisted
    #[default]
    Draft,
    /// Persisted and accepting transactions
    Active,
    /// Redistribution in flight
    Redistributing,
    /// Month ended; read-only
    Closed,
}

impl BudgetState {
    pub fn can_transition_to(&self, next: BudgetState) -> bool {
        matches!(
            (self, next),
            (Self::Draft, Self::Active)
                | (Self::Active, Self::Redistributing)
                | (Self::Redistributing, Self::Active)
                | (Self::Active, Self::Closed)
        )
    }
}

impl fmt::Display for BudgetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Draft => write!(f, "Draft"),
            Self::Active => write!(f, "Active"),
            Self::Redistributing => write!(f, "Redistributing"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

/// Category → share of the flexible budget, in basis points
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct CategoryMix(BTreeMap<SpendingCategory, u32>);

impl CategoryMix {
    pub fn from_bps(shares: impl IntoIterator<Item = (SpendingCategory, u32)>) -> Self {
        Self(shares.into_iter().collect())
    }

    pub fn bps(&self, category: SpendingCategory) -> u32 {
        self.0.get(&category).copied().unwrap_or(0)
    }

    /// Share as a fraction of 1.0
    pub fn percentage(&self, category: SpendingCategory) -> f64 {
        self.bps(category) as f64 / FULL_SHARE_BPS as f64
    }

    pub fn total_bps(&self) -> u32 {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SpendingCategory, u32)> + '_ {
        self.0.iter().map(|(c, b)| (*c, *b))
    }

    pub fn categories(&self) -> Vec<SpendingCategory> {
        self.0.keys().copied().collect()
    }
}

/// A user's plan for one billing month
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyBudget {
    pub user_id: UserId,
    pub month: BillingMonth,
    #[serde(default)]
    pub state: BudgetState,
    pub monthly_income: Money,
    pub classification: IncomeClassification,
    pub flexible_ratio: f64,
    pub monthly_flexible_budget: Money,
    pub category_mix: CategoryMix,
    pub entries: Vec<DailyPlanEntry>,
    /// Set while a redistribution holds the budget
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redistribution_started_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
}

impl MonthlyBudget {
    /// Storage key string ("alice:2025-01")
    pub fn key(&self) -> String {
        budget_key(&self.user_id, self.month)
    }

    pub fn total_planned(&self) -> Money {
        self.entries.iter().map(|e| e.planned_amount).sum()
    }

    pub fn total_spent(&self) -> Money {
        self.entries.iter().map(|e| e.spent_amount).sum()
    }

    pub fn entry(&self, date: NaiveDate, category: SpendingCategory) -> Option<&DailyPlanEntry> {
        self.entries
            .iter()
            .find(|e| e.date == date && e.category == category)
    }

    pub fn entry_mut(
        &mut self,
        date: NaiveDate,
        category: SpendingCategory,
    ) -> Option<&mut DailyPlanEntry> {
        self.entries
            .iter_mut()
            .find(|e| e.date == date && e.category == category)
    }

    /// All category entries for one date
    pub fn entries_for(&self, date: NaiveDate) -> impl Iterator<Item = &DailyPlanEntry> {
        self.entries.iter().filter(move |e| e.date == date)
    }

    pub fn planned_for(&self, date: NaiveDate) -> Money {
        self.entries_for(date).map(|e| e.planned_amount).sum()
    }

    pub fn spent_for(&self, date: NaiveDate) -> Money {
        self.entries_for(date).map(|e| e.spent_amount).sum()
    }

    /// Planned and spent on days strictly before `date`
    pub fn to_date_totals(&self, date: NaiveDate) -> (Money, Money) {
        self.entries
            .iter()
            .filter(|e| e.date < date)
            .fold((Money::zero(), Money::zero()), |(p, s), e| {
                (p + e.planned_amount, s + e.spent_amount)
            })
    }

    /// Largest single-entry deficit on or after `today`
    pub fn max_remaining_deficit(&self, today: NaiveDate) -> Money {
        self.entries
            .iter()
            .filter(|e| e.date >= today)
            .map(|e| e.deficit())
            .max()
            .unwrap_or_default()
    }

    /// Dates on or after `today` where spending exceeds the plan
    pub fn overspent_days(&self, today: NaiveDate) -> Vec<NaiveDate> {
        let mut days: Vec<NaiveDate> = self
            .entries
            .iter()
            .filter(|e| e.date >= today && e.deficit().is_positive())
            .map(|e| e.date)
            .collect();
        days.dedup();
        days
    }

    /// Check the month-wide invariants
    pub fn validate(&self) -> Result<(), BudgetValidationError> {
        if let Some(entry) = self.entries.iter().find(|e| e.planned_amount.is_negative()) {
            return Err(BudgetValidationError::NegativePlanned(entry.date));
        }
        let total = self.total_planned();
        if total != self.monthly_flexible_budget {
            return Err(BudgetValidationError::TotalMismatch {
                expected: self.monthly_flexible_budget,
                actual: total,
            });
        }
        if self.category_mix.total_bps() != FULL_SHARE_BPS {
            return Err(BudgetValidationError::MixNotWhole(
                self.category_mix.total_bps(),
            ));
        }
        Ok(())
    }

    /// Move to `next`, enforcing the lifecycle
    pub fn transition_to(&mut self, next: BudgetState) -> Result<(), BudgetStateError> {
        if !self.state.can_transition_to(next) {
            return Err(BudgetStateError {
                from: self.state,
                to: next,
            });
        }
        let now = Utc::now();
        match next {
            BudgetState::Redistributing => self.redistribution_started_at = Some(now),
            BudgetState::Active => self.redistribution_started_at = None,
            BudgetState::Closed => self.closed_at = Some(now),
            BudgetState::Draft => {}
        }
        self.state = next;
        self.updated_at = now;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.state == BudgetState::Closed
    }
}

/// Storage key for a user's month
pub fn budget_key(user_id: &UserId, month: BillingMonth) -> String {
    format!("{}:{}", user_id, month)
}

impl fmt::Display for MonthlyBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{}] planned: {} spent: {}",
            self.user_id,
            self.month,
            self.state,
            self.total_planned(),
            self.total_spent()
        )
    }
}

/// Rejected lifecycle transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetStateError {
    pub from: BudgetState,
    pub to: BudgetState,
}

impl fmt::Display for BudgetStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cannot move budget from {} to {}", self.from, self.to)
    }
}

impl std::error::Error for BudgetStateError {}

/// Validation errors for monthly budgets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BudgetValidationError {
    NegativePlanned(NaiveDate),
    TotalMismatch { expected: Money, actual: Money },
    MixNotWhole(u32),
}

impl fmt::Display for BudgetValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NegativePlanned(date) => {
                write!(f, "Planned amount on {} is negative", date)
            }
            Self::TotalMismatch { expected, actual } => write!(
                f,
                "Planned total {} does not match flexible budget {}",
                actual, expected
            ),
            Self::MixNotWhole(bps) => {
                write!(f, "Category shares sum to {} bps, expected 10000", bps)
            }
        }
    }
}

impl std::error::Error for BudgetValidationError {}
