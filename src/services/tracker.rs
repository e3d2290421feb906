//! Spend tracker
//!
//! Applies a transaction to the matching plan entry and records it in the
//! user's history. Entry writes are optimistic: when another writer bumped
//! the entry first, the tracker reloads and tries again.

use chrono::NaiveDate;

use crate::config::Settings;
use crate::error::{AllowanceError, AllowanceResult};
use crate::models::{BillingMonth, DailyPlanEntry, Money, SpendingCategory, Transaction};
use crate::storage::BudgetStore;

/// Attempts at writing one entry before giving up
pub const MAX_WRITE_ATTEMPTS: usize = 3;

/// What recording one transaction changed
#[derive(Debug, Clone)]
pub struct SpendRecord {
    pub transaction: Transaction,
    /// Entry as written, when the transaction landed on a plan
    pub entry: Option<DailyPlanEntry>,
    /// A remaining day now overspends by more than the threshold
    pub threshold_breached: bool,
}

pub struct SpendTracker<'a> {
    store: &'a dyn BudgetStore,
    threshold: Money,
}

impl<'a> SpendTracker<'a> {
    pub fn new(store: &'a dyn BudgetStore, threshold: Money) -> Self {
        Self { store, threshold }
    }

    pub fn from_settings(store: &'a dyn BudgetStore, settings: &Settings) -> Self {
        Self::new(store, settings.auto_redistribute_threshold)
    }

    /// Record a transaction and apply it to the plan for its date
    pub fn record(&self, txn: Transaction, today: NaiveDate) -> AllowanceResult<SpendRecord> {
        let month = BillingMonth::containing(txn.date);
        let entry = match txn.category {
            Some(category) => self.apply_to_plan(&txn, month, category)?,
            None => None,
        };

        self.store.record_transaction(&txn)?;

        let threshold_breached = entry
            .as_ref()
            .is_some_and(|e| e.date >= today && e.deficit() > self.threshold);

        tracing::info!(
            user = %txn.user_id,
            date = %txn.date,
            amount = %txn.amount,
            planned = entry.is_some(),
            threshold_breached,
            "Transaction recorded"
        );

        Ok(SpendRecord {
            transaction: txn,
            entry,
            threshold_breached,
        })
    }

    fn apply_to_plan(
        &self,
        txn: &Transaction,
        month: BillingMonth,
        category: SpendingCategory,
    ) -> AllowanceResult<Option<DailyPlanEntry>> {
        let mut last_conflict = None;

        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let Some(budget) = self.store.load_monthly_budget(&txn.user_id, month)? else {
                return Ok(None);
            };
            if budget.is_closed() {
                return Err(AllowanceError::MonthClosed(month.to_string()));
            }
            let Some(current) = budget.entry(txn.date, category) else {
                return Ok(None);
            };

            let mut updated = current.clone();
            // Outflows add to spent; refunds give it back
            updated.spent_amount = (updated.spent_amount - txn.amount).max_zero();

            match self
                .store
                .save_daily_plan_entries(&txn.user_id, month, std::slice::from_ref(&updated))
            {
                Ok(mut written) => return Ok(written.pop()),
                Err(e) if e.is_conflict() => {
                    tracing::debug!(
                        user = %txn.user_id,
                        attempt,
                        "Plan entry changed underneath, retrying"
                    );
                    last_conflict = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_conflict.unwrap_or_else(|| {
            AllowanceError::Conflict(format!("{} {}", txn.date, category.as_str()))
        }))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::paths::AllowancePaths;
    use crate::models::{
        BudgetState, DateRange, IncomeClassification, IncomeTier, MonthlyBudget,
        RedistributionEvent, SpendingCategory, UserFinancialProfile, UserId,
    };
    use crate::services::allocator::CalendarAllocator;
    use crate::storage::Storage;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::TempDir;

    pub(crate) fn alice() -> UserId {
        UserId::parse("alice").unwrap()
    }

    pub(crate) fn april() -> BillingMonth {
        BillingMonth::new(2025, 4).unwrap()
    }

    pub(crate) fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, d).unwrap()
    }

    fn spend(d: u32, dollars: i64, category: SpendingCategory) -> Transaction {
        Transaction::spend(alice(), day(d), Money::from_dollars(dollars), category, "Shop")
    }

    /// Storage holding an active April plan of $75/day for alice
    pub(crate) fn storage_with_budget() -> (TempDir, Storage) {
        let temp = TempDir::new().unwrap();
        let paths = AllowancePaths::with_base_dir(temp.path().to_path_buf());
        let storage = Storage::new(paths).unwrap();
        let classification = IncomeClassification::single(
            IncomeTier::Middle,
            "US".into(),
            Money::from_dollars(60_000),
        );
        let mut budget = CalendarAllocator::new()
            .allocate(&alice(), april(), Money::from_dollars(5_000), &classification)
            .unwrap();
        budget.transition_to(BudgetState::Active).unwrap();
        storage.save_monthly_budget(&budget).unwrap();
        (temp, storage)
    }

    #[test]
    fn test_spend_updates_entry() {
        let (_temp, storage) = storage_with_budget();
        let tracker = SpendTracker::new(&storage, Money::from_dollars(10));

        let txn = spend(10, 12, SpendingCategory::Dining);
        let record = tracker.record(txn, day(10)).unwrap();

        let entry = record.entry.unwrap();
        assert_eq!(entry.spent_amount, Money::from_dollars(12));
        assert_eq!(entry.version, 1);
        assert!(!record.threshold_breached);

        let history = storage
            .load_transaction_history(&alice(), DateRange::new(day(1), day(30)))
            .unwrap();
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_large_spend_breaches_threshold() {
        let (_temp, storage) = storage_with_budget();
        let tracker = SpendTracker::new(&storage, Money::from_dollars(10));

        // Groceries plan is $22.50 on a $75 day
        let txn = spend(12, 60, SpendingCategory::Groceries);
        let record = tracker.record(txn, day(10)).unwrap();
        assert!(record.threshold_breached);

        // The same overspend on a past day cannot be redistributed
        let txn = spend(5, 60, SpendingCategory::Groceries);
        let record = tracker.record(txn, day(10)).unwrap();
        assert!(!record.threshold_breached);
    }

    #[test]
    fn test_refund_reduces_spent() {
        let (_temp, storage) = storage_with_budget();
        let tracker = SpendTracker::new(&storage, Money::from_dollars(10));

        let txn = spend(3, 30, SpendingCategory::Shopping);
        tracker.record(txn, day(3)).unwrap();
        let mut refund = Transaction::new(alice(), day(3), Money::from_dollars(50));
        refund.category = Some(SpendingCategory::Shopping);
        let record = tracker.record(refund, day(3)).unwrap();

        assert!(record.entry.unwrap().spent_amount.is_zero());
    }

    #[test]
    fn test_no_budget_still_records_history() {
        let temp = TempDir::new().unwrap();
        let paths = AllowancePaths::with_base_dir(temp.path().to_path_buf());
        let storage = Storage::new(paths).unwrap();
        let tracker = SpendTracker::new(&storage, Money::from_dollars(10));

        let txn = spend(3, 30, SpendingCategory::Shopping);
        let record = tracker.record(txn, day(3)).unwrap();
        assert!(record.entry.is_none());
    }

    #[test]
    fn test_closed_month_rejects_spend() {
        let (_temp, storage) = storage_with_budget();
        storage
            .modify_monthly_budget(&alice(), april(), &mut |b| {
                Ok(b.transition_to(BudgetState::Closed)?)
            })
            .unwrap();
        let tracker = SpendTracker::new(&storage, Money::from_dollars(10));

        let txn = spend(3, 30, SpendingCategory::Shopping);
        let err = tracker.record(txn, day(3)).unwrap_err();
        assert!(matches!(err, AllowanceError::MonthClosed(_)));
    }

    /// Bumps the target entry through the inner store right before the
    /// tracker's first write, the way a second process would.
    struct RacingStore {
        inner: Storage,
        raced: AtomicBool,
    }

    impl BudgetStore for RacingStore {
        fn load_profile(&self, user_id: &UserId) -> AllowanceResult<Option<UserFinancialProfile>> {
            self.inner.load_profile(user_id)
        }

        fn save_profile(
            &self,
            profile: UserFinancialProfile,
        ) -> AllowanceResult<UserFinancialProfile> {
            self.inner.save_profile(profile)
        }

        fn profile_history(&self, user_id: &UserId) -> AllowanceResult<Vec<UserFinancialProfile>> {
            self.inner.profile_history(user_id)
        }

        fn load_monthly_budget(
            &self,
            user_id: &UserId,
            month: BillingMonth,
        ) -> AllowanceResult<Option<MonthlyBudget>> {
            self.inner.load_monthly_budget(user_id, month)
        }

        fn save_monthly_budget(&self, budget: &MonthlyBudget) -> AllowanceResult<()> {
            self.inner.save_monthly_budget(budget)
        }

        fn modify_monthly_budget(
            &self,
            user_id: &UserId,
            month: BillingMonth,
            change: &mut dyn FnMut(&mut MonthlyBudget) -> AllowanceResult<()>,
        ) -> AllowanceResult<MonthlyBudget> {
            self.inner.modify_monthly_budget(user_id, month, change)
        }

        fn save_daily_plan_entries(
            &self,
            user_id: &UserId,
            month: BillingMonth,
            entries: &[DailyPlanEntry],
        ) -> AllowanceResult<Vec<DailyPlanEntry>> {
            if !self.raced.swap(true, Ordering::SeqCst) {
                let budget = self.inner.load_monthly_budget(user_id, month)?.unwrap();
                let target = &entries[0];
                let mut other = budget.entry(target.date, target.category).unwrap().clone();
                other.spent_amount += Money::from_dollars(5);
                self.inner.save_daily_plan_entries(user_id, month, &[other])?;
            }
            self.inner.save_daily_plan_entries(user_id, month, entries)
        }

        fn list_monthly_budgets(&self, user_id: &UserId) -> AllowanceResult<Vec<MonthlyBudget>> {
            self.inner.list_monthly_budgets(user_id)
        }

        fn append_redistribution_event(&self, event: &RedistributionEvent) -> AllowanceResult<()> {
            self.inner.append_redistribution_event(event)
        }

        fn list_redistribution_events(
            &self,
            user_id: &UserId,
            month: Option<BillingMonth>,
        ) -> AllowanceResult<Vec<RedistributionEvent>> {
            self.inner.list_redistribution_events(user_id, month)
        }

        fn load_transaction_history(
            &self,
            user_id: &UserId,
            range: DateRange,
        ) -> AllowanceResult<Vec<Transaction>> {
            self.inner.load_transaction_history(user_id, range)
        }

        fn record_transaction(&self, txn: &Transaction) -> AllowanceResult<()> {
            self.inner.record_transaction(txn)
        }
    }

    #[test]
    fn test_conflict_is_retried_with_fresh_entry() {
        let (_temp, storage) = storage_with_budget();
        let store = RacingStore {
            inner: storage,
            raced: AtomicBool::new(false),
        };
        let tracker = SpendTracker::new(&store, Money::from_dollars(10));

        let txn = spend(8, 12, SpendingCategory::Dining);
        let entry = tracker.record(txn, day(8)).unwrap().entry.unwrap();

        // Both writers' spend survives
        assert_eq!(entry.spent_amount, Money::from_dollars(17));
        assert_eq!(entry.version, 2);
    }
}
