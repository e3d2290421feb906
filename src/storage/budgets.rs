//! Monthly budget repository for JSON storage
//!
//! Manages loading and saving monthly budgets to budgets.json. Plan entry
//! writes are version-checked so concurrent writers cannot silently
//! overwrite each other.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use chrono::Utc;

use crate::error::AllowanceError;
use crate::models::{budget_key, BillingMonth, DailyPlanEntry, MonthlyBudget, UserId};

use super::file_io::{read_json, write_json_atomic};

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
struct BudgetData {
    budgets: Vec<MonthlyBudget>,
}

/// Repository for monthly budget persistence
pub struct BudgetRepository {
    path: PathBuf,
    /// "user:YYYY-MM" -> budget
    data: RwLock<HashMap<String, MonthlyBudget>>,
}

impl BudgetRepository {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            data: RwLock::new(HashMap::new()),
        }
    }

    /// Load budgets from disk, replacing whatever is cached
    pub fn load(&self) -> Result<(), AllowanceError> {
        let file_data: BudgetData = read_json(&self.path)?;

        let mut data = self.data.write().map_err(|e| {
            AllowanceError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;

        data.clear();
        for budget in file_data.budgets {
            data.insert(budget.key(), budget);
        }

        Ok(())
    }

    /// Save budgets to disk
    pub fn save(&self) -> Result<(), AllowanceError> {
        let data = self.data.read().map_err(|e| {
            AllowanceError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;

        let mut budgets: Vec<_> = data.values().cloned().collect();
        budgets.sort_by(|a, b| {
            a.user_id
                .cmp(&b.user_id)
                .then_with(|| a.month.cmp(&b.month))
        });

        write_json_atomic(&self.path, &BudgetData { budgets })
    }

    pub fn get(
        &self,
        user_id: &UserId,
        month: BillingMonth,
    ) -> Result<Option<MonthlyBudget>, AllowanceError> {
        let data = self.data.read().map_err(|e| {
            AllowanceError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(data.get(&budget_key(user_id, month)).cloned())
    }

    /// All budgets for a user, oldest month first
    pub fn get_by_user(&self, user_id: &UserId) -> Result<Vec<MonthlyBudget>, AllowanceError> {
        let data = self.data.read().map_err(|e| {
            AllowanceError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;

        let mut budgets: Vec<_> = data
            .values()
            .filter(|b| &b.user_id == user_id)
            .cloned()
            .collect();
        budgets.sort_by_key(|b| b.month);
        Ok(budgets)
    }

    /// Insert or replace a whole budget
    pub fn upsert(&self, budget: MonthlyBudget) -> Result<(), AllowanceError> {
        let mut data = self.data.write().map_err(|e| {
            AllowanceError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;

        data.insert(budget.key(), budget);
        Ok(())
    }

    /// Replace plan entries, rejecting any entry whose version is stale.
    ///
    /// Either every entry is written or none is. Written entries come back
    /// with their bumped versions.
    pub fn update_entries(
        &self,
        user_id: &UserId,
        month: BillingMonth,
        entries: &[DailyPlanEntry],
    ) -> Result<Vec<DailyPlanEntry>, AllowanceError> {
        let key = budget_key(user_id, month);
        let mut data = self.data.write().map_err(|e| {
            AllowanceError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;

        let budget = data
            .get_mut(&key)
            .ok_or_else(|| AllowanceError::budget_not_found(&key))?;

        if budget.is_closed() {
            return Err(AllowanceError::MonthClosed(month.to_string()));
        }

        let mut staged = budget.clone();
        let mut written = Vec::with_capacity(entries.len());
        for incoming in entries {
            let stored = staged
                .entry_mut(incoming.date, incoming.category)
                .ok_or_else(|| {
                    AllowanceError::Validation(format!(
                        "No plan entry for {} {} in {}",
                        incoming.date, incoming.category, key
                    ))
                })?;

            if stored.version != incoming.version {
                return Err(AllowanceError::Conflict(format!(
                    "Plan entry {} {} changed (stored v{}, written v{})",
                    incoming.date, incoming.category, stored.version, incoming.version
                )));
            }

            *stored = DailyPlanEntry {
                version: incoming.version + 1,
                ..incoming.clone()
            };
            written.push(stored.clone());
        }

        staged
            .validate()
            .map_err(|e| AllowanceError::Validation(e.to_string()))?;

        staged.updated_at = Utc::now();
        *budget = staged;

        Ok(written)
    }

    pub fn count(&self) -> Result<usize, AllowanceError> {
        let data = self.data.read().map_err(|e| {
            AllowanceError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;
        Ok(data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        BudgetState, CategoryMix, IncomeClassification, IncomeTier, Money, SpendingCategory,
    };
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn create_test_repo() -> (TempDir, BudgetRepository) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("budgets.json");
        let repo = BudgetRepository::new(path);
        (temp_dir, repo)
    }

    fn sample_budget() -> MonthlyBudget {
        let month = BillingMonth::new(2025, 2).unwrap();
        let entries = month
            .days()
            .map(|d| DailyPlanEntry::new(d, SpendingCategory::Groceries, Money::from_dollars(10)))
            .collect();
        let now = Utc::now();
        MonthlyBudget {
            user_id: UserId::parse("alice").unwrap(),
            month,
            state: BudgetState::Active,
            monthly_income: Money::from_dollars(1000),
            classification: IncomeClassification::single(
                IncomeTier::Low,
                "US".into(),
                Money::from_dollars(12_000),
            ),
            flexible_ratio: 0.28,
            monthly_flexible_budget: Money::from_dollars(280),
            category_mix: CategoryMix::from_bps([(SpendingCategory::Groceries, 10_000)]),
            entries,
            redistribution_started_at: None,
            created_at: now,
            updated_at: now,
            closed_at: None,
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 2, d).unwrap()
    }

    #[test]
    fn test_upsert_save_and_load() {
        let (temp, repo) = create_test_repo();
        let budget = sample_budget();
        repo.upsert(budget.clone()).unwrap();
        repo.save().unwrap();

        let repo2 = BudgetRepository::new(temp.path().join("budgets.json"));
        repo2.load().unwrap();

        let loaded = repo2.get(&budget.user_id, budget.month).unwrap().unwrap();
        assert_eq!(loaded.entries.len(), 28);
        assert_eq!(loaded.total_planned(), budget.total_planned());
        assert_eq!(repo2.get_by_user(&budget.user_id).unwrap().len(), 1);
    }

    #[test]
    fn test_update_entries_bumps_version() {
        let (_temp, repo) = create_test_repo();
        let budget = sample_budget();
        repo.upsert(budget.clone()).unwrap();

        let mut entry = budget.entry(day(3), SpendingCategory::Groceries).unwrap().clone();
        entry.spent_amount = Money::from_dollars(4);

        let written = repo
            .update_entries(&budget.user_id, budget.month, &[entry])
            .unwrap();
        assert_eq!(written[0].version, 1);

        let stored = repo.get(&budget.user_id, budget.month).unwrap().unwrap();
        let stored_entry = stored.entry(day(3), SpendingCategory::Groceries).unwrap();
        assert_eq!(stored_entry.spent_amount, Money::from_dollars(4));
        assert_eq!(stored_entry.version, 1);
    }

    #[test]
    fn test_stale_version_conflicts() {
        let (_temp, repo) = create_test_repo();
        let budget = sample_budget();
        repo.upsert(budget.clone()).unwrap();

        let stale = budget.entry(day(3), SpendingCategory::Groceries).unwrap().clone();
        repo.update_entries(&budget.user_id, budget.month, std::slice::from_ref(&stale))
            .unwrap();

        let err = repo
            .update_entries(&budget.user_id, budget.month, &[stale])
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn test_update_rejects_broken_total() {
        let (_temp, repo) = create_test_repo();
        let budget = sample_budget();
        repo.upsert(budget.clone()).unwrap();

        let mut entry = budget.entry(day(1), SpendingCategory::Groceries).unwrap().clone();
        entry.planned_amount = Money::from_dollars(11);

        let err = repo
            .update_entries(&budget.user_id, budget.month, &[entry])
            .unwrap_err();
        assert!(err.is_validation());

        // Nothing was committed
        let stored = repo.get(&budget.user_id, budget.month).unwrap().unwrap();
        assert_eq!(stored.total_planned(), Money::from_dollars(280));
    }

    #[test]
    fn test_closed_budget_is_read_only() {
        let (_temp, repo) = create_test_repo();
        let mut budget = sample_budget();
        budget.transition_to(BudgetState::Closed).unwrap();
        repo.upsert(budget.clone()).unwrap();

        let entry = budget.entries[0].clone();
        let err = repo
            .update_entries(&budget.user_id, budget.month, &[entry])
            .unwrap_err();
        assert!(matches!(err, AllowanceError::MonthClosed(_)));
    }
}
