//! Storage layer for the allowance engine
//!
//! `BudgetStore` is the persistence seam the services depend on. `Storage`
//! implements it over JSON files with atomic writes and an append-only
//! event log. Every read-modify-write re-reads the file first and runs under
//! an exclusive lock on a file in the data directory, so separate processes
//! see each other's changes and cannot interleave writes.

pub mod budgets;
pub mod events;
pub mod file_io;
pub mod profiles;
pub mod transactions;

pub use budgets::BudgetRepository;
pub use events::EventLog;
pub use file_io::{read_json, write_json_atomic};
pub use profiles::ProfileRepository;
pub use transactions::TransactionRepository;

use std::fs::{File, OpenOptions};
use std::sync::{Mutex, MutexGuard};

use fs2::FileExt;
use serde_json::json;

use crate::audit::{AuditEntry, AuditLogger, EntityType};
use crate::config::paths::AllowancePaths;
use crate::error::{AllowanceError, AllowanceResult};
use crate::models::{
    BillingMonth, DailyPlanEntry, DateRange, MonthlyBudget, RedistributionEvent, Transaction,
    UserFinancialProfile, UserId,
};

/// Persistence operations the engine needs
pub trait BudgetStore: Send + Sync {
    /// Current profile version for a user
    fn load_profile(&self, user_id: &UserId) -> AllowanceResult<Option<UserFinancialProfile>>;

    /// Store a new profile version, superseding the current one
    fn save_profile(&self, profile: UserFinancialProfile) -> AllowanceResult<UserFinancialProfile>;

    fn profile_history(&self, user_id: &UserId) -> AllowanceResult<Vec<UserFinancialProfile>>;

    fn load_monthly_budget(
        &self,
        user_id: &UserId,
        month: BillingMonth,
    ) -> AllowanceResult<Option<MonthlyBudget>>;

    /// Insert or replace a whole budget
    fn save_monthly_budget(&self, budget: &MonthlyBudget) -> AllowanceResult<()>;

    /// Atomically read, change and write one budget.
    ///
    /// The closure sees the freshest stored copy; returning an error leaves
    /// the stored budget untouched.
    fn modify_monthly_budget(
        &self,
        user_id: &UserId,
        month: BillingMonth,
        change: &mut dyn FnMut(&mut MonthlyBudget) -> AllowanceResult<()>,
    ) -> AllowanceResult<MonthlyBudget>;

    /// Write plan entries, failing with `Conflict` if any stored version moved
    fn save_daily_plan_entries(
        &self,
        user_id: &UserId,
        month: BillingMonth,
        entries: &[DailyPlanEntry],
    ) -> AllowanceResult<Vec<DailyPlanEntry>>;

    fn list_monthly_budgets(&self, user_id: &UserId) -> AllowanceResult<Vec<MonthlyBudget>>;

    fn append_redistribution_event(&self, event: &RedistributionEvent) -> AllowanceResult<()>;

    fn list_redistribution_events(
        &self,
        user_id: &UserId,
        month: Option<BillingMonth>,
    ) -> AllowanceResult<Vec<RedistributionEvent>>;

    fn load_transaction_history(
        &self,
        user_id: &UserId,
        range: DateRange,
    ) -> AllowanceResult<Vec<Transaction>>;

    fn record_transaction(&self, txn: &Transaction) -> AllowanceResult<()>;
}

/// JSON-file storage coordinating all repositories
pub struct Storage {
    paths: AllowancePaths,
    pub profiles: ProfileRepository,
    pub budgets: BudgetRepository,
    pub transactions: TransactionRepository,
    pub events: EventLog,
    audit: AuditLogger,
    /// Serializes reload-modify-save sequences within this process
    io_lock: Mutex<()>,
}

/// Held for the duration of one reload-modify-save.
///
/// Owns the in-process guard and the OS lock on the store's lock file; the
/// file lock is released before the in-process guard.
struct StoreLock<'a> {
    file: File,
    _guard: MutexGuard<'a, ()>,
}

impl Drop for StoreLock<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!(error = %e, "Failed to release storage lock");
        }
    }
}

impl Storage {
    /// Create a new Storage instance
    pub fn new(paths: AllowancePaths) -> AllowanceResult<Self> {
        paths.ensure_directories()?;

        Ok(Self {
            profiles: ProfileRepository::new(paths.profiles_file()),
            budgets: BudgetRepository::new(paths.budgets_file()),
            transactions: TransactionRepository::new(paths.transactions_file()),
            events: EventLog::new(paths.events_file()),
            audit: AuditLogger::new(paths.audit_log()),
            io_lock: Mutex::new(()),
            paths,
        })
    }

    pub fn paths(&self) -> &AllowancePaths {
        &self.paths
    }

    pub fn audit(&self) -> &AuditLogger {
        &self.audit
    }

    /// Load all data from disk
    pub fn load_all(&self) -> AllowanceResult<()> {
        self.profiles.load()?;
        self.budgets.load()?;
        self.transactions.load()?;
        Ok(())
    }

    fn lock_io(&self) -> AllowanceResult<StoreLock<'_>> {
        let guard = self
            .io_lock
            .lock()
            .map_err(|e| AllowanceError::Storage(format!("Failed to acquire storage lock: {}", e)))?;

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.paths.lock_file())
            .map_err(|e| AllowanceError::Storage(format!("Failed to open lock file: {}", e)))?;
        file.lock_exclusive()
            .map_err(|e| AllowanceError::Storage(format!("Failed to lock storage: {}", e)))?;

        Ok(StoreLock {
            file,
            _guard: guard,
        })
    }

    fn audit_budget(&self, before: Option<&MonthlyBudget>, after: &MonthlyBudget) {
        let entry = match before {
            None => AuditEntry::create(EntityType::MonthlyBudget, after.key(), &budget_view(after)),
            Some(before) if before.state != after.state => AuditEntry::update(
                EntityType::MonthlyBudget,
                after.key(),
                &budget_view(before),
                &budget_view(after),
                Some(format!("state: {} -> {}", before.state, after.state)),
            ),
            Some(before) if before.monthly_flexible_budget != after.monthly_flexible_budget => {
                AuditEntry::update(
                    EntityType::MonthlyBudget,
                    after.key(),
                    &budget_view(before),
                    &budget_view(after),
                    Some(format!(
                        "flexible budget: {} -> {}",
                        before.monthly_flexible_budget, after.monthly_flexible_budget
                    )),
                )
            }
            Some(_) => return,
        };
        self.log_audit(&entry);
    }

    /// The audit trail never blocks the operation it describes
    fn log_audit(&self, entry: &AuditEntry) {
        if let Err(e) = self.audit.log(entry) {
            tracing::warn!(entity = %entry.entity_id, error = %e, "Failed to write audit entry");
        }
    }
}

fn budget_view(budget: &MonthlyBudget) -> serde_json::Value {
    json!({
        "state": budget.state,
        "monthly_flexible_budget": budget.monthly_flexible_budget,
        "total_planned": budget.total_planned(),
        "total_spent": budget.total_spent(),
    })
}

impl BudgetStore for Storage {
    fn load_profile(&self, user_id: &UserId) -> AllowanceResult<Option<UserFinancialProfile>> {
        let _guard = self.lock_io()?;
        self.profiles.load()?;
        self.profiles.current(user_id)
    }

    fn save_profile(&self, profile: UserFinancialProfile) -> AllowanceResult<UserFinancialProfile> {
        let _guard = self.lock_io()?;
        self.profiles.load()?;

        let previous = self.profiles.current(&profile.user_id)?;
        let stored = self.profiles.supersede(profile)?;
        self.profiles.save()?;

        let entry = match previous {
            Some(previous) => AuditEntry::supersede(
                EntityType::Profile,
                stored.user_id.as_str(),
                &previous,
                &stored,
            ),
            None => AuditEntry::create(EntityType::Profile, stored.user_id.as_str(), &stored),
        };
        self.log_audit(&entry);

        Ok(stored)
    }

    fn profile_history(&self, user_id: &UserId) -> AllowanceResult<Vec<UserFinancialProfile>> {
        let _guard = self.lock_io()?;
        self.profiles.load()?;
        self.profiles.history(user_id)
    }

    fn load_monthly_budget(
        &self,
        user_id: &UserId,
        month: BillingMonth,
    ) -> AllowanceResult<Option<MonthlyBudget>> {
        let _guard = self.lock_io()?;
        self.budgets.load()?;
        self.budgets.get(user_id, month)
    }

    fn save_monthly_budget(&self, budget: &MonthlyBudget) -> AllowanceResult<()> {
        let _guard = self.lock_io()?;
        self.budgets.load()?;

        let before = self.budgets.get(&budget.user_id, budget.month)?;
        self.budgets.upsert(budget.clone())?;
        self.budgets.save()?;

        self.audit_budget(before.as_ref(), budget);
        Ok(())
    }

    fn modify_monthly_budget(
        &self,
        user_id: &UserId,
        month: BillingMonth,
        change: &mut dyn FnMut(&mut MonthlyBudget) -> AllowanceResult<()>,
    ) -> AllowanceResult<MonthlyBudget> {
        let _guard = self.lock_io()?;
        self.budgets.load()?;

        let before = self
            .budgets
            .get(user_id, month)?
            .ok_or_else(|| AllowanceError::budget_not_found(crate::models::budget_key(user_id, month)))?;

        let mut after = before.clone();
        change(&mut after)?;

        self.budgets.upsert(after.clone())?;
        self.budgets.save()?;

        self.audit_budget(Some(&before), &after);
        Ok(after)
    }

    fn save_daily_plan_entries(
        &self,
        user_id: &UserId,
        month: BillingMonth,
        entries: &[DailyPlanEntry],
    ) -> AllowanceResult<Vec<DailyPlanEntry>> {
        let _guard = self.lock_io()?;
        self.budgets.load()?;

        let written = self.budgets.update_entries(user_id, month, entries)?;
        self.budgets.save()?;
        Ok(written)
    }

    fn list_monthly_budgets(&self, user_id: &UserId) -> AllowanceResult<Vec<MonthlyBudget>> {
        let _guard = self.lock_io()?;
        self.budgets.load()?;
        self.budgets.get_by_user(user_id)
    }

    fn append_redistribution_event(&self, event: &RedistributionEvent) -> AllowanceResult<()> {
        let _guard = self.lock_io()?;
        self.events.append(std::slice::from_ref(event))
    }

    fn list_redistribution_events(
        &self,
        user_id: &UserId,
        month: Option<BillingMonth>,
    ) -> AllowanceResult<Vec<RedistributionEvent>> {
        self.events.list(user_id, month)
    }

    fn load_transaction_history(
        &self,
        user_id: &UserId,
        range: DateRange,
    ) -> AllowanceResult<Vec<Transaction>> {
        let _guard = self.lock_io()?;
        self.transactions.load()?;
        self.transactions.get_by_user_in_range(user_id, range)
    }

    fn record_transaction(&self, txn: &Transaction) -> AllowanceResult<()> {
        let _guard = self.lock_io()?;
        self.transactions.load()?;
        self.transactions.upsert(txn.clone())?;
        self.transactions.save()
    }
}
