//! Budget orchestrator
//!
//! The single entry point the CLI talks to. It owns no state beyond per-user
//! locks: every collaborator is built once by the caller and passed in by
//! reference.
//!
//! Redistribution and spend recording for one user are serialized by an
//! in-process async mutex. Across processes, the persisted `Redistributing`
//! state marks a run in flight; a run that finds a fresh marker backs off
//! and retries, and a marker older than [`STALE_MARKER_SECS`] is taken over.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as AsyncMutex;

use crate::config::Settings;
use crate::error::{AllowanceError, AllowanceResult};
use crate::models::{
    budget_key, BillingMonth, BudgetState, DateRange, IncomeClassification, Money,
    MonthlyBudget, RedistributionEvent, SpendingCategory, Transaction, UserFinancialProfile,
    UserId,
};
use crate::services::allocator::CalendarAllocator;
use crate::services::classifier::IncomeClassifier;
use crate::services::redistribution::RedistributionEngine;
use crate::services::signals::{SignalAggregator, SignalContext, SignalSnapshot};
use crate::services::tracker::{SpendRecord, SpendTracker};
use crate::storage::BudgetStore;

/// Days of transaction history handed to the signals
pub const HISTORY_DAYS: i64 = 90;

/// Age after which a `Redistributing` marker is considered abandoned
pub const STALE_MARKER_SECS: i64 = 30;

const MAX_PLAN_ATTEMPTS: usize = 3;
const BACKOFF_START_MS: u64 = 25;
const BACKOFF_MAX_MS: u64 = 1_000;

/// Today's allowance for one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryAllocation {
    pub category: SpendingCategory,
    /// Share of the adjusted daily budget
    pub amount: Money,
    /// Plan entry's planned amount for the day
    pub planned: Money,
    pub spent: Money,
}

/// Everything the user sees for one day
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyBudgetResponse {
    pub user_id: UserId,
    pub date: NaiveDate,
    pub classification: IncomeClassification,
    /// Planned total for the day before behavioral adjustment
    pub baseline: Money,
    pub daily_budget: Money,
    pub spent_today: Money,
    /// Daily budget minus today's spending; negative when over
    pub remaining_today: Money,
    pub confidence: f64,
    pub risk_score: f64,
    pub category_allocations: Vec<CategoryAllocation>,
    pub insights: Vec<String>,
    pub signals: SignalSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedistributionOutcome {
    /// Every remaining deficit was covered
    pub success: bool,
    pub transfers_applied: usize,
    /// Deficit no remaining entry could absorb
    pub shortfall: Money,
    /// Deficits exceeded surplus and the remaining days were shrunk
    pub crisis: bool,
}

impl RedistributionOutcome {
    /// Turn an uncovered shortfall into an error
    pub fn ensure_covered(self) -> AllowanceResult<Self> {
        if self.shortfall.is_positive() {
            return Err(AllowanceError::NoRedistributableSurplus {
                shortfall: self.shortfall,
            });
        }
        Ok(self)
    }
}

#[derive(Debug, Clone)]
pub struct SpendOutcome {
    pub record: SpendRecord,
    /// Set when the spend breached the threshold and a rebalance ran
    pub redistribution: Option<RedistributionOutcome>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RolloverSummary {
    pub closed: Vec<BillingMonth>,
    pub opened: Option<BillingMonth>,
}

pub struct BudgetOrchestrator<'a> {
    store: &'a dyn BudgetStore,
    classifier: &'a IncomeClassifier,
    allocator: &'a CalendarAllocator,
    engine: &'a RedistributionEngine,
    aggregator: &'a SignalAggregator,
    settings: &'a Settings,
    user_locks: Mutex<HashMap<UserId, Arc<AsyncMutex<()>>>>,
}

impl<'a> BudgetOrchestrator<'a> {
    pub fn new(
        store: &'a dyn BudgetStore,
        classifier: &'a IncomeClassifier,
        allocator: &'a CalendarAllocator,
        engine: &'a RedistributionEngine,
        aggregator: &'a SignalAggregator,
        settings: &'a Settings,
    ) -> Self {
        Self {
            store,
            classifier,
            allocator,
            engine,
            aggregator,
            settings,
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn classify_income(
        &self,
        monthly_income: Money,
        region: Option<&str>,
    ) -> AllowanceResult<IncomeClassification> {
        self.classifier.classify(monthly_income, region)
    }

    /// Current profile, or `NotFound`
    pub fn profile(&self, user_id: &UserId) -> AllowanceResult<UserFinancialProfile> {
        self.store
            .load_profile(user_id)?
            .ok_or_else(|| AllowanceError::profile_not_found(user_id.as_str()))
    }

    pub fn profile_history(&self, user_id: &UserId) -> AllowanceResult<Vec<UserFinancialProfile>> {
        self.store.profile_history(user_id)
    }

    /// Set income and region, appending a new profile version
    pub fn update_profile(
        &self,
        user_id: &UserId,
        monthly_income: Money,
        region: Option<String>,
    ) -> AllowanceResult<UserFinancialProfile> {
        let classification = self.classify_income(monthly_income, region.as_deref())?;
        let profile = match self.store.load_profile(user_id)? {
            Some(current) => current.supersede_with(monthly_income, region, &classification),
            None => {
                UserFinancialProfile::new(user_id.clone(), monthly_income, region, &classification)
            }
        };

        let stored = self.store.save_profile(profile)?;
        tracing::info!(
            user = %user_id,
            version = stored.version,
            tier = %stored.income_tier,
            "Profile updated"
        );
        Ok(stored)
    }

    pub fn get_monthly_budget(
        &self,
        user_id: &UserId,
        month: BillingMonth,
    ) -> AllowanceResult<MonthlyBudget> {
        self.store
            .load_monthly_budget(user_id, month)?
            .ok_or_else(|| AllowanceError::budget_not_found(budget_key(user_id, month)))
    }

    /// Load the month's budget, allocating and activating it from the
    /// current profile when it does not exist yet
    pub fn ensure_budget(
        &self,
        user_id: &UserId,
        month: BillingMonth,
    ) -> AllowanceResult<MonthlyBudget> {
        if let Some(budget) = self.store.load_monthly_budget(user_id, month)? {
            return Ok(budget);
        }

        let profile = self.profile(user_id)?;
        let classification =
            self.classify_income(profile.monthly_income, profile.region.as_deref())?;
        let mut budget = self.allocator.allocate(
            user_id,
            month,
            profile.monthly_income,
            &classification,
        )?;
        budget.transition_to(BudgetState::Active)?;
        self.store.save_monthly_budget(&budget)?;

        tracing::info!(
            user = %user_id,
            month = %month,
            flexible = %budget.monthly_flexible_budget,
            "Monthly budget created"
        );
        Ok(budget)
    }

    /// Compute the adjusted allowance for `target_date`.
    ///
    /// Uses the stored plan for the month when there is one, otherwise a
    /// fresh allocation that is not persisted.
    pub async fn calculate_daily_budget(
        &self,
        user_id: &UserId,
        profile: &UserFinancialProfile,
        history: &[Transaction],
        target_date: NaiveDate,
    ) -> AllowanceResult<DailyBudgetResponse> {
        let classification =
            self.classify_income(profile.monthly_income, profile.region.as_deref())?;
        let month = BillingMonth::containing(target_date);
        let budget = match self.store.load_monthly_budget(user_id, month)? {
            Some(budget) => budget,
            None => self
                .allocator
                .allocate(user_id, month, profile.monthly_income, &classification)?,
        };

        let baseline = budget.planned_for(target_date);
        let ctx = SignalContext::new(user_id, target_date, history, Some(&budget), baseline);
        let signals = self.aggregator.aggregate(&ctx).await;

        let daily_budget = signals.adjusted_daily;
        let spent_today = budget.spent_for(target_date);
        let category_allocations = category_allocations(&budget, target_date, daily_budget);

        let mut insights = profile_insights(profile, &classification);
        insights.extend(plan_insights(&budget, target_date));
        insights.extend(signals.insights.iter().cloned());

        tracing::debug!(
            user = %user_id,
            date = %target_date,
            baseline = %baseline,
            daily = %daily_budget,
            confidence = signals.confidence,
            "Daily budget calculated"
        );

        Ok(DailyBudgetResponse {
            user_id: user_id.clone(),
            date: target_date,
            classification,
            baseline,
            daily_budget,
            spent_today,
            remaining_today: daily_budget - spent_today,
            confidence: signals.confidence,
            risk_score: signals.risk_score,
            category_allocations,
            insights,
            signals,
        })
    }

    /// Load the profile and recent history, then compute the allowance
    pub async fn daily_budget(
        &self,
        user_id: &UserId,
        target_date: NaiveDate,
    ) -> AllowanceResult<DailyBudgetResponse> {
        let profile = self.profile(user_id)?;
        let range = DateRange::new(
            target_date - Duration::days(HISTORY_DAYS),
            target_date - Duration::days(1),
        );
        let history = self.store.load_transaction_history(user_id, range)?;
        self.calculate_daily_budget(user_id, &profile, &history, target_date)
            .await
    }

    /// Rebalance the remaining days of a month
    pub async fn redistribute_budget(
        &self,
        user_id: &UserId,
        month: BillingMonth,
        today: NaiveDate,
    ) -> AllowanceResult<RedistributionOutcome> {
        let lock = self.user_lock(user_id)?;
        let _guard = lock.lock().await;

        self.acquire_marker(user_id, month).await?;
        let result = self.run_redistribution(user_id, month, today);

        let release = self.store.modify_monthly_budget(user_id, month, &mut |budget| {
            if budget.state == BudgetState::Redistributing {
                budget.transition_to(BudgetState::Active)?;
            }
            Ok(())
        });
        if let Err(e) = release {
            // Left in place, the marker goes stale and the next run takes over
            tracing::warn!(
                user = %user_id,
                month = %month,
                error = %e,
                "Failed to release redistribution marker"
            );
        }

        result
    }

    /// Record a transaction; rebalance when it breaches the threshold
    pub async fn record_spend(
        &self,
        txn: Transaction,
        today: NaiveDate,
    ) -> AllowanceResult<SpendOutcome> {
        let user_id = txn.user_id.clone();
        let month = BillingMonth::containing(txn.date);

        let record = {
            let lock = self.user_lock(&user_id)?;
            let _guard = lock.lock().await;

            if txn.category.is_some()
                && month == BillingMonth::containing(today)
                && self.store.load_profile(&user_id)?.is_some()
            {
                self.ensure_budget(&user_id, month)?;
            }
            SpendTracker::from_settings(self.store, self.settings).record(txn, today)?
        };

        let redistribution = if record.threshold_breached {
            match self.redistribute_budget(&user_id, month, today).await {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    tracing::warn!(
                        user = %user_id,
                        month = %month,
                        error = %e,
                        "Automatic redistribution failed"
                    );
                    None
                }
            }
        } else {
            None
        };

        Ok(SpendOutcome {
            record,
            redistribution,
        })
    }

    /// Freeze a month; no further spends or transfers are accepted
    pub async fn close_month(
        &self,
        user_id: &UserId,
        month: BillingMonth,
    ) -> AllowanceResult<MonthlyBudget> {
        let lock = self.user_lock(user_id)?;
        let _guard = lock.lock().await;

        let budget = self.store.modify_monthly_budget(user_id, month, &mut |budget| {
            if budget.is_closed() {
                return Err(AllowanceError::MonthClosed(month.to_string()));
            }
            Ok(budget.transition_to(BudgetState::Closed)?)
        })?;

        tracing::info!(
            user = %user_id,
            month = %month,
            planned = %budget.total_planned(),
            spent = %budget.total_spent(),
            "Month closed"
        );
        Ok(budget)
    }

    /// Close every active month before `today`'s and open the current one
    pub async fn roll_over(
        &self,
        user_id: &UserId,
        today: NaiveDate,
    ) -> AllowanceResult<RolloverSummary> {
        let current = BillingMonth::containing(today);
        let mut summary = RolloverSummary::default();

        let stale: Vec<BillingMonth> = self
            .store
            .list_monthly_budgets(user_id)?
            .into_iter()
            .filter(|b| b.month < current && b.state == BudgetState::Active)
            .map(|b| b.month)
            .collect();
        for month in stale {
            self.close_month(user_id, month).await?;
            summary.closed.push(month);
        }

        let lock = self.user_lock(user_id)?;
        let _guard = lock.lock().await;
        if self.store.load_monthly_budget(user_id, current)?.is_none()
            && self.store.load_profile(user_id)?.is_some()
        {
            self.ensure_budget(user_id, current)?;
            summary.opened = Some(current);
        }

        Ok(summary)
    }

    pub fn list_events(
        &self,
        user_id: &UserId,
        month: Option<BillingMonth>,
    ) -> AllowanceResult<Vec<RedistributionEvent>> {
        self.store.list_redistribution_events(user_id, month)
    }

    fn user_lock(&self, user_id: &UserId) -> AllowanceResult<Arc<AsyncMutex<()>>> {
        let mut locks = self.user_locks.lock().map_err(|e| {
            AllowanceError::Storage(format!("Failed to acquire user lock table: {}", e))
        })?;
        Ok(locks.entry(user_id.clone()).or_default().clone())
    }

    /// Move the stored budget into `Redistributing`, waiting out other runs
    async fn acquire_marker(&self, user_id: &UserId, month: BillingMonth) -> AllowanceResult<()> {
        let mut backoff = BACKOFF_START_MS;
        loop {
            let now = Utc::now();
            match self
                .store
                .modify_monthly_budget(user_id, month, &mut |budget| claim_marker(budget, now))
            {
                Ok(_) => return Ok(()),
                Err(AllowanceError::ConcurrentRedistribution(_)) => {
                    tracing::debug!(
                        user = %user_id,
                        month = %month,
                        backoff_ms = backoff,
                        "Redistribution in flight elsewhere, waiting"
                    );
                    tokio::time::sleep(StdDuration::from_millis(backoff)).await;
                    backoff = (backoff * 2).min(BACKOFF_MAX_MS);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Plan, write and log one redistribution; retried when a spend lands
    /// between planning and writing
    fn run_redistribution(
        &self,
        user_id: &UserId,
        month: BillingMonth,
        today: NaiveDate,
    ) -> AllowanceResult<RedistributionOutcome> {
        let mut last_conflict = None;

        for attempt in 1..=MAX_PLAN_ATTEMPTS {
            let budget = self.get_monthly_budget(user_id, month)?;
            let plan = self.engine.plan(&budget.entries, today);
            let outcome = RedistributionOutcome {
                success: plan.shortfall.is_zero(),
                transfers_applied: plan.transfers.len(),
                shortfall: plan.shortfall,
                crisis: plan.crisis,
            };

            if plan.shortfall.is_positive() {
                let unmet = AllowanceError::NoRedistributableSurplus {
                    shortfall: plan.shortfall,
                };
                tracing::warn!(
                    user = %user_id,
                    month = %month,
                    error = %unmet,
                    "Deficit left uncovered"
                );
            }
            if plan.is_noop() {
                return Ok(outcome);
            }

            match self
                .store
                .save_daily_plan_entries(user_id, month, &plan.entries)
            {
                Ok(_) => {
                    for transfer in plan.transfers {
                        let event = RedistributionEvent::record(user_id.clone(), month, transfer);
                        self.store.append_redistribution_event(&event)?;
                    }
                    tracing::info!(
                        user = %user_id,
                        month = %month,
                        transfers = outcome.transfers_applied,
                        crisis = outcome.crisis,
                        "Budget redistributed"
                    );
                    return Ok(outcome);
                }
                Err(e) if e.is_conflict() => {
                    tracing::debug!(
                        user = %user_id,
                        attempt,
                        "Plan changed during redistribution, replanning"
                    );
                    last_conflict = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_conflict
            .unwrap_or_else(|| AllowanceError::ConcurrentRedistribution(user_id.to_string())))
    }
}

/// State change that marks a budget as being redistributed
fn claim_marker(budget: &mut MonthlyBudget, now: DateTime<Utc>) -> AllowanceResult<()> {
    match budget.state {
        BudgetState::Closed => Err(AllowanceError::MonthClosed(budget.month.to_string())),
        BudgetState::Active => Ok(budget.transition_to(BudgetState::Redistributing)?),
        BudgetState::Draft => {
            budget.transition_to(BudgetState::Active)?;
            Ok(budget.transition_to(BudgetState::Redistributing)?)
        }
        BudgetState::Redistributing => {
            let fresh = budget
                .redistribution_started_at
                .is_some_and(|started| now - started <= Duration::seconds(STALE_MARKER_SECS));
            if fresh {
                return Err(AllowanceError::ConcurrentRedistribution(
                    budget.user_id.to_string(),
                ));
            }
            tracing::warn!(
                user = %budget.user_id,
                month = %budget.month,
                "Taking over abandoned redistribution"
            );
            budget.transition_to(BudgetState::Active)?;
            Ok(budget.transition_to(BudgetState::Redistributing)?)
        }
    }
}

/// Split the adjusted day across categories in proportion to the plan
fn category_allocations(
    budget: &MonthlyBudget,
    date: NaiveDate,
    daily_budget: Money,
) -> Vec<CategoryAllocation> {
    let mut entries: Vec<_> = budget.entries_for(date).collect();
    entries.sort_by_key(|e| e.category);

    let mut weights: Vec<i64> = entries.iter().map(|e| e.planned_amount.cents()).collect();
    if weights.iter().all(|w| *w <= 0) {
        weights = entries
            .iter()
            .map(|e| i64::from(budget.category_mix.bps(e.category)))
            .collect();
    }

    entries
        .iter()
        .zip(daily_budget.apportion(&weights))
        .map(|(entry, amount)| CategoryAllocation {
            category: entry.category,
            amount,
            planned: entry.planned_amount,
            spent: entry.spent_amount,
        })
        .collect()
}

fn profile_insights(
    profile: &UserFinancialProfile,
    classification: &IncomeClassification,
) -> Vec<String> {
    let mut insights = Vec::new();
    if let (true, Some(secondary)) = (classification.in_transition, classification.secondary_tier) {
        insights.push(format!(
            "Income is close to the {} tier; allowance blends {:.0}% {} with {:.0}% {}",
            secondary,
            classification.primary_weight * 100.0,
            classification.primary_tier,
            classification.secondary_weight * 100.0,
            secondary
        ));
    }
    if classification.region_fallback {
        insights.push(format!(
            "No income thresholds for region {}; national figures used",
            profile.region.as_deref().unwrap_or("(none)")
        ));
    }
    insights
}

fn plan_insights(budget: &MonthlyBudget, date: NaiveDate) -> Vec<String> {
    let mut insights = Vec::new();
    if budget.is_closed() {
        insights.push(format!("{} is closed; figures are final", budget.month));
        return insights;
    }
    let overspent = budget.overspent_days(date);
    if !overspent.is_empty() {
        insights.push(format!(
            "{} day(s) from today on are over plan by up to {}; redistribute to rebalance",
            overspent.len(),
            budget.max_remaining_deficit(date)
        ));
    }
    let (planned, spent) = budget.to_date_totals(date);
    if spent > planned {
        insights.push(format!("{} over plan so far this month", spent - planned));
    }
    insights
}
