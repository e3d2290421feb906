//! Behavioral signals
//!
//! Each signal reads the user's recent transactions (and the month's plan
//! when it has one) and proposes an adjustment to the daily baseline:
//! either a multiplier or a flat delta, with its own confidence and
//! human-readable insights.
//!
//! The aggregator applies multipliers in a fixed order (temporal, velocity,
//! habit) and deltas after them, so a given input always yields the same
//! number. A signal that errors or times out is skipped and only lowers the
//! overall confidence.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let aggregator = SignalAggregator::new(Duration::from_millis(250));
//! let ctx = SignalContext::new(&user, target, &history, Some(&budget), baseline);
//! let snapshot = aggregator.aggregate(&ctx).await;
//! ```

pub mod aggregator;
pub mod habit;
pub mod life_event;
pub mod temporal;
pub mod velocity;

pub use aggregator::{SignalAggregator, SignalFailure, SignalSnapshot};
pub use habit::{HabitPattern, HabitSignal};
pub use life_event::{LifeEvent, LifeEventKind, LifeEventSignal};
pub use temporal::TemporalSignal;
pub use velocity::{VelocityMode, VelocitySignal};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::error::AllowanceError;
use crate::models::{Money, MonthlyBudget, Transaction, UserId};

/// Identifies a signal; the order of variants is the order multipliers apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Temporal,
    Velocity,
    Habit,
    LifeEvent,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Temporal => "temporal",
            Self::Velocity => "velocity",
            Self::Habit => "habit",
            Self::LifeEvent => "life_event",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a signal produced no adjustment
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SignalError {
    #[error("{kind} signal needs at least {needed} data points, found {found}")]
    InsufficientHistory {
        kind: SignalKind,
        needed: usize,
        found: usize,
    },

    #[error("{0} signal needs a plan for the target month")]
    MissingPlan(SignalKind),

    #[error("{kind} signal timed out after {millis} ms")]
    TimedOut { kind: SignalKind, millis: u64 },

    #[error("{kind} signal failed: {message}")]
    Failed { kind: SignalKind, message: String },
}

impl From<SignalError> for AllowanceError {
    fn from(e: SignalError) -> Self {
        AllowanceError::SignalUnavailable(e.to_string())
    }
}

/// How a signal wants to move the daily baseline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Adjustment {
    Multiplier(f64),
    Delta(Money),
}

impl Adjustment {
    pub fn neutral() -> Self {
        Self::Multiplier(1.0)
    }
}

/// Structured per-signal findings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum SignalDetail {
    Temporal {
        weekday: String,
        weekday_ratio: f64,
        active_days: usize,
    },
    Velocity {
        mode: VelocityMode,
        pace_ratio: f64,
        spent_to_date: Money,
        planned_to_date: Money,
        projected_month_spend: Money,
    },
    Habit {
        habits: Vec<HabitPattern>,
        risk: f64,
    },
    LifeEvent {
        events: Vec<LifeEvent>,
    },
}

/// One successful signal computation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalOutput {
    pub kind: SignalKind,
    pub adjustment: Adjustment,
    /// Confidence in this signal's own reading, in [0, 1]
    pub confidence: f64,
    pub insights: Vec<String>,
    pub detail: SignalDetail,
}

/// Everything a signal may look at for one computation
pub struct SignalContext<'a> {
    pub user_id: &'a UserId,
    /// Day the allowance is computed for
    pub target_date: NaiveDate,
    /// Transactions before `target_date`, oldest first
    pub history: &'a [Transaction],
    /// Plan for the month containing `target_date`, if one exists
    pub budget: Option<&'a MonthlyBudget>,
    /// Unadjusted daily allowance
    pub baseline: Money,
}

impl<'a> SignalContext<'a> {
    pub fn new(
        user_id: &'a UserId,
        target_date: NaiveDate,
        history: &'a [Transaction],
        budget: Option<&'a MonthlyBudget>,
        baseline: Money,
    ) -> Self {
        Self {
            user_id,
            target_date,
            history,
            budget,
            baseline,
        }
    }

    /// Spending transactions strictly before the target date
    pub fn outflows(&self) -> impl Iterator<Item = &'a Transaction> + '_ {
        let target = self.target_date;
        self.history
            .iter()
            .filter(move |t| t.is_outflow() && t.date < target)
    }
}

/// A pluggable behavioral signal
#[async_trait]
pub trait Signal: Send + Sync {
    fn kind(&self) -> SignalKind;

    async fn compute(&self, ctx: &SignalContext<'_>) -> Result<SignalOutput, SignalError>;
}
