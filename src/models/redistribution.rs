//! Redistribution audit records
//!
//! Every zero-sum transfer between plan entries produces one immutable
//! `RedistributionEvent`. Events are append-only and never edited.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::category::SpendingCategory;
use super::ids::{EventId, UserId};
use super::money::Money;
use super::period::BillingMonth;

/// Why a transfer happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedistributionReason {
    /// Surplus pulled to cover an overspent entry
    CoverDeficit,
    /// Remaining month shrunk proportionally because deficits exceed surplus
    ProportionalReduction,
}

impl fmt::Display for RedistributionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CoverDeficit => write!(f, "cover deficit"),
            Self::ProportionalReduction => write!(f, "proportional reduction"),
        }
    }
}

/// A single planned-amount transfer between two entries of the same month
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub from_day: NaiveDate,
    pub from_category: SpendingCategory,
    pub to_day: NaiveDate,
    pub to_category: SpendingCategory,
    pub amount: Money,
    pub reason: RedistributionReason,
}

impl fmt::Display for Transfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} -> {} {} ({})",
            self.amount,
            self.from_day.format("%m-%d"),
            self.from_category.as_str(),
            self.to_day.format("%m-%d"),
            self.to_category.as_str(),
            self.reason
        )
    }
}

/// Persisted audit record for one transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedistributionEvent {
    pub id: EventId,
    pub user_id: UserId,
    pub month: BillingMonth,
    #[serde(flatten)]
    pub transfer: Transfer,
    pub timestamp: DateTime<Utc>,
}

impl RedistributionEvent {
    pub fn record(user_id: UserId, month: BillingMonth, transfer: Transfer) -> Self {
        Self {
            id: EventId::new(),
            user_id,
            month,
            transfer,
            timestamp: Utc::now(),
        }
    }
}
