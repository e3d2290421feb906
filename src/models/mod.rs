//! Core data models for the allowance engine
//!
//! This module contains the data structures that represent the allowance
//! domain: money, income tiers, profiles, monthly plans, transactions and
//! redistribution records.

pub mod category;
pub mod ids;
pub mod money;
pub mod period;
pub mod plan;
pub mod profile;
pub mod redistribution;
pub mod tier;
pub mod transaction;

pub use category::SpendingCategory;
pub use ids::{EventId, TransactionId, UserId};
pub use money::Money;
pub use period::{BillingMonth, DateRange};
pub use plan::{budget_key, BudgetState, CategoryMix, DailyPlanEntry, MonthlyBudget};
pub use profile::{TransitionWeights, UserFinancialProfile};
pub use redistribution::{RedistributionEvent, RedistributionReason, Transfer};
pub use tier::{CategoryBand, IncomeClassification, IncomeTier, TierThresholdTable};
pub use transaction::Transaction;
