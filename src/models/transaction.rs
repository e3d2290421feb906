//! Transaction model
//!
//! Amounts follow the ledger convention: negative for outflow (spending),
//! positive for inflow (refunds, income).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::category::SpendingCategory;
use super::ids::{TransactionId, UserId};
use super::money::Money;

/// A financial transaction belonging to one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,

    pub user_id: UserId,

    pub date: NaiveDate,

    /// Amount (positive for inflow, negative for outflow)
    pub amount: Money,

    /// Flexible-spending category; None for income or uncategorized rows
    pub category: Option<SpendingCategory>,

    #[serde(default)]
    pub payee: String,

    #[serde(default)]
    pub memo: String,

    /// Fingerprint of the CSV row this came from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_id: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Create a new transaction
    pub fn new(user_id: UserId, date: NaiveDate, amount: Money) -> Self {
        Self {
            id: TransactionId::new(),
            user_id,
            date,
            amount,
            category: None,
            payee: String::new(),
            memo: String::new(),
            import_id: None,
            created_at: Utc::now(),
        }
    }

    /// Create a categorized spend of `spent` (a positive amount)
    pub fn spend(
        user_id: UserId,
        date: NaiveDate,
        spent: Money,
        category: SpendingCategory,
        payee: impl Into<String>,
    ) -> Self {
        let mut txn = Self::new(user_id, date, -spent.abs());
        txn.category = Some(category);
        txn.payee = payee.into();
        txn
    }

    pub fn is_outflow(&self) -> bool {
        self.amount.is_negative()
    }

    /// Amount spent, as a positive figure (zero for inflows)
    pub fn outflow(&self) -> Money {
        if self.is_outflow() {
            -self.amount
        } else {
            Money::zero()
        }
    }

    /// Normalized payee key used for habit grouping
    pub fn payee_key(&self) -> String {
        self.payee
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let category = self
            .category
            .map(|c| c.label())
            .unwrap_or("Uncategorized");
        write!(
            f,
            "{} {} {} ({})",
            self.date.format("%Y-%m-%d"),
            self.payee,
            self.amount,
            category
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserId {
        UserId::parse("alice").unwrap()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
    }

    #[test]
    fn test_spend_is_outflow() {
        let txn = Transaction::spend(
            user(),
            date(),
            Money::from_cents(1250),
            SpendingCategory::Dining,
            "Cafe",
        );
        assert!(txn.is_outflow());
        assert_eq!(txn.amount.cents(), -1250);
        assert_eq!(txn.outflow().cents(), 1250);
    }

    #[test]
    fn test_inflow_has_no_outflow() {
        let txn = Transaction::new(user(), date(), Money::from_cents(5000));
        assert_eq!(txn.outflow(), Money::zero());
    }

    #[test]
    fn test_payee_key_normalizes() {
        let mut txn = Transaction::new(user(), date(), Money::from_cents(-500));
        txn.payee = "  Corner   COFFEE ".into();
        assert_eq!(txn.payee_key(), "corner coffee");
    }
}
