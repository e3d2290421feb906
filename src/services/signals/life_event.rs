//! Life-event detection
//!
//! Looks for two things in recent history: one-off purchases far above the
//! user's typical outflow, and categories whose share of spending jumped
//! compared to the months before. Large purchases made earlier in the target
//! month are paid back over the days that remain.

use async_trait::async_trait;
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Adjustment, Signal, SignalContext, SignalDetail, SignalError, SignalKind, SignalOutput};
use crate::models::{BillingMonth, DateRange, Money, SpendingCategory, Transaction};

/// Outflows needed before a median means anything
pub const MIN_OUTFLOWS: usize = 10;

const LARGE_MULTIPLE: i64 = 5;
const VERY_LARGE_MULTIPLE: i64 = 10;
const LARGE_FLOOR_DOLLARS: i64 = 250;

const RECENT_DAYS: i64 = 30;
const PRIOR_DAYS: i64 = 60;
const SHIFT_MULTIPLE: f64 = 2.0;
const STRONG_SHIFT_MULTIPLE: f64 = 3.0;
const MIN_RECENT_SHARE: f64 = 0.15;

/// Largest payback per day, as a share of the baseline
const MAX_PAYBACK_SHARE: f64 = 0.25;

const FULL_CONFIDENCE_OUTFLOWS: f64 = 50.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifeEventKind {
    LargePurchase {
        payee: String,
        amount: Money,
        date: NaiveDate,
    },
    CategoryShift {
        category: SpendingCategory,
        recent_share: f64,
        prior_share: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifeEvent {
    pub kind: LifeEventKind,
    pub confidence: f64,
}

impl LifeEvent {
    pub fn describe(&self) -> String {
        match &self.kind {
            LifeEventKind::LargePurchase {
                payee,
                amount,
                date,
            } => {
                let payee = if payee.is_empty() { "unknown payee" } else { payee };
                format!("Large purchase of {} at {} on {}", amount, payee, date)
            }
            LifeEventKind::CategoryShift {
                category,
                recent_share,
                prior_share,
            } => format!(
                "{} is now {:.0}% of your spending, up from {:.0}%",
                category.label(),
                recent_share * 100.0,
                prior_share * 100.0
            ),
        }
    }
}

#[derive(Debug, Default)]
pub struct LifeEventSignal;

impl LifeEventSignal {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Signal for LifeEventSignal {
    fn kind(&self) -> SignalKind {
        SignalKind::LifeEvent
    }

    async fn compute(&self, ctx: &SignalContext<'_>) -> Result<SignalOutput, SignalError> {
        let outflows: Vec<&Transaction> = ctx.outflows().collect();
        if outflows.len() < MIN_OUTFLOWS {
            return Err(SignalError::InsufficientHistory {
                kind: SignalKind::LifeEvent,
                needed: MIN_OUTFLOWS,
                found: outflows.len(),
            });
        }

        let yesterday = ctx.target_date - Duration::days(1);
        let recent = DateRange::trailing(yesterday, RECENT_DAYS);
        let prior = DateRange::trailing(recent.start - Duration::days(1), PRIOR_DAYS);
        let lookback = DateRange::new(prior.start, yesterday);

        let median = median_outflow(&outflows);
        let floor = Money::from_dollars(LARGE_FLOOR_DOLLARS);

        let mut events = Vec::new();
        let mut large_this_month = Money::zero();
        let month = BillingMonth::containing(ctx.target_date);

        for txn in outflows.iter().filter(|t| lookback.contains(t.date)) {
            let amount = txn.outflow();
            if amount < floor || amount.cents() < median.cents() * LARGE_MULTIPLE {
                continue;
            }
            let confidence = if amount.cents() >= median.cents() * VERY_LARGE_MULTIPLE {
                0.9
            } else {
                0.6
            };
            if month.contains(txn.date) {
                large_this_month += amount;
            }
            events.push(LifeEvent {
                kind: LifeEventKind::LargePurchase {
                    payee: txn.payee.clone(),
                    amount,
                    date: txn.date,
                },
                confidence,
            });
        }

        events.extend(category_shifts(&outflows, recent, prior));

        let delta = payback(large_this_month, ctx.target_date, month, ctx.baseline);
        let insights = events.iter().map(LifeEvent::describe).collect();

        Ok(SignalOutput {
            kind: SignalKind::LifeEvent,
            adjustment: Adjustment::Delta(-delta),
            confidence: (outflows.len() as f64 / FULL_CONFIDENCE_OUTFLOWS).min(1.0),
            insights,
            detail: SignalDetail::LifeEvent { events },
        })
    }
}

fn median_outflow(outflows: &[&Transaction]) -> Money {
    let mut cents: Vec<i64> = outflows.iter().map(|t| t.outflow().cents()).collect();
    cents.sort_unstable();
    let mid = cents.len() / 2;
    if cents.is_empty() {
        Money::zero()
    } else if cents.len() % 2 == 0 {
        Money::from_cents((cents[mid - 1] + cents[mid]) / 2)
    } else {
        Money::from_cents(cents[mid])
    }
}

fn category_shares(outflows: &[&Transaction], range: DateRange) -> BTreeMap<SpendingCategory, f64> {
    let mut totals: BTreeMap<SpendingCategory, i64> = BTreeMap::new();
    let mut all = 0i64;
    for txn in outflows.iter().filter(|t| range.contains(t.date)) {
        let cents = txn.outflow().cents();
        all += cents;
        if let Some(category) = txn.category {
            *totals.entry(category).or_default() += cents;
        }
    }
    if all == 0 {
        return BTreeMap::new();
    }
    totals
        .into_iter()
        .map(|(c, cents)| (c, cents as f64 / all as f64))
        .collect()
}

fn category_shifts(
    outflows: &[&Transaction],
    recent: DateRange,
    prior: DateRange,
) -> Vec<LifeEvent> {
    let before = category_shares(outflows, prior);
    if before.is_empty() {
        // Nothing to compare against
        return Vec::new();
    }

    category_shares(outflows, recent)
        .into_iter()
        .filter_map(|(category, recent_share)| {
            let prior_share = before.get(&category).copied().unwrap_or(0.0);
            if recent_share < MIN_RECENT_SHARE || recent_share < prior_share * SHIFT_MULTIPLE {
                return None;
            }
            let confidence = if recent_share >= prior_share * STRONG_SHIFT_MULTIPLE {
                0.7
            } else {
                0.5
            };
            Some(LifeEvent {
                kind: LifeEventKind::CategoryShift {
                    category,
                    recent_share,
                    prior_share,
                },
                confidence,
            })
        })
        .collect()
}

/// Per-day payback for this month's large purchases, capped by the baseline
fn payback(large: Money, target: NaiveDate, month: BillingMonth, baseline: Money) -> Money {
    if !large.is_positive() {
        return Money::zero();
    }
    let remaining = i64::from(month.days_in_month() - target.day() + 1);
    let per_day = Money::from_cents(large.cents() / remaining.max(1));
    per_day.min(baseline.scale(MAX_PAYBACK_SHARE)).max_zero()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserId;

    fn user() -> UserId {
        UserId::parse("alice").unwrap()
    }

    fn target() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 21).unwrap()
    }

    fn spend(days_ago: i64, dollars: i64, category: SpendingCategory, payee: &str) -> Transaction {
        Transaction::spend(
            user(),
            target() - Duration::days(days_ago),
            Money::from_dollars(dollars),
            category,
            payee,
        )
    }

    /// Steady groceries every few days across three months
    fn steady() -> Vec<Transaction> {
        (1..=30)
            .map(|i| spend(i * 3, 40, SpendingCategory::Groceries, "Grocer"))
            .collect()
    }

    #[tokio::test]
    async fn test_large_purchase_this_month_reduces_allowance() {
        let mut history = steady();
        // $900 on June 11, more than 10x the $40 median
        history.push(spend(10, 900, SpendingCategory::Shopping, "Furniture Barn"));
        let user = user();
        let ctx = SignalContext::new(&user, target(), &history, None, Money::from_dollars(100));

        let output = LifeEventSignal::new().compute(&ctx).await.unwrap();

        let SignalDetail::LifeEvent { events } = &output.detail else {
            panic!("unexpected detail {:?}", output.detail);
        };
        let large: Vec<_> = events
            .iter()
            .filter(|e| matches!(e.kind, LifeEventKind::LargePurchase { .. }))
            .collect();
        assert_eq!(large.len(), 1);
        assert_eq!(large[0].confidence, 0.9);

        // 900 over the 10 remaining June days is 90/day, capped at 25 of 100
        assert_eq!(output.adjustment, Adjustment::Delta(Money::from_dollars(-25)));
    }

    #[tokio::test]
    async fn test_category_shift_detected() {
        let mut history = steady();
        history.extend((1..=10).map(|d| spend(d, 30, SpendingCategory::Transport, "Rideshare")));
        let user = user();
        let ctx = SignalContext::new(&user, target(), &history, None, Money::from_dollars(100));

        let output = LifeEventSignal::new().compute(&ctx).await.unwrap();
        let SignalDetail::LifeEvent { events } = &output.detail else {
            panic!("unexpected detail {:?}", output.detail);
        };
        assert!(events.iter().any(|e| matches!(
            e.kind,
            LifeEventKind::CategoryShift {
                category: SpendingCategory::Transport,
                ..
            }
        )));
        // No large purchases this month, so no payback
        assert_eq!(output.adjustment, Adjustment::Delta(Money::zero()));
    }

    #[tokio::test]
    async fn test_few_outflows_is_an_error() {
        let history: Vec<_> = steady().into_iter().take(4).collect();
        let user = user();
        let ctx = SignalContext::new(&user, target(), &history, None, Money::from_dollars(100));

        let err = LifeEventSignal::new().compute(&ctx).await.unwrap_err();
        assert_eq!(
            err,
            SignalError::InsufficientHistory {
                kind: SignalKind::LifeEvent,
                needed: MIN_OUTFLOWS,
                found: 4
            }
        );
    }

    #[test]
    fn test_median_of_even_count() {
        let txns = [
            spend(1, 10, SpendingCategory::Dining, "a"),
            spend(2, 20, SpendingCategory::Dining, "b"),
            spend(3, 40, SpendingCategory::Dining, "c"),
            spend(4, 100, SpendingCategory::Dining, "d"),
        ];
        let refs: Vec<&Transaction> = txns.iter().collect();
        assert_eq!(median_outflow(&refs), Money::from_dollars(30));
    }
}
