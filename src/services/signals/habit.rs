//! Recurring small-purchase habits
//!
//! A habit is a payee with several small purchases inside the trailing
//! window. The more of recent spending goes to habits, the more the daily
//! allowance is corrected downward.

use async_trait::async_trait;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{Adjustment, Signal, SignalContext, SignalDetail, SignalError, SignalKind, SignalOutput};
use crate::models::{DateRange, Money};

/// Days of history the detector looks at
pub const WINDOW_DAYS: i64 = 30;

/// Purchases needed at one payee to count as a habit
pub const MIN_OCCURRENCES: usize = 4;

/// Largest purchase that counts toward a habit
pub fn habit_ceiling() -> Money {
    Money::from_dollars(25)
}

/// Full-risk multiplier is 1 - MAX_CORRECTION
const MAX_CORRECTION: f64 = 0.2;

const INSIGHT_LIMIT: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HabitPattern {
    /// Normalized payee
    pub payee: String,
    pub occurrences: usize,
    pub total: Money,
    pub average: Money,
}

#[derive(Debug, Default)]
pub struct HabitSignal;

impl HabitSignal {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Signal for HabitSignal {
    fn kind(&self) -> SignalKind {
        SignalKind::Habit
    }

    async fn compute(&self, ctx: &SignalContext<'_>) -> Result<SignalOutput, SignalError> {
        let window = DateRange::trailing(ctx.target_date - Duration::days(1), WINDOW_DAYS);
        let recent: Vec<_> = ctx.outflows().filter(|t| window.contains(t.date)).collect();
        if recent.is_empty() {
            return Err(SignalError::InsufficientHistory {
                kind: SignalKind::Habit,
                needed: 1,
                found: 0,
            });
        }

        let ceiling = habit_ceiling();
        let mut by_payee: HashMap<String, (usize, Money)> = HashMap::new();
        for txn in recent.iter().filter(|t| t.outflow() <= ceiling) {
            let key = txn.payee_key();
            if key.is_empty() {
                continue;
            }
            let slot = by_payee.entry(key).or_insert((0, Money::zero()));
            slot.0 += 1;
            slot.1 += txn.outflow();
        }

        let mut habits: Vec<HabitPattern> = by_payee
            .into_iter()
            .filter(|(_, (count, _))| *count >= MIN_OCCURRENCES)
            .map(|(payee, (occurrences, total))| HabitPattern {
                average: Money::from_cents(total.cents() / occurrences as i64),
                payee,
                occurrences,
                total,
            })
            .collect();
        // Largest spend first; payee breaks ties so output is stable
        habits.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.payee.cmp(&b.payee)));

        let window_total: Money = recent.iter().map(|t| t.outflow()).sum();
        let habit_total: Money = habits.iter().map(|h| h.total).sum();
        let risk = if window_total.is_positive() {
            (habit_total.as_decimal() / window_total.as_decimal()).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let insights = habits
            .iter()
            .take(INSIGHT_LIMIT)
            .map(|h| {
                format!(
                    "{} purchases at {} in the last {} days, {} total",
                    h.occurrences, h.payee, WINDOW_DAYS, h.total
                )
            })
            .collect();

        Ok(SignalOutput {
            kind: SignalKind::Habit,
            adjustment: Adjustment::Multiplier(1.0 - MAX_CORRECTION * risk),
            confidence: (recent.len() as f64 / WINDOW_DAYS as f64).min(1.0),
            insights,
            detail: SignalDetail::Habit { habits, risk },
        })
    }
}
