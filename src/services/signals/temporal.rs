//! Weekday spending pattern
//!
//! Compares the average spend on the target's weekday with the average
//! spend per day across the history window.

use async_trait::async_trait;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use std::collections::BTreeSet;

use super::{Adjustment, Signal, SignalContext, SignalDetail, SignalError, SignalKind, SignalOutput};

/// Distinct spending days needed before the pattern is trusted
pub const MIN_ACTIVE_DAYS: usize = 14;

const MIN_MULTIPLIER: f64 = 0.75;
const MAX_MULTIPLIER: f64 = 1.25;

/// Active days at which confidence saturates
const FULL_CONFIDENCE_DAYS: f64 = 60.0;

#[derive(Debug, Default)]
pub struct TemporalSignal;

impl TemporalSignal {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Signal for TemporalSignal {
    fn kind(&self) -> SignalKind {
        SignalKind::Temporal
    }

    async fn compute(&self, ctx: &SignalContext<'_>) -> Result<SignalOutput, SignalError> {
        let outflows: Vec<_> = ctx.outflows().collect();

        let active_days: BTreeSet<NaiveDate> = outflows.iter().map(|t| t.date).collect();
        if active_days.len() < MIN_ACTIVE_DAYS {
            return Err(SignalError::InsufficientHistory {
                kind: SignalKind::Temporal,
                needed: MIN_ACTIVE_DAYS,
                found: active_days.len(),
            });
        }

        let first = active_days.iter().next().copied().unwrap_or(ctx.target_date);
        let window: Vec<NaiveDate> = (0..)
            .map(|offset| first + Duration::days(offset))
            .take_while(|d| *d < ctx.target_date)
            .collect();

        let weekday = ctx.target_date.weekday();
        let total_cents: i64 = outflows.iter().map(|t| t.outflow().cents()).sum();
        let weekday_cents: i64 = outflows
            .iter()
            .filter(|t| t.date.weekday() == weekday)
            .map(|t| t.outflow().cents())
            .sum();
        let weekday_count = window.iter().filter(|d| d.weekday() == weekday).count();

        let overall_avg = total_cents as f64 / window.len().max(1) as f64;
        let raw_ratio = if overall_avg > 0.0 && weekday_count > 0 {
            (weekday_cents as f64 / weekday_count as f64) / overall_avg
        } else {
            1.0
        };
        let ratio = raw_ratio.clamp(MIN_MULTIPLIER, MAX_MULTIPLIER);

        let mut insights = Vec::new();
        let name = weekday_name(weekday);
        if raw_ratio >= 1.1 {
            insights.push(format!(
                "You usually spend {:.0}% more on {}s",
                (raw_ratio - 1.0) * 100.0,
                name
            ));
        } else if raw_ratio <= 0.9 {
            insights.push(format!(
                "You usually spend {:.0}% less on {}s",
                (1.0 - raw_ratio) * 100.0,
                name
            ));
        }

        Ok(SignalOutput {
            kind: SignalKind::Temporal,
            adjustment: Adjustment::Multiplier(ratio),
            confidence: (active_days.len() as f64 / FULL_CONFIDENCE_DAYS).min(1.0),
            insights,
            detail: SignalDetail::Temporal {
                weekday: name.to_string(),
                weekday_ratio: ratio,
                active_days: active_days.len(),
            },
        })
    }
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}
