//! Signal aggregation
//!
//! Runs every registered signal against one context and folds the results
//! into a single adjusted daily number with confidence and risk scores.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use super::{
    Adjustment, HabitSignal, LifeEventSignal, Signal, SignalContext, SignalDetail, SignalError,
    SignalKind, SignalOutput, TemporalSignal, VelocitySignal,
};
use crate::config::Settings;
use crate::models::Money;

const BASE_CONFIDENCE: f64 = 0.5;
const COVERAGE_WEIGHT: f64 = 0.2;

const HABIT_RISK_WEIGHT: f64 = 0.4;
const VELOCITY_RISK: f64 = 0.3;
const LIFE_EVENT_RISK_WEIGHT: f64 = 0.1;

/// Confidence bonus for the amount of spending history available
fn history_bonus(outflows: usize) -> f64 {
    match outflows {
        n if n >= 100 => 0.3,
        n if n >= 50 => 0.2,
        n if n >= 20 => 0.1,
        _ => 0.0,
    }
}

/// A signal that produced nothing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalFailure {
    pub kind: SignalKind,
    pub error: String,
}

/// Result of one aggregation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSnapshot {
    pub baseline: Money,
    /// Applied multipliers by signal
    pub multipliers: BTreeMap<SignalKind, f64>,
    /// Sum of all flat adjustments
    pub delta: Money,
    pub outputs: Vec<SignalOutput>,
    pub failures: Vec<SignalFailure>,
    pub confidence: f64,
    pub risk_score: f64,
    pub insights: Vec<String>,
    /// Baseline after every adjustment, never negative
    pub adjusted_daily: Money,
}

impl SignalSnapshot {
    pub fn output(&self, kind: SignalKind) -> Option<&SignalOutput> {
        self.outputs.iter().find(|o| o.kind == kind)
    }

    pub fn succeeded(&self) -> usize {
        self.outputs.len()
    }
}

pub struct SignalAggregator {
    signals: Vec<Box<dyn Signal>>,
    timeout: Duration,
}

impl SignalAggregator {
    /// Create an aggregator with the built-in signals
    pub fn new(timeout: Duration) -> Self {
        let mut aggregator = Self::empty(timeout);

        aggregator.register(Box::new(TemporalSignal::new()));
        aggregator.register(Box::new(VelocitySignal::new()));
        aggregator.register(Box::new(HabitSignal::new()));
        aggregator.register(Box::new(LifeEventSignal::new()));

        aggregator
    }

    /// Create an aggregator with no signals registered
    pub fn empty(timeout: Duration) -> Self {
        Self {
            signals: Vec::new(),
            timeout,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.signal_timeout())
    }

    pub fn register(&mut self, signal: Box<dyn Signal>) {
        self.signals.push(signal);
    }

    pub fn kinds(&self) -> Vec<SignalKind> {
        self.signals.iter().map(|s| s.kind()).collect()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run every signal and combine the results
    pub async fn aggregate(&self, ctx: &SignalContext<'_>) -> SignalSnapshot {
        let mut outputs = Vec::new();
        let mut failures = Vec::new();

        for signal in &self.signals {
            let kind = signal.kind();
            let result = match tokio::time::timeout(self.timeout, signal.compute(ctx)).await {
                Ok(result) => result,
                Err(_) => Err(SignalError::TimedOut {
                    kind,
                    millis: self.timeout.as_millis() as u64,
                }),
            };

            match result {
                Ok(output) => {
                    tracing::debug!(
                        signal = %kind,
                        confidence = output.confidence,
                        "Signal computed"
                    );
                    outputs.push(output);
                }
                Err(e) => {
                    tracing::warn!(signal = %kind, error = %e, "Signal skipped");
                    failures.push(SignalFailure {
                        kind,
                        error: e.to_string(),
                    });
                }
            }
        }

        outputs.sort_by_key(|o| o.kind);

        let mut adjusted = ctx.baseline;
        let mut multipliers = BTreeMap::new();
        for output in &outputs {
            if let Adjustment::Multiplier(m) = output.adjustment {
                adjusted = adjusted.scale(m);
                multipliers.insert(output.kind, m);
            }
        }
        let delta: Money = outputs
            .iter()
            .filter_map(|o| match o.adjustment {
                Adjustment::Delta(d) => Some(d),
                Adjustment::Multiplier(_) => None,
            })
            .sum();
        let adjusted_daily = (adjusted + delta).max_zero();

        let coverage = if self.signals.is_empty() {
            0.0
        } else {
            outputs.len() as f64 / self.signals.len() as f64
        };
        let confidence = (BASE_CONFIDENCE
            + history_bonus(ctx.outflows().count())
            + COVERAGE_WEIGHT * coverage)
            .clamp(0.0, 1.0);

        let risk_score = risk_score(&outputs);
        let insights = outputs.iter().flat_map(|o| o.insights.clone()).collect();

        SignalSnapshot {
            baseline: ctx.baseline,
            multipliers,
            delta,
            outputs,
            failures,
            confidence,
            risk_score,
            insights,
            adjusted_daily,
        }
    }
}

fn risk_score(outputs: &[SignalOutput]) -> f64 {
    let risk: f64 = outputs
        .iter()
        .map(|o| match &o.detail {
            SignalDetail::Habit { risk, .. } => risk * HABIT_RISK_WEIGHT,
            SignalDetail::Velocity { mode, .. } if mode.is_elevated() => VELOCITY_RISK,
            SignalDetail::LifeEvent { events } => events
                .iter()
                .map(|e| e.confidence * LIFE_EVENT_RISK_WEIGHT)
                .sum(),
            _ => 0.0,
        })
        .sum();
    risk.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SpendingCategory, Transaction, UserId};
    use crate::services::signals::{LifeEvent, LifeEventKind, VelocityMode};
    use async_trait::async_trait;
    use chrono::NaiveDate;

    struct Fixed {
        kind: SignalKind,
        adjustment: Adjustment,
        detail: SignalDetail,
    }

    #[async_trait]
    impl Signal for Fixed {
        fn kind(&self) -> SignalKind {
            self.kind
        }

        async fn compute(&self, _ctx: &SignalContext<'_>) -> Result<SignalOutput, SignalError> {
            Ok(SignalOutput {
                kind: self.kind,
                adjustment: self.adjustment,
                confidence: 1.0,
                insights: vec![format!("{} insight", self.kind)],
                detail: self.detail.clone(),
            })
        }
    }

    struct Broken;

    #[async_trait]
    impl Signal for Broken {
        fn kind(&self) -> SignalKind {
            SignalKind::Habit
        }

        async fn compute(&self, _ctx: &SignalContext<'_>) -> Result<SignalOutput, SignalError> {
            Err(SignalError::Failed {
                kind: SignalKind::Habit,
                message: "boom".into(),
            })
        }
    }

    struct Slow;

    #[async_trait]
    impl Signal for Slow {
        fn kind(&self) -> SignalKind {
            SignalKind::Temporal
        }

        async fn compute(&self, _ctx: &SignalContext<'_>) -> Result<SignalOutput, SignalError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Err(SignalError::Failed {
                kind: SignalKind::Temporal,
                message: "unreachable".into(),
            })
        }
    }

    fn velocity(multiplier: f64, mode: VelocityMode) -> Box<dyn Signal> {
        Box::new(Fixed {
            kind: SignalKind::Velocity,
            adjustment: Adjustment::Multiplier(multiplier),
            detail: SignalDetail::Velocity {
                mode,
                pace_ratio: 1.0,
                spent_to_date: Money::zero(),
                planned_to_date: Money::zero(),
                projected_month_spend: Money::zero(),
            },
        })
    }

    fn delta(dollars: i64) -> Box<dyn Signal> {
        Box::new(Fixed {
            kind: SignalKind::LifeEvent,
            adjustment: Adjustment::Delta(Money::from_dollars(dollars)),
            detail: SignalDetail::LifeEvent { events: Vec::new() },
        })
    }

    fn habit(risk: f64) -> Box<dyn Signal> {
        Box::new(Fixed {
            kind: SignalKind::Habit,
            adjustment: Adjustment::Multiplier(1.0),
            detail: SignalDetail::Habit {
                habits: Vec::new(),
                risk,
            },
        })
    }

    fn life_events(confidences: &[f64]) -> Box<dyn Signal> {
        let events = confidences
            .iter()
            .map(|&confidence| LifeEvent {
                kind: LifeEventKind::LargePurchase {
                    payee: "furniture".into(),
                    amount: Money::from_dollars(900),
                    date: NaiveDate::from_ymd_opt(2025, 4, 2).unwrap(),
                },
                confidence,
            })
            .collect();
        Box::new(Fixed {
            kind: SignalKind::LifeEvent,
            adjustment: Adjustment::Delta(Money::zero()),
            detail: SignalDetail::LifeEvent { events },
        })
    }

    fn target() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, 10).unwrap()
    }

    /// `count` past spends plus an income and a spend on the target day,
    /// neither of which counts as history
    fn history(user: &UserId, count: usize) -> Vec<Transaction> {
        let mut txns: Vec<Transaction> = (0..count)
            .map(|i| {
                let date = target() - chrono::Days::new(1 + (i % 60) as u64);
                Transaction::spend(
                    user.clone(),
                    date,
                    Money::from_dollars(5),
                    SpendingCategory::Dining,
                    "Cafe",
                )
            })
            .collect();
        txns.push(Transaction::new(
            user.clone(),
            target() - chrono::Days::new(3),
            Money::from_dollars(4000),
        ));
        txns.push(Transaction::spend(
            user.clone(),
            target(),
            Money::from_dollars(5),
            SpendingCategory::Dining,
            "Cafe",
        ));
        txns
    }

    #[tokio::test]
    async fn test_multipliers_then_delta() {
        let mut aggregator = SignalAggregator::empty(Duration::from_millis(100));
        aggregator.register(delta(-10));
        aggregator.register(velocity(0.5, VelocityMode::Emergency));

        let user = UserId::parse("alice").unwrap();
        let ctx = SignalContext::new(&user, target(), &[], None, Money::from_dollars(75));
        let snapshot = aggregator.aggregate(&ctx).await;

        assert_eq!(snapshot.adjusted_daily, Money::from_cents(2_750));
        assert_eq!(snapshot.delta, Money::from_dollars(-10));
        assert_eq!(snapshot.multipliers.get(&SignalKind::Velocity), Some(&0.5));
        assert!((snapshot.confidence - 0.7).abs() < 1e-9);
        assert!((snapshot.risk_score - 0.3).abs() < 1e-9);
        // Insights follow signal order, not registration order
        assert_eq!(snapshot.insights, vec!["velocity insight", "life_event insight"]);
    }

    #[tokio::test]
    async fn test_failures_are_skipped() {
        let mut aggregator = SignalAggregator::empty(Duration::from_millis(20));
        aggregator.register(Box::new(Slow));
        aggregator.register(Box::new(Broken));
        aggregator.register(velocity(1.0, VelocityMode::Normal));

        let user = UserId::parse("alice").unwrap();
        let ctx = SignalContext::new(&user, target(), &[], None, Money::from_dollars(75));
        let snapshot = aggregator.aggregate(&ctx).await;

        assert_eq!(snapshot.adjusted_daily, Money::from_dollars(75));
        assert_eq!(snapshot.failures.len(), 2);
        assert_eq!(snapshot.failures[0].kind, SignalKind::Temporal);
        assert!(snapshot.failures[0].error.contains("timed out"));
        assert!((snapshot.confidence - (0.5 + 0.2 / 3.0)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_never_negative() {
        let mut aggregator = SignalAggregator::empty(Duration::from_millis(100));
        aggregator.register(delta(-500));

        let user = UserId::parse("alice").unwrap();
        let ctx = SignalContext::new(&user, target(), &[], None, Money::from_dollars(75));
        let snapshot = aggregator.aggregate(&ctx).await;
        assert!(snapshot.adjusted_daily.is_zero());
    }

    #[tokio::test]
    async fn test_builtins_degrade_without_history() {
        let aggregator = SignalAggregator::new(Duration::from_millis(250));
        assert_eq!(aggregator.kinds().len(), 4);

        let user = UserId::parse("alice").unwrap();
        let ctx = SignalContext::new(&user, target(), &[], None, Money::from_dollars(75));
        let snapshot = aggregator.aggregate(&ctx).await;

        assert_eq!(snapshot.failures.len(), 4);
        assert_eq!(snapshot.adjusted_daily, Money::from_dollars(75));
        assert!((snapshot.confidence - 0.5).abs() < 1e-9);
        assert_eq!(snapshot.risk_score, 0.0);
    }

    #[tokio::test]
    async fn test_confidence_grows_with_history() {
        let aggregator = SignalAggregator::empty(Duration::from_millis(100));
        let user = UserId::parse("alice").unwrap();

        let tiers = [(19, 0.5), (20, 0.6), (49, 0.6), (50, 0.7), (99, 0.7), (100, 0.8)];
        for (count, expected) in tiers {
            let txns = history(&user, count);
            let ctx = SignalContext::new(&user, target(), &txns, None, Money::from_dollars(75));
            let snapshot = aggregator.aggregate(&ctx).await;
            assert!(
                (snapshot.confidence - expected).abs() < 1e-9,
                "{} outflows gave {}",
                count,
                snapshot.confidence
            );
        }
    }

    #[tokio::test]
    async fn test_confidence_with_full_coverage_and_history() {
        let mut aggregator = SignalAggregator::empty(Duration::from_millis(100));
        aggregator.register(velocity(1.0, VelocityMode::Normal));

        let user = UserId::parse("alice").unwrap();
        let txns = history(&user, 150);
        let ctx = SignalContext::new(&user, target(), &txns, None, Money::from_dollars(75));
        let snapshot = aggregator.aggregate(&ctx).await;

        // 0.5 base + 0.3 history + 0.2 coverage
        assert!((snapshot.confidence - 1.0).abs() < 1e-9);
        assert_eq!(snapshot.risk_score, 0.0);
    }

    #[tokio::test]
    async fn test_risk_weights_habit_and_life_events() {
        let mut aggregator = SignalAggregator::empty(Duration::from_millis(100));
        aggregator.register(habit(0.5));
        aggregator.register(life_events(&[0.6, 0.9]));

        let user = UserId::parse("alice").unwrap();
        let ctx = SignalContext::new(&user, target(), &[], None, Money::from_dollars(75));
        let snapshot = aggregator.aggregate(&ctx).await;

        // 0.5 * 0.4 + (0.6 + 0.9) * 0.1
        assert!((snapshot.risk_score - 0.35).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_risk_is_capped_at_one() {
        let mut aggregator = SignalAggregator::empty(Duration::from_millis(100));
        aggregator.register(habit(1.0));
        aggregator.register(velocity(0.5, VelocityMode::Emergency));
        aggregator.register(life_events(&[1.0; 5]));

        let user = UserId::parse("alice").unwrap();
        let ctx = SignalContext::new(&user, target(), &[], None, Money::from_dollars(75));
        let snapshot = aggregator.aggregate(&ctx).await;

        // 0.4 + 0.3 + 0.5 before the cap
        assert_eq!(snapshot.risk_score, 1.0);
    }
}
