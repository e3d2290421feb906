//! Month-to-date spending pace
//!
//! Compares what was spent before the target date with what was planned for
//! those days and picks a spending mode from the ratio.

use async_trait::async_trait;
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{Adjustment, Signal, SignalContext, SignalDetail, SignalError, SignalKind, SignalOutput};
use crate::models::Money;

const RELAXED_BELOW: f64 = 0.8;
const REDUCTION_ABOVE: f64 = 1.2;
const EMERGENCY_ABOVE: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VelocityMode {
    /// Well under plan
    Relaxed,
    Normal,
    /// Running hot; trim the allowance
    Reduction,
    /// Far over plan; protect the rest of the month
    Emergency,
}

impl VelocityMode {
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio > EMERGENCY_ABOVE {
            Self::Emergency
        } else if ratio > REDUCTION_ABOVE {
            Self::Reduction
        } else if ratio < RELAXED_BELOW {
            Self::Relaxed
        } else {
            Self::Normal
        }
    }

    pub fn multiplier(&self) -> f64 {
        match self {
            Self::Relaxed => 1.05,
            Self::Normal => 1.0,
            Self::Reduction => 0.85,
            Self::Emergency => 0.6,
        }
    }

    /// Reduction and Emergency count toward the risk score
    pub fn is_elevated(&self) -> bool {
        matches!(self, Self::Reduction | Self::Emergency)
    }
}

impl fmt::Display for VelocityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Relaxed => write!(f, "relaxed"),
            Self::Normal => write!(f, "normal"),
            Self::Reduction => write!(f, "reduction"),
            Self::Emergency => write!(f, "emergency"),
        }
    }
}

#[derive(Debug, Default)]
pub struct VelocitySignal;

impl VelocitySignal {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Signal for VelocitySignal {
    fn kind(&self) -> SignalKind {
        SignalKind::Velocity
    }

    async fn compute(&self, ctx: &SignalContext<'_>) -> Result<SignalOutput, SignalError> {
        let budget = ctx
            .budget
            .filter(|b| b.month.contains(ctx.target_date))
            .ok_or(SignalError::MissingPlan(SignalKind::Velocity))?;

        let (planned_to_date, spent_to_date) = budget.to_date_totals(ctx.target_date);
        let days_elapsed = ctx.target_date.day() - 1;
        let days_in_month = budget.month.days_in_month();

        let (pace_ratio, confidence) = if planned_to_date.is_positive() {
            (
                spent_to_date.as_decimal() / planned_to_date.as_decimal(),
                (days_elapsed as f64 / days_in_month as f64).max(0.2),
            )
        } else {
            // First day of the month, or nothing planned yet
            (1.0, 0.2)
        };

        let mode = VelocityMode::from_ratio(pace_ratio);
        let projected_month_spend = if days_elapsed > 0 {
            spent_to_date.scale(days_in_month as f64 / days_elapsed as f64)
        } else {
            Money::zero()
        };

        let mut insights = Vec::new();
        match mode {
            VelocityMode::Emergency => insights.push(format!(
                "Spending is at {:.0}% of plan; today's allowance is cut hard",
                pace_ratio * 100.0
            )),
            VelocityMode::Reduction => insights.push(format!(
                "Spending is running {:.0}% over plan; today's allowance is trimmed",
                (pace_ratio - 1.0) * 100.0
            )),
            VelocityMode::Relaxed => insights.push(format!(
                "You're {:.0}% under plan so far this month",
                (1.0 - pace_ratio) * 100.0
            )),
            VelocityMode::Normal => {}
        }
        if days_elapsed > 0 && projected_month_spend > budget.monthly_flexible_budget {
            insights.push(format!(
                "At this pace you'll spend {} this month against {} planned",
                projected_month_spend, budget.monthly_flexible_budget
            ));
        }

        Ok(SignalOutput {
            kind: SignalKind::Velocity,
            adjustment: Adjustment::Multiplier(mode.multiplier()),
            confidence: confidence.min(1.0),
            insights,
            detail: SignalDetail::Velocity {
                mode,
                pace_ratio,
                spent_to_date,
                planned_to_date,
                projected_month_spend,
            },
        })
    }
}
