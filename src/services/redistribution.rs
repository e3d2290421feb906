//! Redistribution engine
//!
//! Rebalances the remaining days of a month so overspending is absorbed by
//! other entries while the month's planned total stays fixed to the cent.
//!
//! Entries dated before `today` never move. Remaining entries are grouped per
//! category (or pooled across categories) and each group is settled on its
//! own:
//!
//! - **Cover**: when the group's surplus can absorb its deficits, each deficit
//!   (earliest first) pulls from surplus entries earliest-first.
//! - **Crisis**: when deficits exceed surplus, the group's planned total is
//!   re-spread over every entry in proportion to its need
//!   (`max(spent, baseline)`). Need, spent and planned total are unchanged by
//!   the operation, so a second run yields the same amounts.
//!
//! The engine is pure: it works on copies and reports the changed entries and
//! the transfers that explain each change.

use chrono::NaiveDate;

use crate::config::{RedistributionScope, Settings};
use crate::models::{DailyPlanEntry, Money, RedistributionReason, SpendingCategory, Transfer};

/// Result of planning one redistribution
#[derive(Debug, Clone, Default)]
pub struct RedistributionPlan {
    /// Entries whose planned amount changed, with the new amount
    pub entries: Vec<DailyPlanEntry>,
    pub transfers: Vec<Transfer>,
    /// True when at least one group used the crisis policy
    pub crisis: bool,
    /// Deficit left uncovered in groups with nothing planned
    pub shortfall: Money,
}

impl RedistributionPlan {
    pub fn is_noop(&self) -> bool {
        self.transfers.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RedistributionEngine {
    scope: RedistributionScope,
}

impl RedistributionEngine {
    pub fn new(scope: RedistributionScope) -> Self {
        Self { scope }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.redistribution_scope)
    }

    /// Plan transfers for the entries dated `today` or later
    pub fn plan(&self, entries: &[DailyPlanEntry], today: NaiveDate) -> RedistributionPlan {
        let mut working: Vec<DailyPlanEntry> = entries
            .iter()
            .filter(|e| e.date >= today)
            .cloned()
            .collect();
        working.sort_by_key(|e| (e.date, e.category));

        let mut plan = RedistributionPlan::default();

        for group in self.groups(&working) {
            let surplus: Money = group.iter().map(|&i| working[i].surplus()).sum();
            let deficit: Money = group.iter().map(|&i| working[i].deficit()).sum();

            if deficit.is_zero() {
                continue;
            }

            if deficit <= surplus {
                cover_deficits(&mut working, &group, &mut plan.transfers);
                continue;
            }

            let planned: Money = group.iter().map(|&i| working[i].planned_amount).sum();
            if planned.is_zero() {
                plan.shortfall += deficit - surplus;
                continue;
            }

            plan.crisis = true;
            proportional_reduction(&mut working, &group, &mut plan.transfers);
        }

        plan.entries = working
            .into_iter()
            .filter(|w| {
                entries
                    .iter()
                    .find(|e| e.key() == w.key())
                    .map_or(false, |e| e.planned_amount != w.planned_amount)
            })
            .collect();

        plan
    }

    /// Indices into `working` (already sorted by date) for each group
    fn groups(&self, working: &[DailyPlanEntry]) -> Vec<Vec<usize>> {
        match self.scope {
            RedistributionScope::CrossCategory => vec![(0..working.len()).collect()],
            RedistributionScope::PerCategory => SpendingCategory::ALL
                .iter()
                .map(|category| {
                    working
                        .iter()
                        .enumerate()
                        .filter(|(_, e)| e.category == *category)
                        .map(|(i, _)| i)
                        .collect::<Vec<_>>()
                })
                .filter(|group| !group.is_empty())
                .collect(),
        }
    }
}

/// Pull surplus earliest-first into each deficit, earliest deficit first
fn cover_deficits(
    working: &mut [DailyPlanEntry],
    group: &[usize],
    transfers: &mut Vec<Transfer>,
) {
    let deficits: Vec<(usize, Money)> = group
        .iter()
        .map(|&i| (i, working[i].deficit()))
        .filter(|(_, d)| d.is_positive())
        .collect();
    let mut donors: Vec<(usize, Money)> = group
        .iter()
        .map(|&i| (i, working[i].surplus()))
        .filter(|(_, s)| s.is_positive())
        .collect();

    let mut next_donor = 0;
    for (receiver, mut need) in deficits {
        while need.is_positive() && next_donor < donors.len() {
            let (donor, available) = &mut donors[next_donor];
            let amount = need.min(*available);

            move_planned(
                working,
                *donor,
                receiver,
                amount,
                RedistributionReason::CoverDeficit,
                transfers,
            );

            need -= amount;
            *available -= amount;
            if available.is_zero() {
                next_donor += 1;
            }
        }
    }
}

/// Re-spread the group's planned total by need and settle the differences
fn proportional_reduction(
    working: &mut [DailyPlanEntry],
    group: &[usize],
    transfers: &mut Vec<Transfer>,
) {
    let total: Money = group.iter().map(|&i| working[i].planned_amount).sum();
    let needs: Vec<i64> = group
        .iter()
        .map(|&i| working[i].spent_amount.max(working[i].baseline_amount).cents())
        .collect();
    let targets = total.apportion(&needs);

    let mut givers: Vec<(usize, Money)> = Vec::new();
    let mut takers: Vec<(usize, Money)> = Vec::new();
    for (&i, target) in group.iter().zip(targets) {
        let delta = target - working[i].planned_amount;
        if delta.is_negative() {
            givers.push((i, -delta));
        } else if delta.is_positive() {
            takers.push((i, delta));
        }
    }

    let mut next_giver = 0;
    for (receiver, mut need) in takers {
        while need.is_positive() && next_giver < givers.len() {
            let (donor, available) = &mut givers[next_giver];
            let amount = need.min(*available);

            move_planned(
                working,
                *donor,
                receiver,
                amount,
                RedistributionReason::ProportionalReduction,
                transfers,
            );

            need -= amount;
            *available -= amount;
            if available.is_zero() {
                next_giver += 1;
            }
        }
    }
}

fn move_planned(
    working: &mut [DailyPlanEntry],
    from: usize,
    to: usize,
    amount: Money,
    reason: RedistributionReason,
    transfers: &mut Vec<Transfer>,
) {
    if !amount.is_positive() {
        return;
    }
    working[from].planned_amount -= amount;
    working[to].planned_amount += amount;
    transfers.push(Transfer {
        from_day: working[from].date,
        from_category: working[from].category,
        to_day: working[to].date,
        to_category: working[to].category,
        amount,
        reason,
    });
}

/// Apply a plan's changed entries onto a full entry list
pub fn apply_plan(entries: &mut [DailyPlanEntry], plan: &RedistributionPlan) {
    for changed in &plan.entries {
        if let Some(entry) = entries.iter_mut().find(|e| e.key() == changed.key()) {
            entry.planned_amount = changed.planned_amount;
        }
    }
}
