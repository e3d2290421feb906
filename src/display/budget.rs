//! Daily allowance and monthly plan display
//!
//! The daily view leads with the number the user acts on, then explains it:
//! per-category split, what each signal did, and insights.

use chrono::NaiveDate;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use super::percent;
use crate::models::{Money, MonthlyBudget};
use crate::services::signals::Adjustment;
use crate::services::{DailyBudgetResponse, RedistributionOutcome};

#[derive(Tabled)]
struct CategoryRow {
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Allowance")]
    allowance: String,
    #[tabled(rename = "Planned")]
    planned: String,
    #[tabled(rename = "Spent")]
    spent: String,
}

#[derive(Tabled)]
struct SignalRow {
    #[tabled(rename = "Signal")]
    signal: String,
    #[tabled(rename = "Adjustment")]
    adjustment: String,
    #[tabled(rename = "Confidence")]
    confidence: String,
}

pub fn format_daily_budget(response: &DailyBudgetResponse, symbol: &str) -> String {
    let money = |m: Money| m.format_with_symbol(symbol);
    let mut output = String::new();

    output.push_str(&format!(
        "Daily allowance for {} on {}\n",
        response.user_id,
        response.date.format("%A %Y-%m-%d")
    ));
    output.push_str(&"=".repeat(44));
    output.push('\n');
    output.push_str(&format!("  Allowance:   {}\n", money(response.daily_budget)));
    output.push_str(&format!("  Baseline:    {}\n", money(response.baseline)));
    output.push_str(&format!("  Spent today: {}\n", money(response.spent_today)));
    output.push_str(&format!("  Remaining:   {}\n", money(response.remaining_today)));
    output.push_str(&format!(
        "  Tier:        {} ({})\n",
        response.classification.primary_tier, response.classification.region
    ));
    output.push_str(&format!(
        "  Confidence:  {}   Risk: {}\n",
        percent(response.confidence),
        percent(response.risk_score)
    ));

    if !response.category_allocations.is_empty() {
        let rows = response.category_allocations.iter().map(|a| CategoryRow {
            category: a.category.label().to_string(),
            allowance: money(a.amount),
            planned: money(a.planned),
            spent: money(a.spent),
        });
        output.push('\n');
        output.push_str(&Table::new(rows).with(Style::rounded()).to_string());
        output.push('\n');
    }

    let snapshot = &response.signals;
    let mut rows: Vec<SignalRow> = snapshot
        .outputs
        .iter()
        .map(|o| SignalRow {
            signal: o.kind.to_string(),
            adjustment: match o.adjustment {
                Adjustment::Multiplier(m) => format!("x{:.2}", m),
                Adjustment::Delta(d) => money(d),
            },
            confidence: percent(o.confidence),
        })
        .collect();
    rows.extend(snapshot.failures.iter().map(|f| SignalRow {
        signal: f.kind.to_string(),
        adjustment: "skipped".to_string(),
        confidence: "-".to_string(),
    }));
    if !rows.is_empty() {
        output.push('\n');
        output.push_str(&Table::new(rows).with(Style::rounded()).to_string());
        output.push('\n');
    }

    if !response.insights.is_empty() {
        output.push_str("\nInsights:\n");
        for insight in &response.insights {
            output.push_str(&format!("  - {}\n", insight));
        }
    }

    output
}

#[derive(Tabled)]
struct DayRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Planned")]
    planned: String,
    #[tabled(rename = "Spent")]
    spent: String,
    #[tabled(rename = "Available")]
    available: String,
    #[tabled(rename = "")]
    flag: String,
}

#[derive(Tabled)]
struct EntryRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Baseline")]
    baseline: String,
    #[tabled(rename = "Planned")]
    planned: String,
    #[tabled(rename = "Spent")]
    spent: String,
}

/// Month header plus one row per day, or per entry when `detail` is set
pub fn format_month(
    budget: &MonthlyBudget,
    today: NaiveDate,
    detail: bool,
    symbol: &str,
) -> String {
    let money = |m: Money| m.format_with_symbol(symbol);
    let mut output = String::new();

    output.push_str(&format!("Budget {} for {}\n", budget.month, budget.user_id));
    output.push_str(&"=".repeat(44));
    output.push('\n');
    output.push_str(&format!("  State:    {}\n", budget.state));
    output.push_str(&format!("  Income:   {}\n", money(budget.monthly_income)));
    output.push_str(&format!(
        "  Flexible: {} ({})\n",
        money(budget.monthly_flexible_budget),
        percent(budget.flexible_ratio)
    ));
    output.push_str(&format!("  Spent:    {}\n", money(budget.total_spent())));
    output.push('\n');

    let table = if detail {
        let rows = budget.entries.iter().map(|e| EntryRow {
            date: e.date.format("%m-%d").to_string(),
            category: e.category.as_str().to_string(),
            baseline: money(e.baseline_amount),
            planned: money(e.planned_amount),
            spent: money(e.spent_amount),
        });
        Table::new(rows).with(Style::rounded()).to_string()
    } else {
        let rows = budget.month.days().map(|date| {
            let planned = budget.planned_for(date);
            let spent = budget.spent_for(date);
            let flag = if date == today {
                "today"
            } else if spent > planned {
                "over"
            } else {
                ""
            };
            DayRow {
                date: date.format("%a %m-%d").to_string(),
                planned: money(planned),
                spent: money(spent),
                available: money(planned - spent),
                flag: flag.to_string(),
            }
        });
        Table::new(rows).with(Style::rounded()).to_string()
    };
    output.push_str(&table);
    output.push('\n');

    output
}

pub fn format_redistribution(outcome: &RedistributionOutcome, symbol: &str) -> String {
    if outcome.transfers_applied == 0 && outcome.success {
        return "Nothing to redistribute.\n".to_string();
    }

    let mut output = format!("Transfers applied: {}\n", outcome.transfers_applied);
    if outcome.crisis {
        output.push_str("Spending exceeds what is left; remaining days were reduced.\n");
    }
    if outcome.shortfall.is_positive() {
        output.push_str(&format!(
            "Uncovered shortfall: {}\n",
            outcome.shortfall.format_with_symbol(symbol)
        ));
    }
    output
}
