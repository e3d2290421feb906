//! Budget CLI commands
//!
//! Daily allowance, monthly plan views and the month lifecycle.

use chrono::NaiveDate;

use super::parse_month;
use crate::config::Settings;
use crate::display::{format_daily_budget, format_events, format_month, format_redistribution};
use crate::error::AllowanceResult;
use crate::models::UserId;
use crate::services::BudgetOrchestrator;

/// Show the adjusted allowance for one day
pub async fn handle_daily_command(
    orchestrator: &BudgetOrchestrator<'_>,
    settings: &Settings,
    user_id: &UserId,
    date: NaiveDate,
    json: bool,
) -> AllowanceResult<()> {
    let response = orchestrator.daily_budget(user_id, date).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print!("{}", format_daily_budget(&response, &settings.currency_symbol));
    }
    Ok(())
}

/// Show a month's plan, creating it from the profile if needed
pub fn handle_month_command(
    orchestrator: &BudgetOrchestrator<'_>,
    settings: &Settings,
    user_id: &UserId,
    month: Option<&str>,
    detail: bool,
    today: NaiveDate,
) -> AllowanceResult<()> {
    let month = parse_month(month, today)?;
    let budget = orchestrator.ensure_budget(user_id, month)?;
    print!(
        "{}",
        format_month(&budget, today, detail, &settings.currency_symbol)
    );
    Ok(())
}

pub async fn handle_redistribute_command(
    orchestrator: &BudgetOrchestrator<'_>,
    settings: &Settings,
    user_id: &UserId,
    month: Option<&str>,
    strict: bool,
    today: NaiveDate,
) -> AllowanceResult<()> {
    let month = parse_month(month, today)?;
    let outcome = orchestrator
        .redistribute_budget(user_id, month, today)
        .await?;
    print!(
        "{}",
        format_redistribution(&outcome, &settings.currency_symbol)
    );
    if strict {
        outcome.ensure_covered()?;
    }
    Ok(())
}

pub async fn handle_close_command(
    orchestrator: &BudgetOrchestrator<'_>,
    user_id: &UserId,
    month: Option<&str>,
    today: NaiveDate,
) -> AllowanceResult<()> {
    let month = parse_month(month, today)?;
    let budget = orchestrator.close_month(user_id, month).await?;
    println!(
        "Closed {}: planned {}, spent {}.",
        budget.month,
        budget.total_planned(),
        budget.total_spent()
    );
    Ok(())
}

pub async fn handle_rollover_command(
    orchestrator: &BudgetOrchestrator<'_>,
    user_id: &UserId,
    today: NaiveDate,
) -> AllowanceResult<()> {
    let summary = orchestrator.roll_over(user_id, today).await?;

    if summary.closed.is_empty() {
        println!("No past months to close.");
    }
    for month in &summary.closed {
        println!("Closed {}", month);
    }
    if let Some(month) = summary.opened {
        println!("Opened {}", month);
    }
    Ok(())
}

pub fn handle_events_command(
    orchestrator: &BudgetOrchestrator<'_>,
    settings: &Settings,
    user_id: &UserId,
    month: Option<&str>,
    today: NaiveDate,
) -> AllowanceResult<()> {
    let month = month.map(|m| parse_month(Some(m), today)).transpose()?;
    let events = orchestrator.list_events(user_id, month)?;
    print!("{}", format_events(&events, &settings.currency_symbol));
    Ok(())
}
