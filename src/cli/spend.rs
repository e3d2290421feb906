//! Spend CLI command
//!
//! Records a purchase (or refund) against the plan and reports any automatic
//! redistribution it triggered.

use chrono::NaiveDate;
use clap::Args;

use super::parse_money;
use crate::config::Settings;
use crate::display::format_redistribution;
use crate::error::{AllowanceError, AllowanceResult};
use crate::models::{SpendingCategory, Transaction, UserId};
use crate::services::BudgetOrchestrator;

#[derive(Args)]
pub struct SpendArgs {
    /// Amount spent (e.g., "12.50")
    pub amount: String,
    /// Spending category (groceries, dining, transport, entertainment, shopping, personal)
    pub category: String,
    /// Payee name
    #[arg(short, long)]
    pub payee: Option<String>,
    /// Transaction date (YYYY-MM-DD), defaults to today
    #[arg(short, long)]
    pub date: Option<NaiveDate>,
    /// Memo
    #[arg(short, long)]
    pub memo: Option<String>,
    /// Record money coming back instead of going out
    #[arg(long)]
    pub refund: bool,
}

pub async fn handle_spend_command(
    orchestrator: &BudgetOrchestrator<'_>,
    settings: &Settings,
    user_id: &UserId,
    args: SpendArgs,
    today: NaiveDate,
) -> AllowanceResult<()> {
    let amount = parse_money(&args.amount)?;
    if !amount.is_positive() {
        return Err(AllowanceError::Validation(
            "Amount must be greater than zero".into(),
        ));
    }
    let category: SpendingCategory = args.category.parse().map_err(AllowanceError::Validation)?;
    let date = args.date.unwrap_or(today);

    let mut txn = Transaction::spend(
        user_id.clone(),
        date,
        amount,
        category,
        args.payee.unwrap_or_default(),
    );
    if args.refund {
        txn.amount = amount;
    }
    txn.memo = args.memo.unwrap_or_default();

    let outcome = orchestrator.record_spend(txn, today).await?;
    let record = &outcome.record;

    println!(
        "Recorded {} {} on {}.",
        if args.refund { "refund of" } else { "spend of" },
        amount.format_with_symbol(&settings.currency_symbol),
        date
    );
    match &record.entry {
        Some(entry) => println!(
            "{} for {}: {} of {} spent.",
            category.label(),
            date,
            entry.spent_amount.format_with_symbol(&settings.currency_symbol),
            entry.planned_amount.format_with_symbol(&settings.currency_symbol)
        ),
        None => println!("No plan for {}; kept in history only.", date),
    }
    if let Some(redistribution) = &outcome.redistribution {
        println!();
        println!("Overspend rebalanced across the rest of the month:");
        print!(
            "{}",
            format_redistribution(redistribution, &settings.currency_symbol)
        );
    }

    Ok(())
}
