//! CLI command handler for CSV import
//!
//! Handles importing transactions from CSV files with automatic
//! column mapping detection and duplicate checking.

use std::fs::File;
use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Args;

use crate::error::{AllowanceError, AllowanceResult};
use crate::models::UserId;
use crate::services::{BudgetOrchestrator, ColumnMapping, ImportService, ImportStatus};
use crate::storage::BudgetStore;

#[derive(Args)]
pub struct ImportArgs {
    /// Path to CSV file
    pub file: PathBuf,
    /// Date format tried first (chrono syntax, e.g. "%m/%d/%Y")
    #[arg(long)]
    pub date_format: Option<String>,
    /// The file lists purchases as positive amounts
    #[arg(long)]
    pub invert: bool,
    /// Show what would be imported without recording anything
    #[arg(long)]
    pub dry_run: bool,
}

/// Handle the import command
pub async fn handle_import_command(
    store: &dyn BudgetStore,
    orchestrator: &BudgetOrchestrator<'_>,
    user_id: &UserId,
    args: ImportArgs,
    today: NaiveDate,
) -> AllowanceResult<()> {
    let import_service = ImportService::new(store);

    if !args.file.exists() {
        return Err(AllowanceError::Csv(format!(
            "File not found: {}",
            args.file.display()
        )));
    }

    // Detect the mapping from the header row
    let mut reader = ImportService::reader(File::open(&args.file)?, &ColumnMapping::default());
    let mut mapping = ColumnMapping::from_headers(reader.headers()?);
    if let Some(format) = &args.date_format {
        mapping = mapping.with_date_format(format);
    }
    mapping = mapping.with_inverted_amounts(args.invert);

    let parsed = import_service.parse_csv_from_reader(&mut reader, &mapping);
    if parsed.is_empty() {
        println!("No transactions found in CSV file.");
        return Ok(());
    }

    let preview = import_service.generate_preview(user_id, parsed)?;

    let new_count = preview.iter().filter(|e| e.status == ImportStatus::New).count();
    let dup_count = preview
        .iter()
        .filter(|e| e.status == ImportStatus::Duplicate)
        .count();
    let err_count = preview
        .iter()
        .filter(|e| matches!(e.status, ImportStatus::Error(_)))
        .count();

    println!("Import Preview for '{}'", user_id);
    println!("{}", "=".repeat(40));
    println!("  New transactions:   {}", new_count);
    println!("  Duplicates (skip):  {}", dup_count);
    println!("  Errors:             {}", err_count);
    println!();

    if new_count == 0 {
        println!("No new transactions to import.");
        return Ok(());
    }
    if args.dry_run {
        for entry in preview.iter().filter(|e| e.status == ImportStatus::New) {
            if let Some(txn) = &entry.transaction {
                println!("  {} {:>10} {}", txn.date, txn.amount, txn.payee);
            }
        }
        return Ok(());
    }

    let result = import_service
        .import_from_preview(orchestrator, user_id, preview, today)
        .await;

    println!("Import Complete!");
    println!("  Imported:    {}", result.imported);
    println!("  Skipped:     {}", result.duplicates_skipped);
    if result.redistributions > 0 {
        println!("  Rebalanced:  {}", result.redistributions);
    }
    if !result.error_messages.is_empty() {
        println!("  Errors:      {}", result.errors);
        let mut rows: Vec<_> = result.error_messages.iter().collect();
        rows.sort();
        for (row, msg) in rows {
            println!("    Row {}: {}", row, msg);
        }
    }

    Ok(())
}
