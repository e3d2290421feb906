//! CSV import service
//!
//! Reads bank or card exports, maps columns to transactions, flags rows that
//! were already imported, and feeds the rest through the orchestrator so each
//! one updates the plan exactly like a manual spend.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use csv::{Reader, ReaderBuilder, StringRecord};

use crate::error::AllowanceResult;
use crate::models::{DateRange, Money, SpendingCategory, Transaction, UserId};
use crate::services::orchestrator::BudgetOrchestrator;
use crate::storage::BudgetStore;

const FALLBACK_DATE_FORMATS: [&str; 6] =
    ["%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y", "%d/%m/%Y", "%Y/%m/%d", "%m-%d-%Y"];

/// Column mapping configuration for CSV import
#[derive(Debug, Clone)]
pub struct ColumnMapping {
    pub date_column: usize,
    pub amount_column: usize,
    pub payee_column: Option<usize>,
    pub category_column: Option<usize>,
    pub memo_column: Option<usize>,
    /// Date format tried before the common fallbacks
    pub date_format: String,
    pub has_header: bool,
    pub delimiter: u8,
    /// Exports that list purchases as positive numbers
    pub invert_amounts: bool,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            date_column: 0,
            amount_column: 1,
            payee_column: Some(2),
            category_column: Some(3),
            memo_column: None,
            date_format: "%Y-%m-%d".to_string(),
            has_header: true,
            delimiter: b',',
            invert_amounts: false,
        }
    }
}

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_date_format(mut self, format: &str) -> Self {
        self.date_format = format.to_string();
        self
    }

    pub fn with_inverted_amounts(mut self, invert: bool) -> Self {
        self.invert_amounts = invert;
        self
    }

    /// Pick columns by header name, keeping defaults for anything not found
    pub fn from_headers(headers: &StringRecord) -> Self {
        let mut mapping = Self {
            payee_column: None,
            category_column: None,
            ..Self::default()
        };

        for (idx, header) in headers.iter().enumerate() {
            match header.trim().to_lowercase().as_str() {
                "date" | "transaction date" | "posted" | "posting date" => mapping.date_column = idx,
                "amount" | "value" => mapping.amount_column = idx,
                "payee" | "description" | "merchant" | "name" => {
                    mapping.payee_column.get_or_insert(idx);
                }
                "category" | "type" => mapping.category_column = Some(idx),
                "memo" | "notes" | "note" => mapping.memo_column = Some(idx),
                _ => {}
            }
        }

        mapping
    }
}

/// A parsed row from the CSV before import
#[derive(Debug, Clone)]
pub struct ParsedTransaction {
    pub date: NaiveDate,
    /// Negative for outflow
    pub amount: Money,
    pub payee: String,
    pub category: Option<SpendingCategory>,
    pub memo: String,
    /// Data row number, starting at 1
    pub row_number: usize,
    pub import_id: String,
}

impl ParsedTransaction {
    /// Fingerprint used to skip rows imported before
    pub fn generate_import_id(date: NaiveDate, amount: Money, payee: &str) -> String {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        date.hash(&mut hasher);
        amount.cents().hash(&mut hasher);
        payee.trim().to_lowercase().hash(&mut hasher);
        format!("imp-{:016x}", hasher.finish())
    }

    pub fn into_transaction(self, user_id: UserId) -> Transaction {
        let mut txn = Transaction::new(user_id, self.date, self.amount);
        txn.payee = self.payee;
        txn.category = self.category;
        txn.memo = self.memo;
        txn.import_id = Some(self.import_id);
        txn
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportStatus {
    New,
    /// Already imported, or repeated earlier in the same file
    Duplicate,
    Error(String),
}

#[derive(Debug, Clone)]
pub struct ImportPreviewEntry {
    /// None when the row could not be parsed
    pub transaction: Option<ParsedTransaction>,
    pub row_number: usize,
    pub status: ImportStatus,
}

/// Result of a completed import
#[derive(Debug, Clone, Default)]
pub struct ImportResult {
    pub imported: usize,
    pub duplicates_skipped: usize,
    pub errors: usize,
    /// Automatic redistributions triggered by imported spends
    pub redistributions: usize,
    pub error_messages: HashMap<usize, String>,
}

pub struct ImportService<'a> {
    store: &'a dyn BudgetStore,
}

impl<'a> ImportService<'a> {
    pub fn new(store: &'a dyn BudgetStore) -> Self {
        Self { store }
    }

    /// Build a reader for `data` honouring the mapping's header and delimiter
    pub fn reader<R: std::io::Read>(data: R, mapping: &ColumnMapping) -> Reader<R> {
        ReaderBuilder::new()
            .has_headers(mapping.has_header)
            .delimiter(mapping.delimiter)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(data)
    }

    /// Parse every record; bad rows become `Err` with a message
    pub fn parse_csv_from_reader<R: std::io::Read>(
        &self,
        reader: &mut Reader<R>,
        mapping: &ColumnMapping,
    ) -> Vec<Result<ParsedTransaction, String>> {
        reader
            .records()
            .enumerate()
            .map(|(idx, record)| {
                let record = record.map_err(|e| format!("Error reading CSV record: {}", e))?;
                parse_record(&record, idx + 1, mapping)
            })
            .collect()
    }

    /// Mark each parsed row as new, duplicate or error
    pub fn generate_preview(
        &self,
        user_id: &UserId,
        parsed: Vec<Result<ParsedTransaction, String>>,
    ) -> AllowanceResult<Vec<ImportPreviewEntry>> {
        let dates: Vec<NaiveDate> = parsed.iter().flatten().map(|t| t.date).collect();
        let mut seen: HashSet<String> = match (dates.iter().min(), dates.iter().max()) {
            (Some(start), Some(end)) => self
                .store
                .load_transaction_history(user_id, DateRange::new(*start, *end))?
                .into_iter()
                .filter_map(|t| t.import_id)
                .collect(),
            _ => HashSet::new(),
        };

        Ok(parsed
            .into_iter()
            .enumerate()
            .map(|(idx, row)| match row {
                Ok(txn) => {
                    let status = if seen.insert(txn.import_id.clone()) {
                        ImportStatus::New
                    } else {
                        ImportStatus::Duplicate
                    };
                    ImportPreviewEntry {
                        row_number: txn.row_number,
                        transaction: Some(txn),
                        status,
                    }
                }
                Err(e) => ImportPreviewEntry {
                    transaction: None,
                    row_number: idx + 1,
                    status: ImportStatus::Error(e),
                },
            })
            .collect())
    }

    /// Record every new row through the orchestrator
    pub async fn import_from_preview(
        &self,
        orchestrator: &BudgetOrchestrator<'_>,
        user_id: &UserId,
        preview: Vec<ImportPreviewEntry>,
        today: NaiveDate,
    ) -> ImportResult {
        let mut result = ImportResult::default();

        for entry in preview {
            match (entry.status, entry.transaction) {
                (ImportStatus::New, Some(parsed)) => {
                    let txn = parsed.into_transaction(user_id.clone());
                    match orchestrator.record_spend(txn, today).await {
                        Ok(outcome) => {
                            result.imported += 1;
                            if outcome.redistribution.is_some() {
                                result.redistributions += 1;
                            }
                        }
                        Err(e) => {
                            tracing::warn!(row = entry.row_number, error = %e, "Import row rejected");
                            result.errors += 1;
                            result.error_messages.insert(entry.row_number, e.to_string());
                        }
                    }
                }
                (ImportStatus::Duplicate, _) => result.duplicates_skipped += 1,
                (ImportStatus::Error(e), _) => {
                    result.errors += 1;
                    result.error_messages.insert(entry.row_number, e);
                }
                (ImportStatus::New, None) => {
                    result.errors += 1;
                }
            }
        }

        tracing::info!(
            user = %user_id,
            imported = result.imported,
            duplicates = result.duplicates_skipped,
            errors = result.errors,
            "CSV import finished"
        );
        result
    }
}

fn parse_record(
    record: &StringRecord,
    row_number: usize,
    mapping: &ColumnMapping,
) -> Result<ParsedTransaction, String> {
    let date_str = record
        .get(mapping.date_column)
        .ok_or_else(|| "Missing date column".to_string())?;
    let date = parse_date(date_str, &mapping.date_format)?;

    let amount_str = record
        .get(mapping.amount_column)
        .ok_or_else(|| "Missing amount column".to_string())?;
    let mut amount = parse_amount(amount_str)?;
    if mapping.invert_amounts {
        amount = -amount;
    }

    let field = |col: Option<usize>| {
        col.and_then(|c| record.get(c))
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    };
    let payee = field(mapping.payee_column);
    let memo = field(mapping.memo_column);

    let category_str = field(mapping.category_column);
    let category = if category_str.is_empty() {
        None
    } else {
        Some(category_str.parse::<SpendingCategory>()?)
    };

    let import_id = ParsedTransaction::generate_import_id(date, amount, &payee);

    Ok(ParsedTransaction {
        date,
        amount,
        payee,
        category,
        memo,
        row_number,
        import_id,
    })
}

fn parse_date(s: &str, primary_format: &str) -> Result<NaiveDate, String> {
    let s = s.trim();
    std::iter::once(primary_format)
        .chain(FALLBACK_DATE_FORMATS)
        .find_map(|format| NaiveDate::parse_from_str(s, format).ok())
        .ok_or_else(|| format!("Could not parse date: '{}'", s))
}

/// Amounts may carry currency symbols, thousands separators, or accounting
/// parentheses for negatives
fn parse_amount(s: &str) -> Result<Money, String> {
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '(' | ')'))
        .collect();

    let (negative, value) = if cleaned.starts_with('(') && cleaned.ends_with(')') {
        (true, &cleaned[1..cleaned.len() - 1])
    } else if let Some(stripped) = cleaned.strip_prefix('-') {
        (true, stripped)
    } else {
        (false, cleaned.as_str())
    };

    Money::parse(value)
        .map(|m| if negative { -m } else { m })
        .map_err(|e| format!("Could not parse amount '{}': {}", s, e))
}
