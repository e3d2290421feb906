//! Audit trail listing

use crate::audit::{AuditEntry, AuditLogger};
use crate::error::AllowanceResult;
use crate::models::UserId;

/// Print the user's most recent audit entries, oldest first
pub fn handle_audit_command(
    audit: &AuditLogger,
    user_id: &UserId,
    limit: usize,
) -> AllowanceResult<()> {
    let entries = recent_for_user(audit.read_all()?, user_id, limit);

    if entries.is_empty() {
        println!("No audit entries for {} in {}", user_id, audit.path().display());
        return Ok(());
    }

    for entry in &entries {
        println!("{}", entry.format_human_readable());
    }
    Ok(())
}

/// Entries about the user's profile or one of their budgets, last `limit` kept
fn recent_for_user(entries: Vec<AuditEntry>, user_id: &UserId, limit: usize) -> Vec<AuditEntry> {
    let budget_prefix = format!("{}:", user_id);
    let mut mine: Vec<AuditEntry> = entries
        .into_iter()
        .filter(|e| e.entity_id == user_id.as_str() || e.entity_id.starts_with(&budget_prefix))
        .collect();
    let start = mine.len().saturating_sub(limit);
    mine.drain(..start);
    mine
}
