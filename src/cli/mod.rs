//! CLI command handlers
//!
//! This module contains the implementation of CLI commands,
//! bridging the clap argument parsing with the service layer.

pub mod audit;
pub mod budget;
pub mod import;
pub mod profile;
pub mod spend;

pub use audit::handle_audit_command;
pub use budget::{
    handle_close_command, handle_daily_command, handle_events_command, handle_month_command,
    handle_redistribute_command, handle_rollover_command,
};
pub use import::{handle_import_command, ImportArgs};
pub use profile::{handle_classify_command, handle_profile_command, ProfileCommands};
pub use spend::{handle_spend_command, SpendArgs};

use chrono::NaiveDate;

use crate::error::{AllowanceError, AllowanceResult};
use crate::models::{BillingMonth, Money};

/// Parse an amount argument like "12.50", "$1,200" or "40"
pub(crate) fn parse_money(input: &str) -> AllowanceResult<Money> {
    Money::parse(input).map_err(|e| AllowanceError::Validation(e.to_string()))
}

/// Resolve a month argument ("2025-04", "last", ...) relative to `today`
pub(crate) fn parse_month(input: Option<&str>, today: NaiveDate) -> AllowanceResult<BillingMonth> {
    let anchor = BillingMonth::containing(today);
    match input {
        Some(s) => BillingMonth::parse_relative(s, anchor)
            .map_err(|e| AllowanceError::Validation(e.to_string())),
        None => Ok(anchor),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_month_relative_to_today() {
        let today = NaiveDate::from_ymd_opt(2025, 1, 20).unwrap();
        assert_eq!(
            parse_month(None, today).unwrap(),
            BillingMonth::new(2025, 1).unwrap()
        );
        assert_eq!(
            parse_month(Some("last"), today).unwrap(),
            BillingMonth::new(2024, 12).unwrap()
        );
        assert!(parse_month(Some("someday"), today).unwrap_err().is_validation());
    }

    #[test]
    fn test_parse_money_rejects_garbage() {
        assert_eq!(parse_money("$1,200").unwrap(), Money::from_dollars(1_200));
        assert!(parse_money("lots").is_err());
    }
}
