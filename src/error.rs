//! Custom error types for the allowance engine
//!
//! This module defines the error hierarchy for the application using thiserror
//! for ergonomic error definitions.

use thiserror::Error;

use crate::models::plan::BudgetStateError;
use crate::models::Money;

/// The main error type for allowance engine operations
#[derive(Error, Debug)]
pub enum AllowanceError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// CSV parsing errors during import
    #[error("CSV error: {0}")]
    Csv(String),

    /// Validation errors for data models
    #[error("Validation error: {0}")]
    Validation(String),

    /// Income was negative or not a number
    #[error("Invalid income: {0}")]
    InvalidIncome(String),

    /// Region code has no threshold table (recovered by falling back to the default table)
    #[error("Unknown region: {0}")]
    UnknownRegion(String),

    /// A behavioral signal could not produce an adjustment
    #[error("Signal unavailable: {0}")]
    SignalUnavailable(String),

    /// Remaining days have nothing left to give and deficits remain
    #[error("No redistributable surplus: shortfall of {shortfall}")]
    NoRedistributableSurplus { shortfall: Money },

    /// Another redistribution is in flight for the same user
    #[error("Redistribution already in progress for user '{0}'")]
    ConcurrentRedistribution(String),

    /// A plan entry was modified since it was read
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Budget state machine rejected a transition
    #[error("Invalid budget state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    /// The month is closed and read-only
    #[error("Month {0} is closed")]
    MonthClosed(String),

    /// Entity not found errors
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    /// Storage errors
    #[error("Storage error: {0}")]
    Storage(String),
}

impl AllowanceError {
    /// Create a "not found" error for monthly budgets
    pub fn budget_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Monthly budget",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for user profiles
    pub fn profile_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Profile",
            identifier: identifier.into(),
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::InvalidIncome(_))
    }

    /// Check if this is an optimistic-concurrency conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

impl From<std::io::Error> for AllowanceError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AllowanceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<csv::Error> for AllowanceError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err.to_string())
    }
}

impl From<BudgetStateError> for AllowanceError {
    fn from(err: BudgetStateError) -> Self {
        Self::InvalidStateTransition {
            from: err.from.to_string(),
            to: err.to.to_string(),
        }
    }
}

/// Result type alias for allowance engine operations
pub type AllowanceResult<T> = Result<T, AllowanceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AllowanceError::Config("test error".into());
        assert_eq!(err.to_string(), "Configuration error: test error");
    }

    #[test]
    fn test_not_found_error() {
        let err = AllowanceError::profile_not_found("alice");
        assert_eq!(err.to_string(), "Profile not found: alice");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_shortfall_error() {
        let err = AllowanceError::NoRedistributableSurplus {
            shortfall: Money::from_cents(4500),
        };
        assert_eq!(
            err.to_string(),
            "No redistributable surplus: shortfall of $45.00"
        );
    }

    #[test]
    fn test_invalid_income_is_validation() {
        let err = AllowanceError::InvalidIncome("-10".into());
        assert!(err.is_validation());
        assert!(!err.is_conflict());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: AllowanceError = io_err.into();
        assert!(matches!(err, AllowanceError::Io(_)));
    }
}
