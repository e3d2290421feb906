//! Flexible-spending categories
//!
//! The allowance covers day-to-day discretionary spending only, so the
//! category set is fixed rather than user-defined.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A day-to-day spending category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpendingCategory {
    Groceries,
    Dining,
    Transport,
    Entertainment,
    Shopping,
    Personal,
}

impl SpendingCategory {
    /// All categories in canonical order
    pub const ALL: [SpendingCategory; 6] = [
        Self::Groceries,
        Self::Dining,
        Self::Transport,
        Self::Entertainment,
        Self::Shopping,
        Self::Personal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Groceries => "groceries",
            Self::Dining => "dining",
            Self::Transport => "transport",
            Self::Entertainment => "entertainment",
            Self::Shopping => "shopping",
            Self::Personal => "personal",
        }
    }

    /// Display name
    pub fn label(&self) -> &'static str {
        match self {
            Self::Groceries => "Groceries",
            Self::Dining => "Dining Out",
            Self::Transport => "Transport",
            Self::Entertainment => "Entertainment",
            Self::Shopping => "Shopping",
            Self::Personal => "Personal",
        }
    }
}

impl fmt::Display for SpendingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SpendingCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "groceries" | "grocery" | "food" => Ok(Self::Groceries),
            "dining" | "dining out" | "restaurants" | "restaurant" => Ok(Self::Dining),
            "transport" | "transportation" | "travel" | "gas" => Ok(Self::Transport),
            "entertainment" | "fun" => Ok(Self::Entertainment),
            "shopping" => Ok(Self::Shopping),
            "personal" | "health" | "other" => Ok(Self::Personal),
            other => Err(format!("Unknown spending category: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("Food".parse(), Ok(SpendingCategory::Groceries));
        assert_eq!("restaurants".parse(), Ok(SpendingCategory::Dining));
        assert!("rent".parse::<SpendingCategory>().is_err());
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&SpendingCategory::Entertainment).unwrap();
        assert_eq!(json, "\"entertainment\"");
    }
}
