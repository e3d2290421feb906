//! Billing month representation
//!
//! A budget always covers one calendar month; day counts come from the real
//! calendar (28–31), never a fixed 30.

use chrono::{Datelike, Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A calendar month used as the billing cycle (e.g. "2025-01")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BillingMonth {
    pub year: i32,
    pub month: u32,
}

impl BillingMonth {
    /// Create a billing month, validating the month number
    pub fn new(year: i32, month: u32) -> Result<Self, PeriodParseError> {
        if !(1..=12).contains(&month) {
            return Err(PeriodParseError::InvalidMonth(month));
        }
        Ok(Self { year, month })
    }

    /// The month containing a date
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// The current month in local time
    pub fn current() -> Self {
        Self::containing(Local::now().date_naive())
    }

    /// First day of the month
    pub fn start_date(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Last day of the month (inclusive)
    pub fn end_date(&self) -> NaiveDate {
        self.next().start_date() - Duration::days(1)
    }

    /// Actual number of days in this month
    pub fn days_in_month(&self) -> u32 {
        self.end_date().day()
    }

    /// Every date of the month in ascending order
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let start = self.start_date();
        (0..self.days_in_month() as i64).map(move |offset| start + Duration::days(offset))
    }

    /// Check if a date falls within this month
    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn prev(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// Parse a month string
    ///
    /// Formats: "2025-01", "current", "last"/"prev", "next"
    pub fn parse(s: &str) -> Result<Self, PeriodParseError> {
        Self::parse_relative(s, Self::current())
    }

    /// Parse a month string, resolving relative words against `anchor`
    pub fn parse_relative(s: &str, anchor: Self) -> Result<Self, PeriodParseError> {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "current" | "this" | "now" => return Ok(anchor),
            "last" | "prev" | "previous" => return Ok(anchor.prev()),
            "next" => return Ok(anchor.next()),
            _ => {}
        }

        let parts: Vec<&str> = s.split('-').collect();
        if parts.len() == 2 {
            let year: i32 = parts[0]
                .parse()
                .map_err(|_| PeriodParseError::InvalidFormat(s.to_string()))?;
            let month: u32 = parts[1]
                .parse()
                .map_err(|_| PeriodParseError::InvalidFormat(s.to_string()))?;
            return Self::new(year, month);
        }

        Err(PeriodParseError::InvalidFormat(s.to_string()))
    }
}

impl fmt::Display for BillingMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Inclusive date range used for transaction history queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// The `days` days ending on (and including) `end`
    pub fn trailing(end: NaiveDate, days: i64) -> Self {
        Self {
            start: end - Duration::days(days.max(1) - 1),
            end,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// Error type for period parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeriodParseError {
    InvalidFormat(String),
    InvalidMonth(u32),
}

impl fmt::Display for PeriodParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodParseError::InvalidFormat(s) => write!(f, "Invalid month format: {}", s),
            PeriodParseError::InvalidMonth(m) => write!(f, "Invalid month: {}", m),
        }
    }
}

impl std::error::Error for PeriodParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_bounds() {
        let jan = BillingMonth::new(2025, 1).unwrap();
        assert_eq!(jan.start_date(), NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(jan.end_date(), NaiveDate::from_ymd_opt(2025, 1, 31).unwrap());
    }

    #[test]
    fn test_days_in_month_uses_calendar() {
        assert_eq!(BillingMonth::new(2024, 2).unwrap().days_in_month(), 29);
        assert_eq!(BillingMonth::new(2025, 2).unwrap().days_in_month(), 28);
        assert_eq!(BillingMonth::new(2025, 4).unwrap().days_in_month(), 30);
        assert_eq!(BillingMonth::new(2025, 4).unwrap().days().count(), 30);
    }

    #[test]
    fn test_navigation_wraps_year() {
        let dec = BillingMonth::new(2024, 12).unwrap();
        assert_eq!(dec.next(), BillingMonth::new(2025, 1).unwrap());
        assert_eq!(dec.next().prev(), dec);
    }

    #[test]
    fn test_parse() {
        let anchor = BillingMonth::new(2025, 3).unwrap();
        assert_eq!(
            BillingMonth::parse_relative("2025-01", anchor).unwrap(),
            BillingMonth::new(2025, 1).unwrap()
        );
        assert_eq!(BillingMonth::parse_relative("last", anchor).unwrap(), anchor.prev());
        assert_eq!(
            BillingMonth::parse_relative("2025-13", anchor),
            Err(PeriodParseError::InvalidMonth(13))
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(BillingMonth::new(2025, 1).unwrap().to_string(), "2025-01");
    }

    #[test]
    fn test_trailing_range() {
        let end = NaiveDate::from_ymd_opt(2025, 1, 30).unwrap();
        let range = DateRange::trailing(end, 30);
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert!(range.contains(end));
    }
}
