//! Display formatting for terminal output
//!
//! Turns service results into text for the CLI. Tabular views go through
//! `tabled`; short summaries are plain aligned lines.

pub mod budget;
pub mod events;
pub mod profile;

pub use budget::{format_daily_budget, format_month, format_redistribution};
pub use events::format_events;
pub use profile::{format_classification, format_profile, format_profile_history};

/// Render a 0..=1 score as a percentage
pub(crate) fn percent(value: f64) -> String {
    format!("{:.0}%", value * 100.0)
}
