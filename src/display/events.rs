//! Redistribution event log display

use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::models::RedistributionEvent;

#[derive(Tabled)]
struct EventRow {
    #[tabled(rename = "When")]
    when: String,
    #[tabled(rename = "Month")]
    month: String,
    #[tabled(rename = "From")]
    from: String,
    #[tabled(rename = "To")]
    to: String,
    #[tabled(rename = "Amount")]
    amount: String,
    #[tabled(rename = "Reason")]
    reason: String,
}

pub fn format_events(events: &[RedistributionEvent], symbol: &str) -> String {
    if events.is_empty() {
        return "No redistribution events.\n".to_string();
    }

    let rows = events.iter().map(|e| EventRow {
        when: e.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
        month: e.month.to_string(),
        from: format!(
            "{} {}",
            e.transfer.from_day.format("%m-%d"),
            e.transfer.from_category.as_str()
        ),
        to: format!(
            "{} {}",
            e.transfer.to_day.format("%m-%d"),
            e.transfer.to_category.as_str()
        ),
        amount: e.transfer.amount.format_with_symbol(symbol),
        reason: e.transfer.reason.to_string(),
    });

    let mut output = Table::new(rows).with(Style::rounded()).to_string();
    output.push_str(&format!("\n{} transfer(s)\n", events.len()));
    output
}
