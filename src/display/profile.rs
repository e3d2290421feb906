//! Profile and classification display

use tabled::settings::Style;
use tabled::{Table, Tabled};

use super::percent;
use crate::models::{IncomeClassification, UserFinancialProfile};

pub fn format_classification(classification: &IncomeClassification) -> String {
    let mut output = String::new();

    output.push_str(&format!("Annual income: {}\n", classification.annual_income));
    output.push_str(&format!("Region:        {}", classification.region));
    if classification.region_fallback {
        output.push_str(" (fallback)");
    }
    output.push('\n');
    output.push_str(&format!("Tier:          {}", classification.primary_tier));
    match classification.secondary_tier {
        Some(secondary) if classification.in_transition => output.push_str(&format!(
            " {} / {} {}\n",
            percent(classification.primary_weight),
            secondary,
            percent(classification.secondary_weight)
        )),
        _ => output.push('\n'),
    }

    output
}

pub fn format_profile(profile: &UserFinancialProfile) -> String {
    let mut output = String::new();

    output.push_str(&format!("User:           {}\n", profile.user_id));
    output.push_str(&format!("Monthly income: {}\n", profile.monthly_income));
    output.push_str(&format!(
        "Region:         {}\n",
        profile.region.as_deref().unwrap_or("(default)")
    ));
    output.push_str(&format!("Tier:           {}\n", profile.income_tier));
    if let Some(weights) = &profile.transition_weights {
        output.push_str(&format!(
            "Transition:     {} toward {}\n",
            percent(weights.secondary_weight),
            weights.secondary_tier
        ));
    }
    output.push_str(&format!("Version:        {}\n", profile.version));

    output
}

#[derive(Tabled)]
struct ProfileRow {
    #[tabled(rename = "Version")]
    version: u32,
    #[tabled(rename = "Income")]
    income: String,
    #[tabled(rename = "Region")]
    region: String,
    #[tabled(rename = "Tier")]
    tier: String,
    #[tabled(rename = "Created")]
    created: String,
    #[tabled(rename = "Superseded")]
    superseded: String,
}

pub fn format_profile_history(history: &[UserFinancialProfile]) -> String {
    if history.is_empty() {
        return "No profile history.\n".to_string();
    }

    let rows = history.iter().map(|p| ProfileRow {
        version: p.version,
        income: p.monthly_income.to_string(),
        region: p.region.clone().unwrap_or_else(|| "-".into()),
        tier: p.income_tier.to_string(),
        created: p.created_at.format("%Y-%m-%d %H:%M").to_string(),
        superseded: p
            .superseded_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "current".into()),
    });

    let mut output = Table::new(rows).with(Style::rounded()).to_string();
    output.push('\n');
    output
}
