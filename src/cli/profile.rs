//! Profile and classification CLI commands

use clap::Subcommand;

use super::parse_money;
use crate::display::{format_classification, format_profile, format_profile_history};
use crate::error::AllowanceResult;
use crate::models::UserId;
use crate::services::BudgetOrchestrator;

/// Profile subcommands
#[derive(Subcommand)]
pub enum ProfileCommands {
    /// Set monthly take-home income (creates a new profile version)
    Set {
        /// Monthly income (e.g., "5000" or "5,000.00")
        income: String,
        /// Region/state code for cost-of-living thresholds
        #[arg(short, long)]
        region: Option<String>,
    },

    /// Show the current profile
    Show,

    /// List every profile version, oldest first
    History,
}

pub fn handle_profile_command(
    orchestrator: &BudgetOrchestrator<'_>,
    user_id: &UserId,
    cmd: ProfileCommands,
) -> AllowanceResult<()> {
    match cmd {
        ProfileCommands::Set { income, region } => {
            let income = parse_money(&income)?;
            let profile = orchestrator.update_profile(user_id, income, region)?;
            println!("Profile saved (version {}).", profile.version);
            println!();
            print!("{}", format_profile(&profile));
        }
        ProfileCommands::Show => {
            let profile = orchestrator.profile(user_id)?;
            print!("{}", format_profile(&profile));
        }
        ProfileCommands::History => {
            let history = orchestrator.profile_history(user_id)?;
            print!("{}", format_profile_history(&history));
        }
    }

    Ok(())
}

/// Classify an income without touching any profile
pub fn handle_classify_command(
    orchestrator: &BudgetOrchestrator<'_>,
    income: &str,
    region: Option<&str>,
) -> AllowanceResult<()> {
    let income = parse_money(income)?;
    let classification = orchestrator.classify_income(income, region)?;
    print!("{}", format_classification(&classification));
    Ok(())
}
