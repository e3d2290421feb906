use anyhow::Result;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use allowance::cli::{
    handle_audit_command, handle_classify_command, handle_close_command, handle_daily_command, handle_events_command,
    handle_import_command, handle_month_command, handle_profile_command,
    handle_redistribute_command, handle_rollover_command, handle_spend_command, ImportArgs,
    ProfileCommands, SpendArgs,
};
use allowance::config::{AllowancePaths, Settings};
use allowance::models::UserId;
use allowance::services::{
    BudgetOrchestrator, CalendarAllocator, IncomeClassifier, RedistributionEngine,
    SignalAggregator,
};
use allowance::storage::Storage;

#[derive(Parser)]
#[command(
    name = "allowance",
    version,
    about = "Daily spending allowance from your monthly income",
    long_about = "allowance turns a monthly take-home income into a flexible \
                  spending budget, spreads it across the days of the month, \
                  and adjusts each day's allowance to how you actually spend."
)]
struct Cli {
    /// User handle
    #[arg(short, long, global = true, env = "ALLOWANCE_USER", default_value = "default")]
    user: UserId,

    /// Treat this date as today (YYYY-MM-DD)
    #[arg(long, global = true)]
    as_of: Option<NaiveDate>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory and settings
    Init,

    /// Show current configuration and paths
    Config,

    /// Classify a monthly income into a tier
    Classify {
        /// Monthly income (e.g., "5000")
        income: String,
        /// Region/state code
        #[arg(short, long)]
        region: Option<String>,
    },

    /// Profile management commands
    #[command(subcommand)]
    Profile(ProfileCommands),

    /// Show the allowance for a day
    Daily {
        /// Date (YYYY-MM-DD), defaults to today
        #[arg(short, long)]
        date: Option<NaiveDate>,
        /// Print the full response as JSON
        #[arg(long)]
        json: bool,
    },

    /// Record a purchase
    Spend(SpendArgs),

    /// Import transactions from CSV
    Import(ImportArgs),

    /// Show the plan for a month (e.g., "2025-04", "current", "last")
    Month {
        month: Option<String>,
        /// One row per category instead of per day
        #[arg(long)]
        detail: bool,
    },

    /// Rebalance overspending across the rest of the month
    Redistribute {
        month: Option<String>,
        /// Fail when a shortfall remains uncovered
        #[arg(long)]
        strict: bool,
    },

    /// Close a month; it becomes read-only
    Close { month: Option<String> },

    /// Close past months and open the current one
    Rollover,

    /// List redistribution transfers
    Events {
        /// Only this month
        #[arg(short, long)]
        month: Option<String>,
    },

    /// Show the audit trail of profile and budget changes
    Audit {
        /// Number of entries to show
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
}

fn init_tracing(verbose: bool) {
    // RUST_LOG > --verbose > info
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr).compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Initialize paths and settings
    let paths = AllowancePaths::new()?;
    let settings = Settings::load_or_create(&paths)?;

    // Initialize storage
    let storage = Storage::new(paths.clone())?;
    storage.load_all()?;

    let classifier = IncomeClassifier::from_settings(&settings)?;
    let allocator = CalendarAllocator::from_settings(&settings)?;
    let engine = RedistributionEngine::from_settings(&settings);
    let aggregator = SignalAggregator::from_settings(&settings);
    let orchestrator = BudgetOrchestrator::new(
        &storage,
        &classifier,
        &allocator,
        &engine,
        &aggregator,
        &settings,
    );

    let user = &cli.user;
    let today = cli.as_of.unwrap_or_else(|| Local::now().date_naive());

    match cli.command {
        Some(Commands::Init) => {
            println!("Initializing allowance at: {}", paths.base_dir().display());
            paths.ensure_directories()?;
            let mut initialized = settings.clone();
            initialized.setup_completed = true;
            initialized.save(&paths)?;
            println!("Initialization complete!");
            println!();
            println!("Next: allowance profile set <monthly income> --region <code>");
        }
        Some(Commands::Config) => {
            println!("Allowance Configuration");
            println!("=======================");
            println!("Base directory:   {}", paths.base_dir().display());
            println!("Data directory:   {}", paths.data_dir().display());
            println!("Settings file:    {}", paths.settings_file().display());
            println!();
            println!("Settings:");
            println!(
                "  Default region:        {}",
                settings.default_region.as_deref().unwrap_or("US")
            );
            println!(
                "  Transition band:       {:.0}%",
                settings.transition_band * 100.0
            );
            println!("  Auto-redistribute at:  {}", settings.auto_redistribute_threshold);
            println!("  Redistribution scope:  {:?}", settings.redistribution_scope);
            println!("  Signal timeout:        {} ms", settings.signal_timeout_ms);
            println!("  Regions:               {}", classifier.regions().join(", "));
        }
        Some(Commands::Classify { income, region }) => {
            handle_classify_command(&orchestrator, &income, region.as_deref())?;
        }
        Some(Commands::Profile(cmd)) => {
            handle_profile_command(&orchestrator, user, cmd)?;
        }
        Some(Commands::Daily { date, json }) => {
            let date = date.unwrap_or(today);
            handle_daily_command(&orchestrator, &settings, user, date, json).await?;
        }
        Some(Commands::Spend(args)) => {
            handle_spend_command(&orchestrator, &settings, user, args, today).await?;
        }
        Some(Commands::Import(args)) => {
            handle_import_command(&storage, &orchestrator, user, args, today).await?;
        }
        Some(Commands::Month { month, detail }) => {
            let month = month.as_deref();
            handle_month_command(&orchestrator, &settings, user, month, detail, today)?;
        }
        Some(Commands::Redistribute { month, strict }) => {
            let month = month.as_deref();
            handle_redistribute_command(&orchestrator, &settings, user, month, strict, today)
                .await?;
        }
        Some(Commands::Close { month }) => {
            handle_close_command(&orchestrator, user, month.as_deref(), today).await?;
        }
        Some(Commands::Rollover) => {
            handle_rollover_command(&orchestrator, user, today).await?;
        }
        Some(Commands::Events { month }) => {
            handle_events_command(&orchestrator, &settings, user, month.as_deref(), today)?;
        }
        Some(Commands::Audit { limit }) => {
            handle_audit_command(storage.audit(), user, limit)?;
        }
        None => {
            println!("allowance - daily spending allowance");
            println!();
            println!("Run 'allowance --help' for usage information.");
        }
    }

    Ok(())
}
