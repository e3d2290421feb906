//! allowance - daily spending allowance engine
//!
//! Turns a monthly take-home income into a flexible spending budget, spreads
//! it over the days of the month, and adjusts each day's allowance based on
//! how the user actually spends.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Configuration and path management
//! - `error`: Custom error types
//! - `models`: Core data models (money, tiers, profiles, plans, transactions)
//! - `storage`: JSON file storage layer behind the `BudgetStore` trait
//! - `services`: Classifier, allocator, redistribution, signals, orchestrator
//! - `audit`: Audit logging of budget lifecycle and profile changes
//! - `cli` / `display`: Command handlers and terminal formatting
//!
//! # Example
//!
//! ```rust,ignore
//! use allowance::config::{AllowancePaths, Settings};
//! use allowance::services::IncomeClassifier;
//!
//! let paths = AllowancePaths::new()?;
//! let settings = Settings::load_or_create(&paths)?;
//! let classifier = IncomeClassifier::from_settings(&settings)?;
//! ```

pub mod audit;
pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod models;
pub mod services;
pub mod storage;

pub use error::{AllowanceError, AllowanceResult};
