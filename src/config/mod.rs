//! Configuration module for the allowance engine
//!
//! - XDG-compliant path resolution
//! - Settings persistence and validation

pub mod paths;
pub mod settings;

pub use paths::AllowancePaths;
pub use settings::{RedistributionScope, Settings};
