//! Path management for the allowance engine
//!
//! ## Path Resolution Order
//!
//! 1. `ALLOWANCE_DATA_DIR` environment variable (if set)
//! 2. Unix (Linux/macOS): `$XDG_CONFIG_HOME/allowance-cli` or `~/.config/allowance-cli`
//! 3. Windows: `%APPDATA%\allowance-cli`

use std::path::PathBuf;

use crate::error::AllowanceError;

/// Environment variable that overrides the base directory
pub const DATA_DIR_ENV: &str = "ALLOWANCE_DATA_DIR";

/// Manages all paths used by the allowance engine
#[derive(Debug, Clone)]
pub struct AllowancePaths {
    base_dir: PathBuf,
}

impl AllowancePaths {
    /// Resolve the base directory from the environment
    ///
    /// # Errors
    ///
    /// Returns an error if no home/app-data directory can be determined.
    pub fn new() -> Result<Self, AllowanceError> {
        let base_dir = if let Ok(custom) = std::env::var(DATA_DIR_ENV) {
            PathBuf::from(custom)
        } else {
            resolve_default_path()?
        };

        Ok(Self { base_dir })
    }

    /// Create paths rooted at a custom base directory (useful for testing)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Data directory (~/.config/allowance-cli/data/)
    pub fn data_dir(&self) -> PathBuf {
        self.base_dir.join("data")
    }

    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Lifecycle audit trail (JSON lines)
    pub fn audit_log(&self) -> PathBuf {
        self.base_dir.join("audit.log")
    }

    pub fn profiles_file(&self) -> PathBuf {
        self.data_dir().join("profiles.json")
    }

    pub fn budgets_file(&self) -> PathBuf {
        self.data_dir().join("budgets.json")
    }

    pub fn transactions_file(&self) -> PathBuf {
        self.data_dir().join("transactions.json")
    }

    /// Append-only redistribution event log (JSON lines)
    pub fn events_file(&self) -> PathBuf {
        self.data_dir().join("redistribution.log")
    }

    /// Advisory lock file held across every reload-modify-save
    pub fn lock_file(&self) -> PathBuf {
        self.data_dir().join(".store.lock")
    }

    /// Ensure the base and data directories exist
    pub fn ensure_directories(&self) -> Result<(), AllowanceError> {
        std::fs::create_dir_all(&self.base_dir)
            .map_err(|e| AllowanceError::Io(format!("Failed to create base directory: {}", e)))?;

        std::fs::create_dir_all(self.data_dir())
            .map_err(|e| AllowanceError::Io(format!("Failed to create data directory: {}", e)))?;

        Ok(())
    }

    /// Check if the engine has been initialized (config file exists)
    pub fn is_initialized(&self) -> bool {
        self.settings_file().exists()
    }
}

#[cfg(not(windows))]
fn resolve_default_path() -> Result<PathBuf, AllowanceError> {
    let config_base = match std::env::var("XDG_CONFIG_HOME") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => {
            let home = std::env::var("HOME").map_err(|_| {
                AllowanceError::Config("HOME environment variable not set".into())
            })?;
            PathBuf::from(home).join(".config")
        }
    };
    Ok(config_base.join("allowance-cli"))
}

#[cfg(windows)]
fn resolve_default_path() -> Result<PathBuf, AllowanceError> {
    let appdata = std::env::var("APPDATA")
        .map_err(|_| AllowanceError::Config("Could not determine APPDATA directory".into()))?;
    Ok(PathBuf::from(appdata).join("allowance-cli"))
}
