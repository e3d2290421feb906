//! Profile repository for JSON storage
//!
//! Manages loading and saving financial profiles to profiles.json. Every
//! version ever written is kept; the current one has no `superseded_at`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use chrono::Utc;

use crate::error::AllowanceError;
use crate::models::{UserFinancialProfile, UserId};

use super::file_io::{read_json, write_json_atomic};

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
struct ProfileData {
    profiles: Vec<UserFinancialProfile>,
}

/// Repository for profile persistence
pub struct ProfileRepository {
    path: PathBuf,
    /// user -> versions, oldest first
    data: RwLock<HashMap<UserId, Vec<UserFinancialProfile>>>,
}

impl ProfileRepository {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            data: RwLock::new(HashMap::new()),
        }
    }

    /// Load profiles from disk
    pub fn load(&self) -> Result<(), AllowanceError> {
        let file_data: ProfileData = read_json(&self.path)?;

        let mut data = self.data.write().map_err(|e| {
            AllowanceError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;

        data.clear();
        for profile in file_data.profiles {
            data.entry(profile.user_id.clone()).or_default().push(profile);
        }
        for versions in data.values_mut() {
            versions.sort_by_key(|p| p.version);
        }

        Ok(())
    }

    /// Save profiles to disk
    pub fn save(&self) -> Result<(), AllowanceError> {
        let data = self.data.read().map_err(|e| {
            AllowanceError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;

        let mut profiles: Vec<_> = data.values().flatten().cloned().collect();
        profiles.sort_by(|a, b| {
            a.user_id
                .cmp(&b.user_id)
                .then_with(|| a.version.cmp(&b.version))
        });

        write_json_atomic(&self.path, &ProfileData { profiles })
    }

    /// Current profile for a user
    pub fn current(&self, user_id: &UserId) -> Result<Option<UserFinancialProfile>, AllowanceError> {
        let data = self.data.read().map_err(|e| {
            AllowanceError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(data
            .get(user_id)
            .and_then(|versions| versions.iter().rev().find(|p| p.is_current()))
            .cloned())
    }

    /// Every version for a user, oldest first
    pub fn history(&self, user_id: &UserId) -> Result<Vec<UserFinancialProfile>, AllowanceError> {
        let data = self.data.read().map_err(|e| {
            AllowanceError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(data.get(user_id).cloned().unwrap_or_default())
    }

    /// Append a new version, stamping the previous current one as superseded.
    ///
    /// The stored version number is forced to follow the latest existing one.
    pub fn supersede(
        &self,
        mut profile: UserFinancialProfile,
    ) -> Result<UserFinancialProfile, AllowanceError> {
        profile
            .validate()
            .map_err(|e| AllowanceError::Validation(e.to_string()))?;

        let mut data = self.data.write().map_err(|e| {
            AllowanceError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;

        let versions = data.entry(profile.user_id.clone()).or_default();
        let now = Utc::now();
        for previous in versions.iter_mut().filter(|p| p.is_current()) {
            previous.superseded_at = Some(now);
        }

        profile.version = versions.last().map(|p| p.version + 1).unwrap_or(1);
        profile.superseded_at = None;
        versions.push(profile.clone());

        Ok(profile)
    }

    /// Number of users with a profile
    pub fn count(&self) -> Result<usize, AllowanceError> {
        let data = self.data.read().map_err(|e| {
            AllowanceError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;
        Ok(data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IncomeClassification, IncomeTier, Money};
    use tempfile::TempDir;

    fn create_test_repo() -> (TempDir, ProfileRepository) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("profiles.json");
        let repo = ProfileRepository::new(path);
        (temp_dir, repo)
    }

    fn profile(income_dollars: i64) -> UserFinancialProfile {
        let classification = IncomeClassification::single(
            IncomeTier::Middle,
            "US".into(),
            Money::from_dollars(income_dollars * 12),
        );
        UserFinancialProfile::new(
            UserId::parse("alice").unwrap(),
            Money::from_dollars(income_dollars),
            None,
            &classification,
        )
    }

    #[test]
    fn test_supersede_keeps_history() {
        let (_temp, repo) = create_test_repo();
        let user = UserId::parse("alice").unwrap();

        repo.supersede(profile(5000)).unwrap();
        let second = repo.supersede(profile(6000)).unwrap();

        assert_eq!(second.version, 2);

        let history = repo.history(&user).unwrap();
        assert_eq!(history.len(), 2);
        assert!(!history[0].is_current());
        assert!(history[1].is_current());

        let current = repo.current(&user).unwrap().unwrap();
        assert_eq!(current.monthly_income, Money::from_dollars(6000));
    }

    #[test]
    fn test_save_and_load() {
        let (temp, repo) = create_test_repo();
        repo.supersede(profile(5000)).unwrap();
        repo.supersede(profile(5500)).unwrap();
        repo.save().unwrap();

        let repo2 = ProfileRepository::new(temp.path().join("profiles.json"));
        repo2.load().unwrap();

        let user = UserId::parse("alice").unwrap();
        assert_eq!(repo2.history(&user).unwrap().len(), 2);
        assert_eq!(repo2.current(&user).unwrap().unwrap().version, 2);
        assert_eq!(repo2.count().unwrap(), 1);
    }

    #[test]
    fn test_rejects_negative_income() {
        let (_temp, repo) = create_test_repo();
        let mut bad = profile(5000);
        bad.monthly_income = Money::from_cents(-1);

        let err = repo.supersede(bad).unwrap_err();
        assert!(err.is_validation());
    }
}
