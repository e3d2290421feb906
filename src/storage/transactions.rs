//! Transaction repository for JSON storage
//!
//! Manages loading and saving transactions to transactions.json, with a
//! per-user index for history queries.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use crate::error::AllowanceError;
use crate::models::{DateRange, Transaction, TransactionId, UserId};

use super::file_io::{read_json, write_json_atomic};

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
struct TransactionData {
    transactions: Vec<Transaction>,
}

/// Repository for transaction persistence
pub struct TransactionRepository {
    path: PathBuf,
    data: RwLock<HashMap<TransactionId, Transaction>>,
    /// Index: user_id -> transaction_ids
    by_user: RwLock<HashMap<UserId, Vec<TransactionId>>>,
}

impl TransactionRepository {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            data: RwLock::new(HashMap::new()),
            by_user: RwLock::new(HashMap::new()),
        }
    }

    /// Load transactions from disk
    pub fn load(&self) -> Result<(), AllowanceError> {
        let file_data: TransactionData = read_json(&self.path)?;

        let mut data = self.data.write().map_err(|e| {
            AllowanceError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;
        let mut by_user = self.by_user.write().map_err(|e| {
            AllowanceError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;

        data.clear();
        by_user.clear();

        for txn in file_data.transactions {
            by_user.entry(txn.user_id.clone()).or_default().push(txn.id);
            data.insert(txn.id, txn);
        }

        Ok(())
    }

    /// Save transactions to disk
    pub fn save(&self) -> Result<(), AllowanceError> {
        let data = self.data.read().map_err(|e| {
            AllowanceError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;

        let mut transactions: Vec<_> = data.values().cloned().collect();
        transactions.sort_by(|a, b| {
            a.date
                .cmp(&b.date)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });

        write_json_atomic(&self.path, &TransactionData { transactions })
    }

    pub fn get(&self, id: TransactionId) -> Result<Option<Transaction>, AllowanceError> {
        let data = self.data.read().map_err(|e| {
            AllowanceError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(data.get(&id).cloned())
    }

    /// A user's transactions inside `range`, sorted by date
    pub fn get_by_user_in_range(
        &self,
        user_id: &UserId,
        range: DateRange,
    ) -> Result<Vec<Transaction>, AllowanceError> {
        let data = self.data.read().map_err(|e| {
            AllowanceError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;
        let by_user = self.by_user.read().map_err(|e| {
            AllowanceError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;

        let mut transactions: Vec<Transaction> = by_user
            .get(user_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| data.get(id))
                    .filter(|t| range.contains(t.date))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        transactions.sort_by(|a, b| {
            a.date
                .cmp(&b.date)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        Ok(transactions)
    }

    /// Insert or update a transaction
    pub fn upsert(&self, txn: Transaction) -> Result<(), AllowanceError> {
        let mut data = self.data.write().map_err(|e| {
            AllowanceError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;
        let mut by_user = self.by_user.write().map_err(|e| {
            AllowanceError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;

        if !data.contains_key(&txn.id) {
            by_user.entry(txn.user_id.clone()).or_default().push(txn.id);
        }
        data.insert(txn.id, txn);

        Ok(())
    }

    /// Count transactions
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
    use crate::models::{Money, SpendingCategory};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn create_test_repo() -> (TempDir, TransactionRepository) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("transactions.json");
        let repo = TransactionRepository::new(path);
        (temp_dir, repo)
    }

    fn spend(user: &str, day: u32, dollars: i64) -> Transaction {
        Transaction::spend(
            UserId::parse(user).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, day).unwrap(),
            Money::from_dollars(dollars),
            SpendingCategory::Dining,
            "Cafe",
        )
    }

    #[test]
    fn test_range_query_filters_user_and_dates() {
        let (_temp, repo) = create_test_repo();
        repo.upsert(spend("alice", 20, 5)).unwrap();
        repo.upsert(spend("alice", 2, 7)).unwrap();
        repo.upsert(spend("alice", 28, 9)).unwrap();
        repo.upsert(spend("bob", 3, 11)).unwrap();

        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 21).unwrap(),
        );
        let txns = repo
            .get_by_user_in_range(&UserId::parse("alice").unwrap(), range)
            .unwrap();

        assert_eq!(txns.len(), 2);
        assert_eq!(txns[0].outflow(), Money::from_dollars(7));
        assert_eq!(txns[1].outflow(), Money::from_dollars(5));
    }

    #[test]
    fn test_save_and_load() {
        let (temp, repo) = create_test_repo();
        let txn = spend("alice", 5, 12);
        repo.upsert(txn.clone()).unwrap();
        repo.upsert(txn.clone()).unwrap();
        repo.save().unwrap();

        let repo2 = TransactionRepository::new(temp.path().join("transactions.json"));
        repo2.load().unwrap();

        assert_eq!(repo2.count().unwrap(), 1);
        assert_eq!(repo2.get(txn.id).unwrap(), Some(txn));
    }
}
