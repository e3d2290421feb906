//! Audit logger for the append-only audit log

use std::path::PathBuf;

use crate::error::AllowanceResult;
use crate::storage::file_io::{append_jsonl, read_jsonl};

use super::entry::AuditEntry;

/// Writes audit entries as JSON lines
pub struct AuditLogger {
    log_path: PathBuf,
}

impl AuditLogger {
    pub fn new(log_path: PathBuf) -> Self {
        Self { log_path }
    }

    /// Append one entry; each write is flushed immediately
    pub fn log(&self, entry: &AuditEntry) -> AllowanceResult<()> {
        append_jsonl(&self.log_path, std::slice::from_ref(entry))
    }

    /// Read all entries, oldest first
    pub fn read_all(&self) -> AllowanceResult<Vec<AuditEntry>> {
        read_jsonl(&self.log_path)
    }

    pub fn path(&self) -> &PathBuf {
        &self.log_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::entry::{EntityType, Operation};
    use serde_json::json;
    use tempfile::TempDir;

    fn create_test_logger() -> (AuditLogger, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("audit.log");
        let logger = AuditLogger::new(log_path);
        (logger, temp_dir)
    }

    #[test]
    fn test_log_and_read() {
        let (logger, _temp) = create_test_logger();
        let entry = AuditEntry::create(EntityType::Profile, "alice", &json!({"version": 1}));

        logger.log(&entry).unwrap();

        let entries = logger.read_all().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].operation, Operation::Create);
        assert_eq!(entries[0].entity_id, "alice");
    }

    #[test]
    fn test_empty_log() {
        let (logger, _temp) = create_test_logger();
        assert!(logger.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_survives_restart() {
        let (logger, temp) = create_test_logger();
        for i in 0..3 {
            let entry = AuditEntry::create(EntityType::MonthlyBudget, format!("u:{}", i), &json!({}));
            logger.log(&entry).unwrap();
        }

        let logger2 = AuditLogger::new(temp.path().join("audit.log"));
        let entries = logger2.read_all().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[2].entity_id, "u:2");
    }
}
