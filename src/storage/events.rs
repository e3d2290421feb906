//! Append-only redistribution event log
//!
//! Events are written as JSON lines and never rewritten.

use std::path::PathBuf;

use crate::error::AllowanceError;
use crate::models::{BillingMonth, RedistributionEvent, UserId};

use super::file_io::{append_jsonl, read_jsonl};

pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn append(&self, events: &[RedistributionEvent]) -> Result<(), AllowanceError> {
        append_jsonl(&self.path, events)
    }

    /// Events for a user, optionally narrowed to one month, oldest first
    pub fn list(
        &self,
        user_id: &UserId,
        month: Option<BillingMonth>,
    ) -> Result<Vec<RedistributionEvent>, AllowanceError> {
        let events: Vec<RedistributionEvent> = read_jsonl(&self.path)?;
        Ok(events
            .into_iter()
            .filter(|e| &e.user_id == user_id)
            .filter(|e| month.map_or(true, |m| e.month == m))
            .collect())
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}
