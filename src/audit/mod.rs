//! Audit trail for the allowance engine
//!
//! Records profile versions and monthly budget lifecycle changes in an
//! append-only JSON-lines log next to the settings file.
//!
//! - `AuditEntry`: one timestamped operation on an entity, with optional
//!   before/after snapshots.
//! - `AuditLogger`: appends entries to the log and reads them back.

mod entry;
mod logger;

pub use entry::{AuditEntry, EntityType, Operation};
pub use logger::AuditLogger;
