//! Service layer for the allowance engine
//!
//! Services hold the business rules on top of the storage layer. Each one is
//! built once by the caller and handed to the orchestrator by reference.

pub mod allocator;
pub mod classifier;
pub mod import;
pub mod orchestrator;
pub mod redistribution;
pub mod signals;
pub mod tracker;

pub use allocator::CalendarAllocator;
pub use classifier::IncomeClassifier;
pub use import::{ColumnMapping, ImportResult, ImportService, ImportStatus};
pub use orchestrator::{
    BudgetOrchestrator, CategoryAllocation, DailyBudgetResponse, RedistributionOutcome,
    RolloverSummary, SpendOutcome,
};
pub use redistribution::RedistributionEngine;
pub use signals::{SignalAggregator, SignalSnapshot};
pub use tracker::{SpendRecord, SpendTracker};
