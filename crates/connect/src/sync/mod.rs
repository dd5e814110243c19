//! Transaction sync: single-account download, retries and batch orchestration.

mod models;
mod orchestrator;
mod progress;
mod retry;
mod service;

pub use models::{AccountSyncResult, AccountSyncStatus, BatchSyncSummary, SyncConfig};
pub use orchestrator::SyncOrchestrator;
pub use progress::{
    LoggingProgressReporter, NoOpProgressReporter, SyncProgressPayload, SyncProgressReporter,
    SyncStatus,
};
pub use retry::RetryPolicy;
pub use service::{TransactionSyncService, TransactionSyncServiceTrait};
