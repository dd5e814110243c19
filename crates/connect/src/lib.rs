//! finlink Connect - aggregator integration for the sync engine.
//!
//! This crate talks to the Plaid-style aggregator and drives the engine flows
//! that need it: cursor-based transaction sync, batch orchestration with
//! retries, reconnection reconciliation and the link / disconnect lifecycle.
//! Persistence goes through the repository traits of `finlink-core`.

pub mod aggregator;
pub mod client;
pub mod link;
pub mod reconcile;
pub mod sync;

// Re-export commonly used types
pub use aggregator::{AggregatorClient, LedgerConfig, LedgeredClient};
pub use client::{PlaidApiClient, DEFAULT_PROVIDER_URL};
pub use link::{LinkRequest, LinkResult, LinkService};
pub use reconcile::ReconciliationEngine;
pub use sync::{
    AccountSyncResult, AccountSyncStatus, BatchSyncSummary, LoggingProgressReporter,
    NoOpProgressReporter, RetryPolicy, SyncConfig, SyncOrchestrator, SyncProgressReporter,
    TransactionSyncService, TransactionSyncServiceTrait,
};
