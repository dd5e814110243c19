//! SQLite storage implementation for finlink.
//!
//! This crate provides all database-related functionality using Diesel ORM with SQLite.
//! It implements the repository traits defined in `finlink-core` and contains:
//! - Database connection pooling and the single writer actor
//! - Diesel migrations
//! - Repository implementations, including the atomic bulk operations
//!   (`commit_sync`, `merge_accounts`, `apply_reconciliation`, `collapse_monthly`)
//! - Database-specific model types (with Diesel derives)
//!
//! # Architecture
//!
//! This crate is the only place in the application where Diesel dependencies exist.
//! All other crates (`core`, `connect`) are database-agnostic and work with traits.
//!
//! ```text
//! core (domain)          connect (sync)
//!       │                      │
//!       └──────────┬───────────┘
//!                  │
//!                  ▼
//!          storage-sqlite (this crate)
//!                  │
//!                  ▼
//!              SQLite DB
//! ```

pub mod db;
pub mod errors;
pub mod schema;
pub mod utils;

// Repository implementations
pub mod accounts;
pub mod balances;
pub mod connections;
pub mod limits;
pub mod provider_calls;
pub mod sync;
pub mod transactions;

#[cfg(test)]
mod test_support;

// Re-export database utilities
pub use db::{
    create_pool, get_connection, init, run_migrations, spawn_writer, DbConnection, DbPool,
    WriteHandle,
};

pub use accounts::AccountRepository;
pub use balances::BalanceRepository;
pub use connections::ConnectionRepository;
pub use limits::ManualSyncRepository;
pub use provider_calls::ProviderCallRepository;
pub use sync::SyncRepository;
pub use transactions::TransactionRepository;

// Re-export storage errors and conversion helpers
pub use errors::{IntoCore, StorageError};

// Re-export from finlink-core for convenience
pub use finlink_core::errors::{DatabaseError, Error, Result};
