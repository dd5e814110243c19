//! finlink Core - domain entities, engine logic, and traits.
//!
//! This crate holds the account aggregation sync engine's business rules.
//! It is database-agnostic and defines traits that are implemented
//! by the `storage-sqlite` crate.

pub mod accounts;
pub mod balances;
pub mod connections;
pub mod context;
pub mod duplicates;
pub mod errors;
pub mod limits;
pub mod locks;
pub mod provider_calls;
pub mod providers;
pub mod reconciliation;
pub mod sync;
pub mod transactions;

pub use context::UserContext;

// Re-export error types
pub use errors::Error;
pub use errors::Result;
