//! Sync domain models and store contract.

mod download_log_model;
mod sync_model;
mod sync_traits;

pub use download_log_model::*;
pub use sync_model::*;
pub use sync_traits::SyncStoreTrait;
