//! SQLite storage implementation for the manual sync rate limit.

mod model;
mod repository;

pub use model::ManualSyncEventDB;
pub use repository::ManualSyncRepository;
