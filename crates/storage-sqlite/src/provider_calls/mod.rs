//! SQLite storage implementation for the provider call ledger.

mod model;
mod repository;

pub use model::ProviderCallDB;
pub use repository::ProviderCallRepository;
