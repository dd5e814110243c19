//! SQLite storage implementation for balance snapshots.

mod model;
mod repository;

pub use model::BalanceDB;
pub use repository::BalanceRepository;
