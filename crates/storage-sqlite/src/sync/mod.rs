//! SQLite storage implementation for transaction sync (commits and download logs).

mod model;
mod repository;

pub use model::DownloadLogDB;
pub use repository::SyncRepository;
