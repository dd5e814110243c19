//! Transactions module - stored transactions and sign normalization.

mod transactions_model;
mod transactions_traits;

pub use transactions_model::{normalize_amount, Transaction, TransactionUpsert};
pub use transactions_traits::TransactionRepositoryTrait;
