use super::transactions_model::Transaction;
use crate::errors::Result;

/// Read access to stored transactions. Writes go through the sync commit and
/// the account merge, never through this trait.
pub trait TransactionRepositoryTrait: Send + Sync {
    /// Transactions of one account, newest first.
    fn list_for_account(&self, account_id: &str, limit: Option<i64>) -> Result<Vec<Transaction>>;

    fn count_for_account(&self, account_id: &str) -> Result<i64>;
}
