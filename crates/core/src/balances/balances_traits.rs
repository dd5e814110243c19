use async_trait::async_trait;

use super::balances_model::{Balance, NewBalance};
use crate::errors::Result;

#[async_trait]
pub trait BalanceRepositoryTrait: Send + Sync {
    /// Inserts snapshots; returns how many were written.
    async fn insert_many(&self, balances: Vec<NewBalance>) -> Result<usize>;

    /// Snapshots of one account, newest first.
    fn list_for_account(&self, account_id: &str) -> Result<Vec<Balance>>;

    /// Collapses snapshots to one per account per calendar month in a single
    /// transaction. `None` covers every account. Returns deleted rows.
    async fn collapse_monthly(&self, account_ids: Option<Vec<String>>) -> Result<usize>;
}
