//! Account repository trait.
//!
//! Defines the contract for account persistence without any database-specific
//! types, allowing for different storage implementations.

use async_trait::async_trait;
use std::collections::HashMap;

use super::accounts_model::{Account, AccountActivity, AccountDetailsUpdate, NewAccount};
use crate::errors::Result;

/// Trait defining the contract for Account repository operations.
#[async_trait]
pub trait AccountRepositoryTrait: Send + Sync {
    /// Creates a new account.
    ///
    /// Fails with a unique violation when another non-archived account already
    /// holds the remote account id.
    async fn create(&self, new_account: NewAccount) -> Result<Account>;

    /// Refreshes descriptive fields from the aggregator.
    async fn update_details(&self, account_id: &str, details: AccountDetailsUpdate)
        -> Result<Account>;

    async fn set_hidden(&self, account_id: &str, hidden: bool) -> Result<Account>;

    /// Retrieves an account by its ID.
    fn get_by_id(&self, account_id: &str) -> Result<Account>;

    fn get_by_ids(&self, account_ids: &[String]) -> Result<Vec<Account>>;

    /// The non-archived account holding `remote_account_id`, if any.
    fn get_active_by_remote_id(&self, remote_account_id: &str) -> Result<Option<Account>>;

    /// Non-archived accounts holding any of the given remote ids, across all users.
    fn find_active_by_remote_ids(&self, remote_account_ids: &[String]) -> Result<Vec<Account>>;

    fn list_for_connection(&self, connection_id: &str) -> Result<Vec<Account>>;

    /// Accounts of one institution across all of the user's connections.
    fn list_for_institution(
        &self,
        user_id: &str,
        institution_id: &str,
        include_archived: bool,
    ) -> Result<Vec<Account>>;

    fn list_for_user(&self, user_id: &str, include_archived: bool) -> Result<Vec<Account>>;

    /// Transaction and balance facts per account id.
    fn activity(&self, account_ids: &[String]) -> Result<HashMap<String, AccountActivity>>;
}
