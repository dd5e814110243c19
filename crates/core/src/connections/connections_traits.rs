//! Connection repository trait.

use async_trait::async_trait;

use super::connections_model::{InstitutionConnection, NewConnection};
use crate::errors::Result;

/// Persistence contract for institution connections.
#[async_trait]
pub trait ConnectionRepositoryTrait: Send + Sync {
    /// Creates a connection. Fails with a unique violation when the item id exists.
    async fn create(&self, new_connection: NewConnection) -> Result<InstitutionConnection>;

    /// Stores a fresh credential for an existing item and clears any re-auth flag.
    async fn update_credentials(
        &self,
        connection_id: &str,
        access_token: String,
    ) -> Result<InstitutionConnection>;

    /// Flags the connection for re-authentication, keeping the provider error text.
    async fn flag_reauth_required(&self, connection_id: &str, error: String) -> Result<()>;

    /// Marks the connection disconnected and blanks its credential.
    async fn mark_disconnected(&self, connection_id: &str) -> Result<InstitutionConnection>;

    /// Deletes the connection and, through cascade, its accounts and their history.
    ///
    /// Returns the number of deleted connections.
    async fn delete(&self, connection_id: &str) -> Result<usize>;

    fn get_by_id(&self, connection_id: &str) -> Result<InstitutionConnection>;

    fn get_by_item_id(&self, item_id: &str) -> Result<Option<InstitutionConnection>>;

    fn list_for_user(&self, user_id: &str) -> Result<Vec<InstitutionConnection>>;

    /// All of the user's connections to one institution, oldest first.
    fn list_for_institution(
        &self,
        user_id: &str,
        institution_id: &str,
    ) -> Result<Vec<InstitutionConnection>>;

    /// Distinct owners of active connections. Used by the scheduler.
    fn list_user_ids(&self) -> Result<Vec<String>>;
}
