//! Contract for the remote account aggregator.

use async_trait::async_trait;

use finlink_core::connections::InstitutionConnection;
use finlink_core::errors::Result;
use finlink_core::providers::{
    RemoteAccount, RemoteItem, RemoteLiability, TokenExchange, TransactionsSyncPage,
    TransactionsSyncRequest,
};

/// Remote calls the engine makes against the aggregator.
///
/// Failures come back as `Error::Provider` carrying a classified
/// `ProviderError`. Connection-scoped calls authenticate with the
/// connection's access token.
#[async_trait]
pub trait AggregatorClient: Send + Sync {
    /// Exchanges the short-lived public token from the link widget.
    async fn exchange_public_token(&self, public_token: &str) -> Result<TokenExchange>;

    async fn get_item(&self, access_token: &str) -> Result<RemoteItem>;

    async fn get_accounts(&self, connection: &InstitutionConnection) -> Result<Vec<RemoteAccount>>;

    /// Fetches one page of cursor-based transaction updates.
    async fn sync_transactions(
        &self,
        connection: &InstitutionConnection,
        request: &TransactionsSyncRequest,
    ) -> Result<TransactionsSyncPage>;

    async fn get_liabilities(
        &self,
        connection: &InstitutionConnection,
    ) -> Result<Vec<RemoteLiability>>;

    /// Invalidates the access token upstream.
    async fn remove_item(&self, connection: &InstitutionConnection) -> Result<()>;
}
