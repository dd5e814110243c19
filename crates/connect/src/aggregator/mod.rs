//! Aggregator contract, wire format and the call ledger.

mod ledger;
mod traits;
pub(crate) mod wire;

pub use ledger::{
    LedgerConfig, LedgeredClient, ENDPOINT_ACCOUNTS_GET, ENDPOINT_ITEM_GET, ENDPOINT_ITEM_REMOVE,
    ENDPOINT_LIABILITIES_GET, ENDPOINT_TOKEN_EXCHANGE, ENDPOINT_TRANSACTIONS_SYNC,
};
pub use traits::AggregatorClient;

use log::warn;

use finlink_core::connections::{ConnectionRepositoryTrait, InstitutionConnection};
use finlink_core::errors::Error;

/// Flags `connection` for re-authentication when `err` says its credential is dead.
///
/// Returns true when the connection was flagged.
pub async fn flag_if_credential_invalid(
    connections: &dyn ConnectionRepositoryTrait,
    connection: &InstitutionConnection,
    err: &Error,
) -> bool {
    let Some(provider) = err.as_provider().filter(|p| p.is_credential_invalid()) else {
        return false;
    };
    warn!(
        "Connection {} (institution {}) needs re-authentication: {}",
        connection.id,
        connection.institution_id,
        provider.label()
    );
    if let Err(e) = connections
        .flag_reauth_required(&connection.id, provider.label())
        .await
    {
        warn!(
            "Failed to flag connection {} for re-authentication: {}",
            connection.id, e
        );
    }
    true
}
