//! Aggregator-facing types shared by the engine and the HTTP client.

mod providers_errors;
mod providers_model;

pub use providers_errors::{ErrorClass, ProviderError, ProviderErrorKind};
pub use providers_model::{
    LiabilityKind, RemoteAccount, RemoteBalances, RemoteItem, RemoteLiability, RemoteTransaction,
    TokenExchange, TransactionsSyncPage, TransactionsSyncRequest,
};

/// Provider tag stored on connections created through the aggregator.
pub const PROVIDER_PLAID: &str = "plaid";

/// Provider tag for connections the user maintains by hand.
pub const PROVIDER_MANUAL: &str = "manual";
