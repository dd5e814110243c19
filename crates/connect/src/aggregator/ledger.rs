//! Call ledger decorator: every aggregator call is timed, bounded and recorded.

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, warn};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use finlink_core::connections::InstitutionConnection;
use finlink_core::errors::{Error, Result};
use finlink_core::provider_calls::{CallStatus, NewProviderCall, ProviderCallRepositoryTrait};
use finlink_core::providers::{
    ProviderError, RemoteAccount, RemoteItem, RemoteLiability, TokenExchange, TransactionsSyncPage,
    TransactionsSyncRequest,
};

use super::traits::AggregatorClient;

pub const ENDPOINT_TOKEN_EXCHANGE: &str = "/item/public_token/exchange";
pub const ENDPOINT_ITEM_GET: &str = "/item/get";
pub const ENDPOINT_ACCOUNTS_GET: &str = "/accounts/get";
pub const ENDPOINT_TRANSACTIONS_SYNC: &str = "/transactions/sync";
pub const ENDPOINT_LIABILITIES_GET: &str = "/liabilities/get";
pub const ENDPOINT_ITEM_REMOVE: &str = "/item/remove";

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Upper bound for one remote call, including retries inside the transport.
    pub call_timeout: Duration,
    /// Window over which failures for one institution are counted.
    pub failure_window: chrono::Duration,
    /// Failures within the window that trigger an operator warning.
    pub failure_threshold: i64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(30),
            failure_window: chrono::Duration::minutes(15),
            failure_threshold: 5,
        }
    }
}

/// Who a call was made for.
#[derive(Debug, Clone, Default)]
struct CallScope {
    user_id: Option<String>,
    connection_id: Option<String>,
    institution_id: Option<String>,
}

impl From<&InstitutionConnection> for CallScope {
    fn from(connection: &InstitutionConnection) -> Self {
        Self {
            user_id: Some(connection.user_id.clone()),
            connection_id: Some(connection.id.clone()),
            institution_id: Some(connection.institution_id.clone()),
        }
    }
}

/// Wraps an [`AggregatorClient`] and writes one ledger row per call.
///
/// Ledger write failures are logged and never fail the call itself.
pub struct LedgeredClient {
    inner: Arc<dyn AggregatorClient>,
    ledger: Arc<dyn ProviderCallRepositoryTrait>,
    config: LedgerConfig,
}

impl LedgeredClient {
    pub fn new(
        inner: Arc<dyn AggregatorClient>,
        ledger: Arc<dyn ProviderCallRepositoryTrait>,
        config: LedgerConfig,
    ) -> Self {
        Self {
            inner,
            ledger,
            config,
        }
    }

    async fn call<T, F>(&self, endpoint: &'static str, scope: CallScope, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send,
        T: Send,
    {
        let started = Instant::now();
        let result = match tokio::time::timeout(self.config.call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::Provider(ProviderError::timeout(format!(
                "{} did not answer within {:?}",
                endpoint, self.config.call_timeout
            )))),
        };
        let duration_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);

        let mut row = NewProviderCall {
            endpoint: endpoint.to_string(),
            user_id: scope.user_id,
            connection_id: scope.connection_id,
            institution_id: scope.institution_id,
            duration_ms,
            status: CallStatus::Success,
            error_type: None,
            error_code: None,
            error_message: None,
        };
        if let Err(err) = &result {
            row.status = CallStatus::Error;
            match err.as_provider() {
                Some(provider) => {
                    row.error_type = provider.error_type.clone();
                    row.error_code = Some(provider.label());
                    row.error_message = Some(provider.message.clone());
                }
                None => row.error_message = Some(err.to_string()),
            }
        }

        let institution_id = row.institution_id.clone();
        let failed = row.status == CallStatus::Error;
        if let Err(e) = self.ledger.record(row).await {
            warn!("Failed to record aggregator call to {}: {}", endpoint, e);
        } else {
            debug!("{} finished in {} ms", endpoint, duration_ms);
        }

        if failed {
            if let Some(institution_id) = institution_id {
                self.check_failure_rate(&institution_id);
            }
        }
        result
    }

    fn check_failure_rate(&self, institution_id: &str) {
        let since = (Utc::now() - self.config.failure_window).naive_utc();
        match self.ledger.count_failures_since(institution_id, since) {
            Ok(failures) if failures >= self.config.failure_threshold => warn!(
                "Institution {} has {} failed aggregator calls in the last {} minutes",
                institution_id,
                failures,
                self.config.failure_window.num_minutes()
            ),
            Ok(_) => {}
            Err(e) => warn!(
                "Could not count recent failures for institution {}: {}",
                institution_id, e
            ),
        }
    }
}

#[async_trait]
impl AggregatorClient for LedgeredClient {
    async fn exchange_public_token(&self, public_token: &str) -> Result<TokenExchange> {
        self.call(
            ENDPOINT_TOKEN_EXCHANGE,
            CallScope::default(),
            self.inner.exchange_public_token(public_token),
        )
        .await
    }

    async fn get_item(&self, access_token: &str) -> Result<RemoteItem> {
        self.call(
            ENDPOINT_ITEM_GET,
            CallScope::default(),
            self.inner.get_item(access_token),
        )
        .await
    }

    async fn get_accounts(&self, connection: &InstitutionConnection) -> Result<Vec<RemoteAccount>> {
        self.call(
            ENDPOINT_ACCOUNTS_GET,
            connection.into(),
            self.inner.get_accounts(connection),
        )
        .await
    }

    async fn sync_transactions(
        &self,
        connection: &InstitutionConnection,
        request: &TransactionsSyncRequest,
    ) -> Result<TransactionsSyncPage> {
        self.call(
            ENDPOINT_TRANSACTIONS_SYNC,
            connection.into(),
            self.inner.sync_transactions(connection, request),
        )
        .await
    }

    async fn get_liabilities(
        &self,
        connection: &InstitutionConnection,
    ) -> Result<Vec<RemoteLiability>> {
        self.call(
            ENDPOINT_LIABILITIES_GET,
            connection.into(),
            self.inner.get_liabilities(connection),
        )
        .await
    }

    async fn remove_item(&self, connection: &InstitutionConnection) -> Result<()> {
        self.call(
            ENDPOINT_ITEM_REMOVE,
            connection.into(),
            self.inner.remove_item(connection),
        )
        .await
    }
}
