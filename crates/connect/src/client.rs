//! HTTP client for the Plaid-style aggregator API.
//!
//! Every endpoint is a JSON `POST`; the client id and secret are added to each
//! request body, connection-scoped calls add the access token as well.

use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

use finlink_core::connections::InstitutionConnection;
use finlink_core::errors::{Error, Result};
use finlink_core::providers::{
    ProviderError, ProviderErrorKind, RemoteAccount, RemoteItem, RemoteLiability, TokenExchange,
    TransactionsSyncPage, TransactionsSyncRequest,
};

use crate::aggregator::wire::{
    AccessTokenRequest, ApiAccountsResponse, ApiErrorBody, ApiItemResponse,
    ApiLiabilitiesResponse, ApiTokenExchange, ApiTransactionsSync, PublicTokenExchangeRequest,
    TransactionsSyncBody,
};
use crate::aggregator::{
    AggregatorClient, ENDPOINT_ACCOUNTS_GET, ENDPOINT_ITEM_GET, ENDPOINT_ITEM_REMOVE,
    ENDPOINT_LIABILITIES_GET, ENDPOINT_TOKEN_EXCHANGE, ENDPOINT_TRANSACTIONS_SYNC,
};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default base URL (sandbox environment).
pub const DEFAULT_PROVIDER_URL: &str = "https://sandbox.plaid.com";

/// Request body with the API credentials flattened in.
#[derive(Serialize)]
struct Authenticated<'a, B: Serialize> {
    client_id: &'a str,
    secret: &'a str,
    #[serde(flatten)]
    body: B,
}

/// HTTP client for the aggregator API.
///
/// # Example
///
/// ```ignore
/// let client = PlaidApiClient::new(DEFAULT_PROVIDER_URL, "client-id", "secret")?;
/// let exchange = client.exchange_public_token("public-sandbox-123").await?;
/// ```
#[derive(Debug, Clone)]
pub struct PlaidApiClient {
    client: reqwest::Client,
    base_url: String,
    client_id: String,
    secret: String,
}

impl PlaidApiClient {
    pub fn new(base_url: &str, client_id: &str, secret: &str) -> Result<Self> {
        Self::with_timeout(
            base_url,
            client_id,
            secret,
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        )
    }

    pub fn with_timeout(
        base_url: &str,
        client_id: &str,
        secret: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Unexpected(format!("Failed to initialize HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            client_id: client_id.to_string(),
            secret: secret.to_string(),
        })
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }

    async fn post<B, T>(&self, path: &str, body: B) -> Result<T>
    where
        B: Serialize + Send,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("[Aggregator] POST {}", url);

        let payload = Authenticated {
            client_id: &self.client_id,
            secret: &self.secret,
            body,
        };
        let response = self
            .client
            .post(&url)
            .headers(self.headers())
            .json(&payload)
            .send()
            .await
            .map_err(|e| transport_error(path, e))?;

        self.parse_response(path, response).await
    }

    async fn parse_response<T: DeserializeOwned>(
        &self,
        path: &str,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(path, e))?;

        if !status.is_success() {
            let err = match serde_json::from_str::<ApiErrorBody>(&body) {
                Ok(api) => {
                    let message = api
                        .error_message
                        .or(api.display_message)
                        .unwrap_or_else(|| format!("HTTP {}", status));
                    ProviderError::from_api(
                        Some(status.as_u16()),
                        api.error_type,
                        api.error_code,
                        message,
                    )
                }
                Err(_) => ProviderError::from_api(
                    Some(status.as_u16()),
                    None,
                    None,
                    format!(
                        "{} returned {}: {}",
                        path,
                        status,
                        body.chars().take(200).collect::<String>()
                    ),
                ),
            };
            return Err(Error::Provider(err));
        }

        serde_json::from_str(&body).map_err(|e| {
            Error::Provider(ProviderError::new(
                ProviderErrorKind::Unclassified,
                format!("Failed to parse {} response: {}", path, e),
            ))
        })
    }
}

fn transport_error(path: &str, err: reqwest::Error) -> Error {
    let kind = if err.is_timeout() {
        ProviderErrorKind::Timeout
    } else {
        ProviderErrorKind::Network
    };
    Error::Provider(ProviderError::new(
        kind,
        format!("{} request failed: {}", path, err),
    ))
}

#[async_trait]
impl AggregatorClient for PlaidApiClient {
    async fn exchange_public_token(&self, public_token: &str) -> Result<TokenExchange> {
        let api: ApiTokenExchange = self
            .post(
                ENDPOINT_TOKEN_EXCHANGE,
                PublicTokenExchangeRequest { public_token },
            )
            .await?;
        Ok(api.into())
    }

    async fn get_item(&self, access_token: &str) -> Result<RemoteItem> {
        let api: ApiItemResponse = self
            .post(ENDPOINT_ITEM_GET, AccessTokenRequest { access_token })
            .await?;
        Ok(api.item.into())
    }

    async fn get_accounts(&self, connection: &InstitutionConnection) -> Result<Vec<RemoteAccount>> {
        let api: ApiAccountsResponse = self
            .post(
                ENDPOINT_ACCOUNTS_GET,
                AccessTokenRequest {
                    access_token: &connection.access_token,
                },
            )
            .await?;
        Ok(api.accounts.into_iter().map(RemoteAccount::from).collect())
    }

    async fn sync_transactions(
        &self,
        connection: &InstitutionConnection,
        request: &TransactionsSyncRequest,
    ) -> Result<TransactionsSyncPage> {
        let api: ApiTransactionsSync = self
            .post(
                ENDPOINT_TRANSACTIONS_SYNC,
                TransactionsSyncBody {
                    access_token: &connection.access_token,
                    cursor: request.cursor.as_deref(),
                    count: request.count,
                    account_id: request.remote_account_id.as_deref(),
                },
            )
            .await?;
        Ok(api.into())
    }

    async fn get_liabilities(
        &self,
        connection: &InstitutionConnection,
    ) -> Result<Vec<RemoteLiability>> {
        let api: ApiLiabilitiesResponse = self
            .post(
                ENDPOINT_LIABILITIES_GET,
                AccessTokenRequest {
                    access_token: &connection.access_token,
                },
            )
            .await?;
        Ok(api.liabilities.into_remote())
    }

    async fn remove_item(&self, connection: &InstitutionConnection) -> Result<()> {
        let _: serde_json::Value = self
            .post(
                ENDPOINT_ITEM_REMOVE,
                AccessTokenRequest {
                    access_token: &connection.access_token,
                },
            )
            .await?;
        Ok(())
    }
}
