mod common;

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::Harness;
use finlink_connect::aggregator::AggregatorClient;
use finlink_connect::{LedgerConfig, LedgeredClient, PlaidApiClient};
use finlink_core::errors::Error;
use finlink_core::provider_calls::{CallStatus, ProviderCallRepositoryTrait};
use finlink_core::providers::{ProviderErrorKind, TransactionsSyncRequest};
use finlink_storage_sqlite::ProviderCallRepository;

fn client(server: &MockServer) -> PlaidApiClient {
    PlaidApiClient::new(&server.uri(), "client-123", "secret-456").unwrap()
}

fn provider_kind(err: &Error) -> Option<ProviderErrorKind> {
    err.as_provider().map(|p| p.kind)
}

#[tokio::test]
async fn requests_carry_the_api_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/item/public_token/exchange"))
        .and(body_partial_json(json!({
            "client_id": "client-123",
            "secret": "secret-456",
            "public_token": "public-sandbox-1",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-sandbox-1",
            "item_id": "item-1",
            "request_id": "req-1",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let exchange = client(&server)
        .exchange_public_token("public-sandbox-1")
        .await
        .unwrap();
    assert_eq!(exchange.access_token, "access-sandbox-1");
    assert_eq!(exchange.item_id, "item-1");
}

#[tokio::test]
async fn accounts_and_transaction_pages_are_mapped() {
    let h = Harness::new();
    let conn = h.connection("user-1", "ins_1", "item-1", "access-1").await;
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/accounts/get"))
        .and(body_partial_json(json!({ "access_token": "access-1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accounts": [{
                "account_id": "chk",
                "name": "Checking",
                "official_name": "Premier Checking",
                "type": "depository",
                "subtype": "checking",
                "mask": "1111",
                "balances": {
                    "current": 1250.5,
                    "available": 1200,
                    "limit": null,
                    "iso_currency_code": "USD"
                }
            }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/transactions/sync"))
        .and(body_partial_json(json!({
            "access_token": "access-1",
            "cursor": "c0",
            "count": 100,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "added": [{
                "transaction_id": "t1",
                "account_id": "chk",
                "amount": 12.5,
                "date": "2024-03-01",
                "name": "Coffee",
                "pending": false,
                "iso_currency_code": "USD",
                "personal_finance_category": { "primary": "FOOD_AND_DRINK" }
            }],
            "modified": [],
            "removed": [{ "transaction_id": "t0" }],
            "next_cursor": "c1",
            "has_more": true
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let accounts = client.get_accounts(&conn).await.unwrap();
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].remote_account_id, "chk");
    assert_eq!(accounts[0].mask.as_deref(), Some("1111"));
    assert_eq!(accounts[0].balances.currency.as_deref(), Some("USD"));
    assert_eq!(accounts[0].balances.current, Some(rust_decimal::Decimal::new(12_505, 1)));

    let page = client
        .sync_transactions(
            &conn,
            &TransactionsSyncRequest {
                cursor: Some("c0".to_string()),
                count: 100,
                remote_account_id: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(page.added.len(), 1);
    assert_eq!(page.added[0].remote_transaction_id, "t1");
    assert_eq!(page.removed, vec!["t0".to_string()]);
    assert_eq!(page.next_cursor, "c1");
    assert!(page.has_more);
}

#[tokio::test]
async fn error_bodies_are_classified_by_code() {
    let h = Harness::new();
    let conn = h.connection("user-1", "ins_1", "item-1", "access-1").await;
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/accounts/get"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error_type": "ITEM_ERROR",
            "error_code": "ITEM_LOGIN_REQUIRED",
            "error_message": "the login details of this item have changed",
            "display_message": null
        })))
        .mount(&server)
        .await;

    let err = client(&server).get_accounts(&conn).await.unwrap_err();
    let provider = err.as_provider().unwrap();
    assert_eq!(provider.kind, ProviderErrorKind::LoginRequired);
    assert!(provider.is_credential_invalid());
    assert_eq!(provider.code.as_deref(), Some("ITEM_LOGIN_REQUIRED"));
    assert_eq!(provider.error_type.as_deref(), Some("ITEM_ERROR"));
}

#[tokio::test]
async fn bare_server_errors_fall_back_to_the_status() {
    let h = Harness::new();
    let conn = h.connection("user-1", "ins_1", "item-1", "access-1").await;
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/item/remove"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/liabilities/get"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let client = client(&server);
    let err = client.remove_item(&conn).await.unwrap_err();
    assert_eq!(provider_kind(&err), Some(ProviderErrorKind::ServerError));
    let err = client.get_liabilities(&conn).await.unwrap_err();
    assert_eq!(provider_kind(&err), Some(ProviderErrorKind::RateLimited));
}

#[tokio::test]
async fn slow_answers_time_out() {
    let h = Harness::new();
    let conn = h.connection("user-1", "ins_1", "item-1", "access-1").await;
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/accounts/get"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "accounts": [] }))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let client = PlaidApiClient::with_timeout(
        &server.uri(),
        "client-123",
        "secret-456",
        Duration::from_millis(50),
    )
    .unwrap();
    let err = client.get_accounts(&conn).await.unwrap_err();
    assert_eq!(provider_kind(&err), Some(ProviderErrorKind::Timeout));
}

#[tokio::test]
async fn ledger_records_every_call_with_its_outcome() {
    let h = Harness::new();
    let conn = h.connection("user-1", "ins_1", "item-1", "access-1").await;
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/accounts/get"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "accounts": [] })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/liabilities/get"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error_type": "INSTITUTION_ERROR",
            "error_code": "INSTITUTION_DOWN",
            "error_message": "the institution is down"
        })))
        .mount(&server)
        .await;

    let ledger = Arc::new(ProviderCallRepository::new(h.pool.clone(), h.writer.clone()));
    let client = LedgeredClient::new(
        Arc::new(client(&server)),
        ledger.clone(),
        LedgerConfig::default(),
    );
    client.get_accounts(&conn).await.unwrap();
    client.get_liabilities(&conn).await.unwrap_err();

    let calls = ledger.recent_for_institution("ins_1", 10).unwrap();
    assert_eq!(calls.len(), 2);
    let failed = calls
        .iter()
        .find(|c| c.endpoint == "/liabilities/get")
        .unwrap();
    assert_eq!(failed.status, CallStatus::Error);
    assert_eq!(failed.error_code.as_deref(), Some("INSTITUTION_DOWN"));
    assert_eq!(failed.connection_id.as_deref(), Some(conn.id.as_str()));
    let ok = calls.iter().find(|c| c.endpoint == "/accounts/get").unwrap();
    assert_eq!(ok.status, CallStatus::Success);
    assert_eq!(ok.user_id.as_deref(), Some("user-1"));
}

#[tokio::test]
async fn ledger_bounds_calls_with_its_own_timeout() {
    let h = Harness::new();
    let conn = h.connection("user-1", "ins_1", "item-1", "access-1").await;
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/accounts/get"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "accounts": [] }))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let ledger = Arc::new(ProviderCallRepository::new(h.pool.clone(), h.writer.clone()));
    let client = LedgeredClient::new(
        Arc::new(client(&server)),
        ledger.clone(),
        LedgerConfig {
            call_timeout: Duration::from_millis(50),
            ..LedgerConfig::default()
        },
    );
    let err = client.get_accounts(&conn).await.unwrap_err();
    assert_eq!(provider_kind(&err), Some(ProviderErrorKind::Timeout));

    let calls = ledger.recent_for_institution("ins_1", 10).unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].status, CallStatus::Error);
    assert_eq!(calls[0].error_code.as_deref(), Some("TIMEOUT"));
}
