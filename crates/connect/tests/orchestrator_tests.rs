mod common;

use rust_decimal_macros::dec;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use common::{page, remote_txn, Harness};
use finlink_connect::{AccountSyncResult, AccountSyncStatus, BatchSyncSummary, RetryPolicy};
use finlink_core::connections::{ConnectionRepositoryTrait, NewConnection};
use finlink_core::providers::{ProviderErrorKind, PROVIDER_MANUAL};
use finlink_core::UserContext;

fn fast_retries() -> RetryPolicy {
    RetryPolicy {
        max_retries: 2,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        ..RetryPolicy::default()
    }
}

fn result_for<'a>(summary: &'a BatchSyncSummary, account_id: &str) -> &'a AccountSyncResult {
    summary
        .results
        .iter()
        .find(|r| r.account_id == account_id)
        .unwrap()
}

#[tokio::test]
async fn batch_sync_reports_every_account_independently() {
    let h = Harness::new();
    let ctx = UserContext::new("user-1");

    let healthy_conn = h.connection("user-1", "ins_1", "item-1", "access-1").await;
    let healthy = h
        .account(&healthy_conn.id, "acc-a", "depository", "Checking", Some("1111"))
        .await;
    h.client.push_page(
        "acc-a",
        page(
            vec![remote_txn("a1", "acc-a", dec!(5)), remote_txn("a2", "acc-a", dec!(6))],
            vec![],
            "a-cursor",
            false,
        ),
    );

    let flaky_conn = h.connection("user-1", "ins_2", "item-2", "access-2").await;
    let flaky = h
        .account(&flaky_conn.id, "acc-b", "depository", "Savings", Some("2222"))
        .await;
    h.client.push_error("acc-b", ProviderErrorKind::InstitutionDown, "INSTITUTION_DOWN");
    h.client.push_page(
        "acc-b",
        page(vec![remote_txn("b1", "acc-b", dec!(7))], vec![], "b-cursor", false),
    );

    let expired_conn = h.connection("user-1", "ins_3", "item-3", "access-3").await;
    let expired = h
        .account(&expired_conn.id, "acc-c", "credit", "Card", Some("3333"))
        .await;
    h.client.push_error("acc-c", ProviderErrorKind::LoginRequired, "ITEM_LOGIN_REQUIRED");

    let manual_conn = h
        .connections
        .create(NewConnection {
            id: None,
            user_id: "user-1".to_string(),
            item_id: "manual-1".to_string(),
            access_token: String::new(),
            institution_id: "ins_4".to_string(),
            institution_name: Some("Cash".to_string()),
            institution_logo: None,
            provider: PROVIDER_MANUAL.to_string(),
        })
        .await
        .unwrap();
    let manual = h
        .account(&manual_conn.id, "acc-d", "depository", "Wallet", None)
        .await;

    let summary = h
        .orchestrator(fast_retries(), 4)
        .sync_user(&ctx, false, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.results.len(), 4);
    assert_eq!(summary.synced, 2);
    assert_eq!(summary.errors, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.total_transactions, 3);

    let a = result_for(&summary, &healthy.id);
    assert_eq!(a.status, AccountSyncStatus::Success);
    assert_eq!(a.attempts, 1);
    assert_eq!(a.inserted, 2);

    let b = result_for(&summary, &flaky.id);
    assert_eq!(b.status, AccountSyncStatus::Success);
    assert_eq!(b.attempts, 2);

    let c = result_for(&summary, &expired.id);
    assert_eq!(c.status, AccountSyncStatus::Error);
    assert_eq!(c.attempts, 1);
    assert!(c.error.is_some());
    assert!(h.connections.get_by_id(&expired_conn.id).unwrap().reauth_required);

    let d = result_for(&summary, &manual.id);
    assert_eq!(d.status, AccountSyncStatus::Skipped);
    assert_eq!(d.error.as_deref(), Some("manual connection"));
}

#[tokio::test]
async fn retries_stop_after_the_policy_limit() {
    let h = Harness::new();
    let conn = h.connection("user-1", "ins_1", "item-1", "access-1").await;
    let account = h
        .account(&conn.id, "acc-a", "depository", "Checking", Some("1111"))
        .await;
    for _ in 0..3 {
        h.client.push_error("acc-a", ProviderErrorKind::ServerError, "INTERNAL_SERVER_ERROR");
    }

    let result = h
        .orchestrator(fast_retries(), 1)
        .sync_account(&UserContext::new("user-1"), &account.id, false)
        .await;
    assert_eq!(result.status, AccountSyncStatus::Error);
    assert_eq!(result.attempts, 3);
    assert_eq!(h.client.sync_cursors().len(), 3);
}

#[tokio::test]
async fn cancelled_batch_skips_every_account() {
    let h = Harness::new();
    let conn = h.connection("user-1", "ins_1", "item-1", "access-1").await;
    h.account(&conn.id, "acc-a", "depository", "Checking", Some("1111"))
        .await;
    h.account(&conn.id, "acc-b", "depository", "Savings", Some("2222"))
        .await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let summary = h
        .orchestrator(fast_retries(), 2)
        .sync_user(&UserContext::new("user-1"), false, &cancel)
        .await
        .unwrap();

    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.synced, 0);
    assert!(summary
        .results
        .iter()
        .all(|r| r.error.as_deref() == Some("sync cancelled")));
    assert!(h.client.sync_cursors().is_empty());
}

#[tokio::test]
async fn scheduled_sync_covers_every_user() {
    let h = Harness::new();
    let first = h.connection("user-1", "ins_1", "item-1", "access-1").await;
    h.account(&first.id, "acc-a", "depository", "Checking", Some("1111"))
        .await;
    let second = h.connection("user-2", "ins_1", "item-2", "access-2").await;
    h.account(&second.id, "acc-b", "depository", "Checking", Some("2222"))
        .await;
    h.client.push_page(
        "acc-a",
        page(vec![remote_txn("a1", "acc-a", dec!(1))], vec![], "a-cursor", false),
    );
    h.client.push_page(
        "acc-b",
        page(vec![remote_txn("b1", "acc-b", dec!(2))], vec![], "b-cursor", false),
    );

    let summary = h
        .orchestrator(RetryPolicy::none(), 2)
        .sync_all_users(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary.synced, 2);
    assert_eq!(summary.total_transactions, 2);
}
