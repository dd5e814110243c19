mod common;

use rust_decimal_macros::dec;

use common::{page, remote_txn, Harness};
use finlink_connect::{SyncConfig, TransactionSyncServiceTrait};
use finlink_core::accounts::AccountRepositoryTrait;
use finlink_core::connections::ConnectionRepositoryTrait;
use finlink_core::errors::Error;
use finlink_core::providers::ProviderErrorKind;
use finlink_core::sync::{DownloadOutcome, SyncError, SyncMode, SyncRunStatus};
use finlink_core::transactions::TransactionRepositoryTrait;
use finlink_core::UserContext;

fn ctx() -> UserContext {
    UserContext::new("user-1")
}

#[tokio::test]
async fn replaying_an_incremental_sync_changes_nothing() {
    let h = Harness::new();
    let conn = h.connection("user-1", "ins_1", "item-1", "access-1").await;
    let account = h
        .account(&conn.id, "chk", "depository", "Checking", Some("1111"))
        .await;
    let service = h.sync_service(SyncConfig::default());

    h.client.push_page(
        "chk",
        page(
            vec![remote_txn("t1", "chk", dec!(-4.50)), remote_txn("t2", "chk", dec!(1200))],
            vec![],
            "c1",
            false,
        ),
    );
    let first = service.sync(&ctx(), &account.id, false).await.unwrap();
    assert_eq!(first.mode, SyncMode::Full);
    assert_eq!(first.status, SyncRunStatus::Completed);
    assert_eq!(first.downloaded, 2);
    assert_eq!(first.inserted, 2);
    assert!(first.cursor_advanced);

    // The aggregator hands the same page out again from the stored cursor.
    h.client.push_page(
        "chk",
        page(
            vec![remote_txn("t1", "chk", dec!(-4.50)), remote_txn("t2", "chk", dec!(1200))],
            vec![],
            "c1",
            false,
        ),
    );
    let second = service.sync(&ctx(), &account.id, false).await.unwrap();
    assert_eq!(second.mode, SyncMode::Incremental);
    assert_eq!(second.inserted, 0);
    assert_eq!(second.updated, 2);
    assert!(!second.cursor_advanced);

    assert_eq!(h.client.sync_cursors(), vec![None, Some("c1".to_string())]);
    assert_eq!(h.transactions.count_for_account(&account.id).unwrap(), 2);
    let stored = h.accounts.get_by_id(&account.id).unwrap();
    assert_eq!(stored.sync_cursor.as_deref(), Some("c1"));
    assert!(stored.last_synced_at.is_some());
}

#[tokio::test]
async fn failure_mid_pagination_keeps_the_previous_cursor() {
    let h = Harness::new();
    let conn = h.connection("user-1", "ins_1", "item-1", "access-1").await;
    let account = h
        .account(&conn.id, "chk", "depository", "Checking", Some("1111"))
        .await;
    let service = h.sync_service(SyncConfig::default());

    h.client.push_page("chk", page(vec![remote_txn("t1", "chk", dec!(10))], vec![], "c1", false));
    service.sync(&ctx(), &account.id, false).await.unwrap();

    h.client.push_page(
        "chk",
        page(
            vec![remote_txn("t2", "chk", dec!(20))],
            vec!["t1"],
            "c2",
            true,
        ),
    );
    h.client.push_error("chk", ProviderErrorKind::InstitutionDown, "INSTITUTION_DOWN");
    let err = service.sync(&ctx(), &account.id, false).await.unwrap_err();
    assert_eq!(
        err.as_provider().map(|p| p.kind),
        Some(ProviderErrorKind::InstitutionDown)
    );

    let stored = h.accounts.get_by_id(&account.id).unwrap();
    assert_eq!(stored.sync_cursor.as_deref(), Some("c1"));
    let txns = h.transactions.list_for_account(&account.id, None).unwrap();
    assert_eq!(txns.len(), 1);
    assert_eq!(txns[0].remote_transaction_id, "t1");

    let logs = service.recent_logs(&ctx(), &account.id, 10).unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].outcome, DownloadOutcome::Failed);
    assert_eq!(logs[0].pages, 2);
    assert_eq!(logs[0].cursor_before.as_deref(), Some("c1"));
    assert_eq!(logs[0].cursor_after.as_deref(), Some("c1"));
    // The connection is healthy; transient failures never flag it.
    assert!(!h.connections.get_by_id(&conn.id).unwrap().reauth_required);
}

#[tokio::test]
async fn dead_credentials_flag_the_connection_without_failing() {
    let h = Harness::new();
    let conn = h.connection("user-1", "ins_1", "item-1", "access-1").await;
    let account = h
        .account(&conn.id, "chk", "depository", "Checking", Some("1111"))
        .await;
    let service = h.sync_service(SyncConfig::default());

    h.client.push_error("chk", ProviderErrorKind::LoginRequired, "ITEM_LOGIN_REQUIRED");
    let outcome = service.sync(&ctx(), &account.id, false).await.unwrap();
    assert_eq!(outcome.status, SyncRunStatus::ReauthRequired);
    assert!(!outcome.cursor_advanced);

    let flagged = h.connections.get_by_id(&conn.id).unwrap();
    assert!(flagged.reauth_required);
    assert_eq!(flagged.last_error.as_deref(), Some("ITEM_LOGIN_REQUIRED"));

    let logs = service.recent_logs(&ctx(), &account.id, 10).unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].outcome, DownloadOutcome::ReauthRequired);

    // Flagged connections are not synced until the user re-authenticates.
    let err = service.sync(&ctx(), &account.id, false).await.unwrap_err();
    assert!(matches!(err, Error::Sync(SyncError::Ineligible(_))));
    assert_eq!(service.recent_logs(&ctx(), &account.id, 10).unwrap().len(), 1);
}

#[tokio::test]
async fn mutation_during_pagination_restarts_from_the_starting_cursor() {
    let h = Harness::new();
    let conn = h.connection("user-1", "ins_1", "item-1", "access-1").await;
    let account = h
        .account(&conn.id, "chk", "depository", "Checking", Some("1111"))
        .await;
    let service = h.sync_service(SyncConfig::default());

    h.client.push_page("chk", page(vec![remote_txn("t1", "chk", dec!(1))], vec![], "p1", true));
    h.client.push_error(
        "chk",
        ProviderErrorKind::MutationDuringPagination,
        "TRANSACTIONS_SYNC_MUTATION_DURING_PAGINATION",
    );
    h.client.push_page("chk", page(vec![remote_txn("t1", "chk", dec!(1))], vec![], "p1", true));
    h.client.push_page("chk", page(vec![remote_txn("t2", "chk", dec!(2))], vec![], "p2", false));

    let outcome = service.sync(&ctx(), &account.id, false).await.unwrap();
    assert_eq!(outcome.inserted, 2);
    assert_eq!(outcome.downloaded, 2);
    assert_eq!(
        h.client.sync_cursors(),
        vec![None, Some("p1".to_string()), None, Some("p1".to_string())]
    );
    assert_eq!(
        h.accounts.get_by_id(&account.id).unwrap().sync_cursor.as_deref(),
        Some("p2")
    );
}

#[tokio::test]
async fn repeated_mutations_exhaust_the_restart_budget() {
    let h = Harness::new();
    let conn = h.connection("user-1", "ins_1", "item-1", "access-1").await;
    let account = h
        .account(&conn.id, "chk", "depository", "Checking", Some("1111"))
        .await;
    let service = h.sync_service(SyncConfig {
        max_pagination_restarts: 1,
        ..SyncConfig::default()
    });

    for _ in 0..2 {
        h.client.push_error(
            "chk",
            ProviderErrorKind::MutationDuringPagination,
            "TRANSACTIONS_SYNC_MUTATION_DURING_PAGINATION",
        );
    }
    let err = service.sync(&ctx(), &account.id, false).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Sync(SyncError::PaginationRestartsExhausted(1))
    ));
    assert_eq!(h.accounts.get_by_id(&account.id).unwrap().sync_cursor, None);
}

#[tokio::test]
async fn stuck_cursor_aborts_the_invocation() {
    let h = Harness::new();
    let conn = h.connection("user-1", "ins_1", "item-1", "access-1").await;
    let account = h
        .account(&conn.id, "chk", "depository", "Checking", Some("1111"))
        .await;
    let service = h.sync_service(SyncConfig::default());

    h.client.push_page("chk", page(vec![], vec![], "c1", false));
    service.sync(&ctx(), &account.id, false).await.unwrap();

    h.client.push_page("chk", page(vec![], vec![], "c1", true));
    let err = service.sync(&ctx(), &account.id, false).await.unwrap_err();
    assert!(matches!(err, Error::Sync(SyncError::CursorStuck)));
}

#[tokio::test]
async fn forced_resync_starts_over_and_removals_are_deleted() {
    let h = Harness::new();
    let conn = h.connection("user-1", "ins_1", "item-1", "access-1").await;
    let account = h
        .account(&conn.id, "card", "credit", "Rewards Card", Some("9999"))
        .await;
    let service = h.sync_service(SyncConfig::default());

    h.client.push_page(
        "card",
        page(
            vec![remote_txn("t1", "card", dec!(25.10)), remote_txn("t2", "card", dec!(-100))],
            vec![],
            "c1",
            false,
        ),
    );
    service.sync(&ctx(), &account.id, false).await.unwrap();

    let txns = h.transactions.list_for_account(&account.id, None).unwrap();
    let charge = txns
        .iter()
        .find(|t| t.remote_transaction_id == "t1")
        .unwrap();
    assert_eq!(charge.amount, dec!(-25.10));
    let payment = txns
        .iter()
        .find(|t| t.remote_transaction_id == "t2")
        .unwrap();
    assert_eq!(payment.amount, dec!(100));

    h.client.push_page("card", page(vec![], vec!["t2"], "c9", false));
    let outcome = service.sync(&ctx(), &account.id, true).await.unwrap();
    assert_eq!(outcome.mode, SyncMode::Full);
    assert_eq!(outcome.removed, 1);
    assert_eq!(h.client.sync_cursors().last().cloned(), Some(None));
    assert_eq!(h.transactions.count_for_account(&account.id).unwrap(), 1);
}

#[tokio::test]
async fn success_without_a_cursor_counts_as_no_progress() {
    let h = Harness::new();
    let conn = h.connection("user-1", "ins_1", "item-1", "access-1").await;
    let account = h
        .account(&conn.id, "chk", "depository", "Checking", Some("1111"))
        .await;
    let service = h.sync_service(SyncConfig {
        stall_threshold: 2,
        ..SyncConfig::default()
    });

    h.client.push_page("chk", page(vec![], vec![], "", false));
    let first = service.sync(&ctx(), &account.id, false).await.unwrap();
    assert!(!first.stalled);

    h.client.push_page("chk", page(vec![], vec![], "", false));
    let second = service.sync(&ctx(), &account.id, false).await.unwrap();
    assert!(second.stalled);
}

#[tokio::test]
async fn other_users_accounts_are_not_found() {
    let h = Harness::new();
    let conn = h.connection("user-1", "ins_1", "item-1", "access-1").await;
    let account = h
        .account(&conn.id, "chk", "depository", "Checking", Some("1111"))
        .await;
    let service = h.sync_service(SyncConfig::default());

    let err = service
        .sync(&UserContext::new("user-2"), &account.id, false)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
    assert!(h.client.sync_cursors().is_empty());
}
