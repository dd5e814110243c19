mod common;

use common::{provider_error, remote_account, Harness};
use finlink_connect::LinkRequest;
use finlink_core::accounts::AccountRepositoryTrait;
use finlink_core::balances::BalanceRepositoryTrait;
use finlink_core::connections::{ConnectionRepositoryTrait, ConnectionStatus};
use finlink_core::errors::{Error, ValidationError};
use finlink_core::providers::ProviderErrorKind;
use finlink_core::transactions::TransactionRepositoryTrait;
use finlink_core::UserContext;

fn ctx() -> UserContext {
    UserContext::new("user-1")
}

fn request(public_token: &str) -> LinkRequest {
    LinkRequest {
        public_token: public_token.to_string(),
        institution_id: Some("ins_1".to_string()),
        institution_name: Some("First Bank".to_string()),
        institution_logo: None,
    }
}

#[tokio::test]
async fn first_link_creates_the_connection_accounts_and_balances() {
    let h = Harness::new();
    h.client.add_exchange("public-1", "access-1", "item-1");
    h.client.set_accounts(
        "access-1",
        vec![
            remote_account("chk", "depository", "Checking", Some("1111")),
            remote_account("sav", "depository", "Savings", Some("2222")),
        ],
    );

    let result = h.link_service().link(&ctx(), request("public-1")).await.unwrap();
    assert!(!result.credentials_refreshed);
    assert_eq!(result.connection.item_id, "item-1");
    assert_eq!(result.connection.user_id, "user-1");
    assert_eq!(result.reconciliation.created, 2);
    assert_eq!(result.balances_recorded, 2);
    assert!(result.merged_before.merged.is_empty());
    assert!(result.merged_after.merged.is_empty());

    let accounts = h.accounts.list_for_connection(&result.connection.id).unwrap();
    assert_eq!(accounts.len(), 2);
    for account in &accounts {
        let balances = h.balances.list_for_account(&account.id).unwrap();
        assert_eq!(balances.len(), 1);
        assert_eq!(balances[0].current, Some(rust_decimal::Decimal::new(12_345, 2)));
    }
}

#[tokio::test]
async fn relinking_after_expiry_moves_the_accounts_to_the_new_item() {
    let h = Harness::new();
    let service = h.link_service();
    h.client.add_exchange("public-1", "access-1", "item-1");
    h.client.set_accounts(
        "access-1",
        vec![remote_account("chk", "depository", "Checking", Some("1111"))],
    );
    let first = service.link(&ctx(), request("public-1")).await.unwrap();
    let account_id = first.reconciliation.created_account_ids[0].clone();
    h.seed_transactions(&account_id, "hist", 12).await;
    h.connections
        .flag_reauth_required(&first.connection.id, "ITEM_LOGIN_REQUIRED".to_string())
        .await
        .unwrap();

    h.client.add_exchange("public-2", "access-2", "item-2");
    h.client.set_accounts(
        "access-2",
        vec![remote_account("chk-2", "depository", "Checking", Some("1111"))],
    );
    let second = service.link(&ctx(), request("public-2")).await.unwrap();
    assert!(!second.credentials_refreshed);
    assert_ne!(second.connection.id, first.connection.id);
    assert_eq!(second.reconciliation.updated, 1);
    assert_eq!(second.reconciliation.created, 0);

    let account = h.accounts.get_by_id(&account_id).unwrap();
    assert_eq!(account.connection_id, second.connection.id);
    assert_eq!(account.remote_account_id, "chk-2");
    assert_eq!(account.sync_cursor, None);
    assert_eq!(h.transactions.count_for_account(&account_id).unwrap(), 12);
    assert_eq!(h.accounts.list_for_user("user-1", false).unwrap().len(), 1);
}

#[tokio::test]
async fn relinking_the_same_item_refreshes_its_credential() {
    let h = Harness::new();
    let service = h.link_service();
    h.client.add_exchange("public-1", "access-1", "item-1");
    h.client.set_accounts(
        "access-1",
        vec![remote_account("chk", "depository", "Checking", Some("1111"))],
    );
    let first = service.link(&ctx(), request("public-1")).await.unwrap();
    h.connections
        .flag_reauth_required(&first.connection.id, "ITEM_LOGIN_REQUIRED".to_string())
        .await
        .unwrap();

    h.client.add_exchange("public-1b", "access-1b", "item-1");
    h.client.set_accounts(
        "access-1b",
        vec![remote_account("chk", "depository", "Checking", Some("1111"))],
    );
    let second = service.link(&ctx(), request("public-1b")).await.unwrap();
    assert!(second.credentials_refreshed);
    assert_eq!(second.connection.id, first.connection.id);
    assert!(!second.connection.reauth_required);
    assert_eq!(second.reconciliation.unchanged, 1);
    assert_eq!(
        h.connections.get_by_id(&first.connection.id).unwrap().access_token,
        "access-1b"
    );
}

#[tokio::test]
async fn an_item_linked_by_another_user_is_a_conflict() {
    let h = Harness::new();
    h.connection("user-2", "ins_1", "item-1", "access-0").await;
    h.client.add_exchange("public-1", "access-1", "item-1");

    let err = h
        .link_service()
        .link(&ctx(), request("public-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
}

#[tokio::test]
async fn blank_public_token_is_rejected() {
    let h = Harness::new();
    let err = h
        .link_service()
        .link(&ctx(), request("  "))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Validation(ValidationError::MissingField(_))
    ));
}

#[tokio::test]
async fn existing_duplicates_are_merged_before_reconciling() {
    let h = Harness::new();
    let first = h.connection("user-1", "ins_1", "item-1", "access-1").await;
    let kept = h
        .account(&first.id, "chk-a", "depository", "Checking", Some("1111"))
        .await;
    h.seed_transactions(&kept.id, "a", 3).await;

    let second = h.connection("user-1", "ins_1", "item-2", "access-2").await;
    let dropped = h
        .account(&second.id, "chk-b", "depository", "Checking", Some("1111"))
        .await;
    h.seed_transactions(&dropped.id, "b", 2).await;
    // Losing its credential ranks the second copy below the first.
    h.connections
        .flag_reauth_required(&second.id, "ITEM_LOGIN_REQUIRED".to_string())
        .await
        .unwrap();

    h.client.add_exchange("public-3", "access-3", "item-3");
    h.client.set_accounts(
        "access-3",
        vec![remote_account("chk-c", "depository", "Checking", Some("1111"))],
    );
    let result = h.link_service().link(&ctx(), request("public-3")).await.unwrap();

    assert_eq!(result.merged_before.merged.len(), 1);
    let merge = &result.merged_before.merged[0];
    assert_eq!(merge.survivor_id.as_deref(), Some(kept.id.as_str()));
    assert_eq!(merge.archived_account_ids, vec![dropped.id.clone()]);
    assert_eq!(merge.transactions_moved, 2);
    assert_eq!(result.reconciliation.updated, 1);
    assert!(result.merged_after.merged.is_empty());

    let survivor = h.accounts.get_by_id(&kept.id).unwrap();
    assert_eq!(survivor.connection_id, result.connection.id);
    assert_eq!(survivor.remote_account_id, "chk-c");
    assert_eq!(h.transactions.count_for_account(&kept.id).unwrap(), 5);
    assert!(h.accounts.get_by_id(&dropped.id).unwrap().is_archived);
    assert_eq!(h.accounts.list_for_user("user-1", false).unwrap().len(), 1);
}

#[tokio::test]
async fn disconnect_removes_the_item_and_keeps_the_history() {
    let h = Harness::new();
    let conn = h.connection("user-1", "ins_1", "item-1", "access-1").await;
    let account = h
        .account(&conn.id, "chk", "depository", "Checking", Some("1111"))
        .await;
    h.seed_transactions(&account.id, "t", 4).await;

    let disconnected = h.link_service().disconnect(&ctx(), &conn.id).await.unwrap();
    assert_eq!(disconnected.status, ConnectionStatus::Disconnected);
    assert_eq!(*h.client.removed_items.lock().unwrap(), vec!["item-1".to_string()]);
    assert_eq!(h.transactions.count_for_account(&account.id).unwrap(), 4);

    // A second disconnect is a no-op.
    h.link_service().disconnect(&ctx(), &conn.id).await.unwrap();
    assert_eq!(h.client.removed_items.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn disconnect_tolerates_an_item_the_aggregator_already_rejects() {
    let h = Harness::new();
    let conn = h.connection("user-1", "ins_1", "item-1", "access-1").await;
    *h.client.remove_error.lock().unwrap() = Some(provider_error(
        ProviderErrorKind::InvalidAccessToken,
        "INVALID_ACCESS_TOKEN",
    ));

    let disconnected = h.link_service().disconnect(&ctx(), &conn.id).await.unwrap();
    assert_eq!(disconnected.status, ConnectionStatus::Disconnected);
}

#[tokio::test]
async fn disconnect_fails_when_the_aggregator_is_down() {
    let h = Harness::new();
    let conn = h.connection("user-1", "ins_1", "item-1", "access-1").await;
    *h.client.remove_error.lock().unwrap() = Some(provider_error(
        ProviderErrorKind::InstitutionDown,
        "INSTITUTION_DOWN",
    ));

    let err = h
        .link_service()
        .disconnect(&ctx(), &conn.id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Provider(_)));
    assert_eq!(
        h.connections.get_by_id(&conn.id).unwrap().status,
        ConnectionStatus::Active
    );
}

#[tokio::test]
async fn disconnect_of_another_users_connection_is_not_found() {
    let h = Harness::new();
    let conn = h.connection("user-2", "ins_1", "item-1", "access-1").await;

    let err = h
        .link_service()
        .disconnect(&ctx(), &conn.id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
    assert!(h.client.removed_items.lock().unwrap().is_empty());
}

#[tokio::test]
async fn purge_deletes_the_connection_and_everything_under_it() {
    let h = Harness::new();
    let conn = h.connection("user-1", "ins_1", "item-1", "access-1").await;
    let account = h
        .account(&conn.id, "chk", "depository", "Checking", Some("1111"))
        .await;
    h.seed_transactions(&account.id, "t", 3).await;

    let deleted = h.link_service().purge(&conn.id).await.unwrap();
    assert_eq!(deleted, 1);
    assert_eq!(*h.client.removed_items.lock().unwrap(), vec!["item-1".to_string()]);
    assert!(matches!(
        h.connections.get_by_id(&conn.id),
        Err(Error::NotFound { .. })
    ));
    assert!(matches!(
        h.accounts.get_by_id(&account.id),
        Err(Error::NotFound { .. })
    ));
    assert_eq!(h.transactions.count_for_account(&account.id).unwrap(), 0);
}
