//! Shared fixtures: a scripted aggregator and a migrated temp database.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use finlink_connect::aggregator::AggregatorClient;
use finlink_connect::{
    LinkService, NoOpProgressReporter, ReconciliationEngine, RetryPolicy, SyncConfig,
    SyncOrchestrator, TransactionSyncService,
};
use finlink_core::accounts::{Account, AccountRepositoryTrait, NewAccount};
use finlink_core::connections::{ConnectionRepositoryTrait, InstitutionConnection, NewConnection};
use finlink_core::duplicates::DuplicateService;
use finlink_core::errors::{Error, Result};
use finlink_core::locks::InstitutionLocks;
use finlink_core::providers::{
    ProviderError, ProviderErrorKind, RemoteAccount, RemoteBalances, RemoteItem, RemoteLiability,
    RemoteTransaction, TokenExchange, TransactionsSyncPage, TransactionsSyncRequest,
    PROVIDER_PLAID,
};
use finlink_core::sync::{NewDownloadLog, SyncCommit, SyncMode, SyncStoreTrait};
use finlink_core::transactions::TransactionUpsert;
use finlink_storage_sqlite::{
    create_pool, init, run_migrations, spawn_writer, AccountRepository, BalanceRepository,
    ConnectionRepository, DbPool, SyncRepository, TransactionRepository, WriteHandle,
};

/// Aggregator double. Every call is answered from scripted state.
#[derive(Default)]
pub struct FakeAggregator {
    /// Pages handed out in order by `sync_transactions`, per remote account id.
    pub pages: Mutex<HashMap<String, VecDeque<std::result::Result<TransactionsSyncPage, ProviderError>>>>,
    pub sync_requests: Mutex<Vec<TransactionsSyncRequest>>,
    /// Account lists by access token.
    pub accounts: Mutex<HashMap<String, Vec<RemoteAccount>>>,
    pub accounts_error: Mutex<Option<ProviderError>>,
    /// Token exchanges by public token.
    pub exchanges: Mutex<HashMap<String, TokenExchange>>,
    pub institution_id: Mutex<Option<String>>,
    pub remove_error: Mutex<Option<ProviderError>>,
    pub removed_items: Mutex<Vec<String>>,
}

impl FakeAggregator {
    pub fn push_page(&self, remote_account_id: &str, page: TransactionsSyncPage) {
        self.pages
            .lock()
            .unwrap()
            .entry(remote_account_id.to_string())
            .or_default()
            .push_back(Ok(page));
    }

    pub fn push_error(&self, remote_account_id: &str, kind: ProviderErrorKind, code: &str) {
        self.pages
            .lock()
            .unwrap()
            .entry(remote_account_id.to_string())
            .or_default()
            .push_back(Err(provider_error(kind, code)));
    }

    pub fn set_accounts(&self, access_token: &str, accounts: Vec<RemoteAccount>) {
        self.accounts
            .lock()
            .unwrap()
            .insert(access_token.to_string(), accounts);
    }

    pub fn add_exchange(&self, public_token: &str, access_token: &str, item_id: &str) {
        self.exchanges.lock().unwrap().insert(
            public_token.to_string(),
            TokenExchange {
                access_token: access_token.to_string(),
                item_id: item_id.to_string(),
            },
        );
    }

    pub fn sync_cursors(&self) -> Vec<Option<String>> {
        self.sync_requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.cursor.clone())
            .collect()
    }
}

pub fn provider_error(kind: ProviderErrorKind, code: &str) -> ProviderError {
    ProviderError {
        kind,
        code: Some(code.to_string()),
        error_type: None,
        message: format!("{code} from test aggregator"),
    }
}

#[async_trait]
impl AggregatorClient for FakeAggregator {
    async fn exchange_public_token(&self, public_token: &str) -> Result<TokenExchange> {
        self.exchanges
            .lock()
            .unwrap()
            .get(public_token)
            .cloned()
            .ok_or_else(|| {
                Error::Provider(provider_error(
                    ProviderErrorKind::InvalidRequest,
                    "INVALID_PUBLIC_TOKEN",
                ))
            })
    }

    async fn get_item(&self, access_token: &str) -> Result<RemoteItem> {
        Ok(RemoteItem {
            item_id: format!("item-for-{access_token}"),
            institution_id: self.institution_id.lock().unwrap().clone(),
            consent_expiration_time: None,
            error_code: None,
        })
    }

    async fn get_accounts(&self, connection: &InstitutionConnection) -> Result<Vec<RemoteAccount>> {
        if let Some(err) = self.accounts_error.lock().unwrap().clone() {
            return Err(Error::Provider(err));
        }
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .get(&connection.access_token)
            .cloned()
            .unwrap_or_default())
    }

    async fn sync_transactions(
        &self,
        _connection: &InstitutionConnection,
        request: &TransactionsSyncRequest,
    ) -> Result<TransactionsSyncPage> {
        self.sync_requests.lock().unwrap().push(request.clone());
        let next = self
            .pages
            .lock()
            .unwrap()
            .get_mut(request.remote_account_id.as_deref().unwrap_or_default())
            .and_then(|queue| queue.pop_front());
        match next {
            Some(Ok(page)) => Ok(page),
            Some(Err(err)) => Err(Error::Provider(err)),
            None => Ok(TransactionsSyncPage {
                next_cursor: request.cursor.clone().unwrap_or_default(),
                ..Default::default()
            }),
        }
    }

    async fn get_liabilities(
        &self,
        _connection: &InstitutionConnection,
    ) -> Result<Vec<RemoteLiability>> {
        Ok(Vec::new())
    }

    async fn remove_item(&self, connection: &InstitutionConnection) -> Result<()> {
        if let Some(err) = self.remove_error.lock().unwrap().clone() {
            return Err(Error::Provider(err));
        }
        self.removed_items
            .lock()
            .unwrap()
            .push(connection.item_id.clone());
        Ok(())
    }
}

/// Migrated database plus repositories. Must be created inside a Tokio runtime.
pub struct Harness {
    pub pool: Arc<DbPool>,
    pub writer: WriteHandle,
    pub accounts: Arc<AccountRepository>,
    pub connections: Arc<ConnectionRepository>,
    pub sync_store: Arc<SyncRepository>,
    pub balances: Arc<BalanceRepository>,
    pub transactions: Arc<TransactionRepository>,
    pub locks: Arc<InstitutionLocks>,
    pub client: Arc<FakeAggregator>,
    _dir: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("finlink-connect-test.db");
        let db_path = init(path.to_str().unwrap()).unwrap();
        let pool = create_pool(&db_path).unwrap();
        run_migrations(&pool).unwrap();
        let writer = spawn_writer((*pool).clone());

        Self {
            accounts: Arc::new(AccountRepository::new(pool.clone(), writer.clone())),
            connections: Arc::new(ConnectionRepository::new(pool.clone(), writer.clone())),
            sync_store: Arc::new(SyncRepository::new(pool.clone(), writer.clone())),
            balances: Arc::new(BalanceRepository::new(pool.clone(), writer.clone())),
            transactions: Arc::new(TransactionRepository::new(pool.clone())),
            locks: Arc::new(InstitutionLocks::new()),
            client: Arc::new(FakeAggregator::default()),
            pool,
            writer,
            _dir: dir,
        }
    }

    pub fn sync_service(&self, config: SyncConfig) -> TransactionSyncService {
        TransactionSyncService::new(
            self.accounts.clone(),
            self.connections.clone(),
            self.sync_store.clone(),
            self.client.clone(),
            config,
        )
    }

    pub fn duplicates(&self) -> DuplicateService {
        DuplicateService::new(
            self.accounts.clone(),
            self.connections.clone(),
            self.accounts.clone(),
            self.locks.clone(),
        )
    }

    pub fn reconciler(&self) -> ReconciliationEngine {
        ReconciliationEngine::new(
            self.accounts.clone(),
            self.connections.clone(),
            self.accounts.clone(),
            self.client.clone(),
            self.locks.clone(),
        )
    }

    pub fn link_service(&self) -> LinkService {
        LinkService::new(
            self.accounts.clone(),
            self.connections.clone(),
            self.balances.clone(),
            Arc::new(self.duplicates()),
            Arc::new(self.reconciler()),
            self.client.clone(),
            self.locks.clone(),
        )
    }

    pub fn orchestrator(
        &self,
        policy: RetryPolicy,
        concurrency: usize,
    ) -> SyncOrchestrator<NoOpProgressReporter> {
        SyncOrchestrator::new(
            Arc::new(self.sync_service(SyncConfig::default())),
            self.accounts.clone(),
            self.connections.clone(),
            Arc::new(NoOpProgressReporter),
            policy,
            concurrency,
        )
    }

    pub async fn connection(
        &self,
        user_id: &str,
        institution_id: &str,
        item_id: &str,
        access_token: &str,
    ) -> InstitutionConnection {
        self.connections
            .create(NewConnection {
                id: None,
                user_id: user_id.to_string(),
                item_id: item_id.to_string(),
                access_token: access_token.to_string(),
                institution_id: institution_id.to_string(),
                institution_name: Some("First Bank".to_string()),
                institution_logo: None,
                provider: PROVIDER_PLAID.to_string(),
            })
            .await
            .unwrap()
    }

    pub async fn account(
        &self,
        connection_id: &str,
        remote_account_id: &str,
        account_type: &str,
        name: &str,
        mask: Option<&str>,
    ) -> Account {
        self.accounts
            .create(NewAccount {
                id: None,
                connection_id: connection_id.to_string(),
                remote_account_id: remote_account_id.to_string(),
                name: name.to_string(),
                official_name: None,
                account_type: account_type.to_string(),
                subtype: None,
                mask: mask.map(str::to_string),
            })
            .await
            .unwrap()
    }

    /// Stores `count` transactions on the account through a sync commit.
    pub async fn seed_transactions(&self, account_id: &str, prefix: &str, count: usize) {
        let upserts = (0..count)
            .map(|i| TransactionUpsert {
                remote_transaction_id: format!("{prefix}-{i}"),
                date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                amount: Decimal::from(i as i64 + 1),
                currency: Some("USD".to_string()),
                name: format!("Purchase {i}"),
                merchant_name: None,
                pending: false,
                category: None,
            })
            .collect();
        let cursor = format!("{prefix}-cursor");
        self.sync_store
            .commit_sync(SyncCommit {
                account_id: account_id.to_string(),
                upserts,
                removed: Vec::new(),
                next_cursor: cursor.clone(),
                log: NewDownloadLog::success(account_id, SyncMode::Full, None, cursor, Utc::now()),
            })
            .await
            .unwrap();
    }
}

pub fn remote_account(
    remote_account_id: &str,
    account_type: &str,
    name: &str,
    mask: Option<&str>,
) -> RemoteAccount {
    RemoteAccount {
        remote_account_id: remote_account_id.to_string(),
        name: name.to_string(),
        official_name: None,
        account_type: account_type.to_string(),
        subtype: None,
        mask: mask.map(str::to_string),
        balances: RemoteBalances {
            current: Some(Decimal::new(12_345, 2)),
            available: None,
            limit: None,
            currency: Some("USD".to_string()),
        },
    }
}

pub fn remote_txn(id: &str, remote_account_id: &str, amount: Decimal) -> RemoteTransaction {
    RemoteTransaction {
        remote_transaction_id: id.to_string(),
        remote_account_id: remote_account_id.to_string(),
        date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        amount,
        currency: Some("USD".to_string()),
        name: "Grocer".to_string(),
        merchant_name: Some("Grocer".to_string()),
        pending: false,
        category: Some("FOOD_AND_DRINK".to_string()),
    }
}

pub fn page(
    added: Vec<RemoteTransaction>,
    removed: Vec<&str>,
    next_cursor: &str,
    has_more: bool,
) -> TransactionsSyncPage {
    TransactionsSyncPage {
        added,
        modified: Vec::new(),
        removed: removed.into_iter().map(str::to_string).collect(),
        next_cursor: next_cursor.to_string(),
        has_more,
    }
}
