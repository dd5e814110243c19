use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use finlink_connect::{
    AggregatorClient, LedgerConfig, LedgeredClient, LinkService, LoggingProgressReporter,
    PlaidApiClient, ReconciliationEngine, RetryPolicy, SyncConfig, SyncOrchestrator,
    TransactionSyncService, TransactionSyncServiceTrait,
};
use finlink_core::{
    accounts::AccountRepositoryTrait,
    balances::BalanceRepositoryTrait,
    connections::ConnectionRepositoryTrait,
    duplicates::DuplicateService,
    limits::{RateLimitConfig, RateLimitService},
    locks::InstitutionLocks,
    provider_calls::ProviderCallRepositoryTrait,
};
use finlink_storage_sqlite::{
    create_pool, init, run_migrations, spawn_writer, AccountRepository, BalanceRepository,
    ConnectionRepository, DbPool, ManualSyncRepository, ProviderCallRepository, SyncRepository,
};

use crate::config::Config;

pub struct AppState {
    pub pool: Arc<DbPool>,
    pub account_repository: Arc<dyn AccountRepositoryTrait>,
    pub connection_repository: Arc<dyn ConnectionRepositoryTrait>,
    pub balance_repository: Arc<dyn BalanceRepositoryTrait>,
    pub provider_call_repository: Arc<dyn ProviderCallRepositoryTrait>,
    pub rate_limiter: Arc<RateLimitService>,
    pub sync_service: Arc<dyn TransactionSyncServiceTrait>,
    pub sync_orchestrator: Arc<SyncOrchestrator<LoggingProgressReporter>>,
    pub link_service: Arc<LinkService>,
    pub reconciler: Arc<ReconciliationEngine>,
    pub duplicate_service: Arc<DuplicateService>,
    /// Cancelled on shutdown; batch syncs stop starting new accounts.
    pub shutdown: CancellationToken,
    pub db_path: String,
}

pub fn init_tracing() {
    let log_format = std::env::var("FL_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

/// Builds the application state against the configured aggregator.
pub async fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let plaid = PlaidApiClient::with_timeout(
        &config.provider_url,
        &config.provider_client_id,
        &config.provider_secret,
        config.provider_timeout,
    )?;
    build_state_with_client(config, Arc::new(plaid)).await
}

/// Builds the application state around `aggregator`. Every call it makes is
/// recorded in the call ledger.
pub async fn build_state_with_client(
    config: &Config,
    aggregator: Arc<dyn AggregatorClient>,
) -> anyhow::Result<Arc<AppState>> {
    let db_path = init(&config.db_path)?;
    tracing::info!("Database path in use: {}", db_path);

    let pool = create_pool(&db_path)?;
    run_migrations(&pool)?;
    let writer = spawn_writer((*pool).clone());

    let account_repo = Arc::new(AccountRepository::new(pool.clone(), writer.clone()));
    let connection_repo = Arc::new(ConnectionRepository::new(pool.clone(), writer.clone()));
    let balance_repo = Arc::new(BalanceRepository::new(pool.clone(), writer.clone()));
    let sync_repo = Arc::new(SyncRepository::new(pool.clone(), writer.clone()));
    let provider_call_repo = Arc::new(ProviderCallRepository::new(pool.clone(), writer.clone()));
    let manual_sync_repo = Arc::new(ManualSyncRepository::new(pool.clone(), writer.clone()));

    let client: Arc<dyn AggregatorClient> = Arc::new(LedgeredClient::new(
        aggregator,
        provider_call_repo.clone(),
        LedgerConfig {
            call_timeout: config.provider_timeout,
            ..LedgerConfig::default()
        },
    ));
    let locks = Arc::new(InstitutionLocks::new());

    let rate_limiter = Arc::new(RateLimitService::new(
        manual_sync_repo,
        RateLimitConfig {
            daily_limit: config.manual_sync_daily_limit,
            ..RateLimitConfig::default()
        },
    ));

    let sync_service = Arc::new(TransactionSyncService::new(
        account_repo.clone(),
        connection_repo.clone(),
        sync_repo,
        client.clone(),
        SyncConfig::default(),
    ));
    let sync_orchestrator = Arc::new(SyncOrchestrator::new(
        sync_service.clone(),
        account_repo.clone(),
        connection_repo.clone(),
        Arc::new(LoggingProgressReporter),
        RetryPolicy::default(),
        config.sync_concurrency,
    ));

    let duplicate_service = Arc::new(DuplicateService::new(
        account_repo.clone(),
        connection_repo.clone(),
        account_repo.clone(),
        locks.clone(),
    ));
    let reconciler = Arc::new(ReconciliationEngine::new(
        account_repo.clone(),
        connection_repo.clone(),
        account_repo.clone(),
        client.clone(),
        locks.clone(),
    ));
    let link_service = Arc::new(LinkService::new(
        account_repo.clone(),
        connection_repo.clone(),
        balance_repo.clone(),
        duplicate_service.clone(),
        reconciler.clone(),
        client,
        locks,
    ));

    Ok(Arc::new(AppState {
        pool,
        account_repository: account_repo,
        connection_repository: connection_repo,
        balance_repository: balance_repo,
        provider_call_repository: provider_call_repo,
        rate_limiter,
        sync_service,
        sync_orchestrator,
        link_service,
        reconciler,
        duplicate_service,
        shutdown: CancellationToken::new(),
        db_path,
    }))
}
