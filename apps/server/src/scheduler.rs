//! Background scheduler for periodic account sync.
//!
//! Scheduled rounds cover every user with an active connection and do not
//! count against the manual sync allowance.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::main_lib::AppState;

/// Initial delay before the first round (60 seconds to let the server fully start).
const INITIAL_DELAY_SECS: u64 = 60;

/// Starts the background sync scheduler. The loop ends when the state's
/// shutdown token is cancelled.
pub fn start_sync_scheduler(state: Arc<AppState>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Sync scheduler started ({}s interval)", period.as_secs());

        tokio::select! {
            _ = state.shutdown.cancelled() => return,
            _ = tokio::time::sleep(Duration::from_secs(INITIAL_DELAY_SECS)) => {}
        }

        // First tick is immediate, later ones are `period` apart.
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = state.shutdown.cancelled() => {
                    info!("Sync scheduler stopped");
                    return;
                }
                _ = ticker.tick() => run_scheduled_sync(&state).await,
            }
        }
    })
}

/// Runs a single scheduled round.
async fn run_scheduled_sync(state: &AppState) {
    info!("Running scheduled sync...");

    match state.sync_orchestrator.sync_all_users(&state.shutdown).await {
        Ok(summary) => info!(
            synced = summary.synced,
            skipped = summary.skipped,
            errors = summary.errors,
            "Scheduled sync completed: {} transactions",
            summary.total_transactions
        ),
        Err(e) => warn!("Scheduled sync failed: {}", e),
    }

    match state.rate_limiter.prune(Utc::now()).await {
        Ok(0) => {}
        Ok(pruned) => debug!("Pruned {} expired manual sync request(s)", pruned),
        Err(e) => warn!("Pruning manual sync requests failed: {}", e),
    }
}
