use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::sync::Arc;

use super::limits_model::{compute_status, RateLimitConfig, RateLimitStatus};
use super::limits_traits::{ManualSyncRepositoryTrait, RateLimitServiceTrait};
use crate::context::UserContext;
use crate::errors::{Error, Result};

/// Per-user sliding window over manual syncs.
pub struct RateLimitService {
    repository: Arc<dyn ManualSyncRepositoryTrait>,
    config: RateLimitConfig,
}

impl RateLimitService {
    pub fn new(repository: Arc<dyn ManualSyncRepositoryTrait>, config: RateLimitConfig) -> Self {
        Self { repository, config }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Drops events that can no longer affect any window.
    pub async fn prune(&self, now: DateTime<Utc>) -> Result<usize> {
        self.repository.prune_before(now - self.config.window()).await
    }
}

#[async_trait]
impl RateLimitServiceTrait for RateLimitService {
    async fn acquire(&self, ctx: &UserContext) -> Result<RateLimitStatus> {
        self.acquire_at(ctx, Utc::now()).await
    }

    async fn acquire_at(&self, ctx: &UserContext, now: DateTime<Utc>) -> Result<RateLimitStatus> {
        let window_start = now - self.config.window();
        let usage = self
            .repository
            .try_acquire(ctx.user_id(), now, window_start, self.config.daily_limit)
            .await?;
        let status = compute_status(&self.config, &usage, now);

        if usage.granted {
            debug!(
                "Manual sync granted for user {} ({} of {} used)",
                ctx.user_id(),
                status.used,
                status.limit
            );
            Ok(status)
        } else {
            warn!(
                "Manual sync limit reached for user {}; next slot at {}",
                ctx.user_id(),
                status.reset_time
            );
            Err(Error::RateLimited(RateLimitStatus {
                allowed: false,
                ..status
            }))
        }
    }

    fn status(&self, ctx: &UserContext) -> Result<RateLimitStatus> {
        self.status_at(ctx, Utc::now())
    }

    fn status_at(&self, ctx: &UserContext, now: DateTime<Utc>) -> Result<RateLimitStatus> {
        let usage = self
            .repository
            .usage(ctx.user_id(), now - self.config.window())?;
        Ok(compute_status(&self.config, &usage, now))
    }
}
