use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::limits_model::{RateLimitStatus, WindowUsage};
use crate::context::UserContext;
use crate::errors::Result;

/// Storage of granted manual sync requests.
#[async_trait]
pub trait ManualSyncRepositoryTrait: Send + Sync {
    /// Counts the user's requests after `window_start` and, when fewer than
    /// `limit`, records one at `now`. Count and insert happen in one transaction.
    async fn try_acquire(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
        window_start: DateTime<Utc>,
        limit: u32,
    ) -> Result<WindowUsage>;

    /// Current usage without recording anything; `granted` is always false.
    fn usage(&self, user_id: &str, window_start: DateTime<Utc>) -> Result<WindowUsage>;

    /// Deletes requests older than `cutoff`. Returns deleted rows.
    async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}

#[async_trait]
pub trait RateLimitServiceTrait: Send + Sync {
    /// Takes one manual sync slot or fails with `Error::RateLimited`.
    async fn acquire(&self, ctx: &UserContext) -> Result<RateLimitStatus>;

    async fn acquire_at(&self, ctx: &UserContext, now: DateTime<Utc>) -> Result<RateLimitStatus>;

    fn status(&self, ctx: &UserContext) -> Result<RateLimitStatus>;

    fn status_at(&self, ctx: &UserContext, now: DateTime<Utc>) -> Result<RateLimitStatus>;
}
