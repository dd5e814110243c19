//! Manual sync rate limit models.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MANUAL_SYNC_DAILY_LIMIT: u32 = 5;
pub const DEFAULT_WINDOW_HOURS: i64 = 24;

/// Sliding window applied to user-initiated syncs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub daily_limit: u32,
    pub window_hours: i64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            daily_limit: DEFAULT_MANUAL_SYNC_DAILY_LIMIT,
            window_hours: DEFAULT_WINDOW_HOURS,
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::hours(self.window_hours)
    }
}

/// Requests inside the window as seen by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowUsage {
    /// Requests in the window, including the one just granted.
    pub used: u32,
    pub oldest: Option<DateTime<Utc>>,
    /// Whether the request that produced this usage was recorded.
    pub granted: bool,
}

/// Manual sync allowance reported to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStatus {
    pub limit: u32,
    pub used: u32,
    pub remaining: u32,
    /// When the oldest request in the window falls out of it.
    pub reset_time: DateTime<Utc>,
    pub allowed: bool,
}

impl RateLimitStatus {
    /// Whole seconds until `reset_time`, never negative.
    pub fn retry_after_secs(&self, now: DateTime<Utc>) -> i64 {
        (self.reset_time - now).num_seconds().max(0)
    }
}

/// Derives the allowance from window usage.
///
/// With an empty window the reset time is a full window after `now`.
pub fn compute_status(
    config: &RateLimitConfig,
    usage: &WindowUsage,
    now: DateTime<Utc>,
) -> RateLimitStatus {
    let reset_time = usage
        .oldest
        .map(|oldest| oldest + config.window())
        .unwrap_or(now + config.window());
    RateLimitStatus {
        limit: config.daily_limit,
        used: usage.used,
        remaining: config.daily_limit.saturating_sub(usage.used),
        reset_time,
        allowed: usage.granted || usage.used < config.daily_limit,
    }
}
