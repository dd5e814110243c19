//! Manual sync rate limits - models, service, and traits.

mod limits_model;
mod limits_service;
mod limits_traits;


pub use limits_model::{
    compute_status, RateLimitConfig, RateLimitStatus, WindowUsage,
    DEFAULT_MANUAL_SYNC_DAILY_LIMIT, DEFAULT_WINDOW_HOURS,
};
pub use limits_service::RateLimitService;
pub use limits_traits::{ManualSyncRepositoryTrait, RateLimitServiceTrait};
