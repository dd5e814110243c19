use async_trait::async_trait;
use chrono::NaiveDateTime;

use super::provider_calls_model::{NewProviderCall, ProviderCall, ProviderCallSummary};
use crate::errors::Result;

/// Append-only ledger of aggregator calls.
#[async_trait]
pub trait ProviderCallRepositoryTrait: Send + Sync {
    async fn record(&self, call: NewProviderCall) -> Result<()>;

    /// Failed calls for one institution since `since`.
    fn count_failures_since(&self, institution_id: &str, since: NaiveDateTime) -> Result<i64>;

    /// Totals grouped by institution and endpoint, busiest first.
    fn summary_since(&self, since: NaiveDateTime) -> Result<Vec<ProviderCallSummary>>;

    /// Newest calls for one institution.
    fn recent_for_institution(&self, institution_id: &str, limit: i64)
        -> Result<Vec<ProviderCall>>;
}
