//! Duplicate merge store and service traits.

use async_trait::async_trait;

use super::duplicates_model::{AutoMergeSummary, DuplicateGroup, MergeResult};
use crate::context::UserContext;
use crate::errors::Result;

/// Atomic account merge.
#[async_trait]
pub trait AccountMergeStoreTrait: Send + Sync {
    /// Moves balances and transactions from `loser_ids` to `survivor_id` and
    /// archives the losers in one transaction.
    ///
    /// Losers that are already archived are ignored, so a replay is a no-op.
    async fn merge_accounts(&self, survivor_id: &str, loser_ids: Vec<String>)
        -> Result<MergeResult>;
}

#[async_trait]
pub trait DuplicateServiceTrait: Send + Sync {
    /// All duplicate groups of one institution.
    fn detect_duplicate_groups(
        &self,
        ctx: &UserContext,
        institution_id: &str,
    ) -> Result<Vec<DuplicateGroup>>;

    /// The first duplicate group of one institution, if any.
    fn detect_duplicates(
        &self,
        ctx: &UserContext,
        institution_id: &str,
    ) -> Result<Option<DuplicateGroup>>;

    /// Merges one group. Members archived since detection are skipped.
    async fn merge(&self, ctx: &UserContext, group: &DuplicateGroup) -> Result<MergeResult>;

    /// Merges every masked group of the institution and surfaces the rest.
    async fn auto_merge(&self, ctx: &UserContext, institution_id: &str)
        -> Result<AutoMergeSummary>;

    /// Operator merge of explicit accounts of one institution.
    async fn merge_accounts(&self, ctx: &UserContext, account_ids: Vec<String>)
        -> Result<MergeResult>;
}
