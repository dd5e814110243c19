use async_trait::async_trait;

use super::reconciliation_model::{AppliedReconciliation, ReconciliationPlan};
use crate::errors::Result;

#[async_trait]
pub trait ReconciliationStoreTrait: Send + Sync {
    /// Archives orphans, applies repoints and creates new accounts in one
    /// transaction. Any uniqueness failure rolls the whole plan back.
    async fn apply_reconciliation(&self, plan: ReconciliationPlan)
        -> Result<AppliedReconciliation>;
}
