//! Reconnection reconciliation: matching, plan and store contract.

mod matcher;
mod reconciliation_model;
mod reconciliation_traits;


pub use matcher::plan_reconciliation;
pub use reconciliation_model::{
    AccountRepoint, AppliedReconciliation, ReconcileResult, ReconciliationConflict,
    ReconciliationPlan,
};
pub use reconciliation_traits::ReconciliationStoreTrait;
