//! Call ledger for aggregator requests.

mod provider_calls_model;
mod provider_calls_traits;

pub use provider_calls_model::{CallStatus, NewProviderCall, ProviderCall, ProviderCallSummary};
pub use provider_calls_traits::ProviderCallRepositoryTrait;
