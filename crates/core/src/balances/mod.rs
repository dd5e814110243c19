//! Balance snapshots.

mod balances_model;
mod balances_traits;

pub use balances_model::{monthly_collapse_victims, Balance, NewBalance};
pub use balances_traits::BalanceRepositoryTrait;
