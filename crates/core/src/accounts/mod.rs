//! Accounts module - domain models and traits.

mod accounts_constants;
mod accounts_model;
mod accounts_traits;


// Re-export the public interface
pub use accounts_constants::*;
pub use accounts_model::{
    is_sign_inverted, Account, AccountActivity, AccountDetailsUpdate, AccountIdentity, NewAccount,
};
pub use accounts_traits::AccountRepositoryTrait;
