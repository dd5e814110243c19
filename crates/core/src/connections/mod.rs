//! Institution connections - one per aggregator item.

mod connections_model;
mod connections_traits;

pub use connections_model::{ConnectionStatus, InstitutionConnection, NewConnection};
pub use connections_traits::ConnectionRepositoryTrait;
