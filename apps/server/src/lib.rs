pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod main_lib;
pub mod models;
pub mod scheduler;

pub use main_lib::{build_state, build_state_with_client, init_tracing, AppState};
