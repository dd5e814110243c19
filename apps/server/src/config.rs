//! Server configuration read from `FL_*` environment variables.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use finlink_connect::DEFAULT_PROVIDER_URL;
use finlink_core::limits::DEFAULT_MANUAL_SYNC_DAILY_LIMIT;

const DEFAULT_DB_PATH: &str = "./db/finlink.db";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 60_000;
const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SYNC_CONCURRENCY: usize = 4;
/// Scheduled sync every 4 hours.
const DEFAULT_SYNC_INTERVAL_SECS: u64 = 4 * 60 * 60;

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub db_path: String,
    /// Allowed CORS origins; `*` allows any.
    pub cors_allow_origins: Vec<String>,
    pub request_timeout: Duration,
    pub provider_url: String,
    pub provider_client_id: String,
    pub provider_secret: String,
    pub provider_timeout: Duration,
    pub manual_sync_daily_limit: u32,
    pub sync_concurrency: usize,
    /// `None` disables the background scheduler.
    pub sync_interval: Option<Duration>,
}

impl Config {
    pub fn from_env() -> Self {
        let listen_addr = parse_env("FL_LISTEN_ADDR", SocketAddr::from(([0, 0, 0, 0], 8088)));
        let db_path = string_env("FL_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
        let cors_allow_origins = string_env("FL_CORS_ALLOW_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_else(|| vec!["*".to_string()]);
        let provider_client_id = string_env("FL_PROVIDER_CLIENT_ID").unwrap_or_default();
        let provider_secret = string_env("FL_PROVIDER_SECRET").unwrap_or_default();
        if provider_client_id.is_empty() || provider_secret.is_empty() {
            tracing::warn!(
                "FL_PROVIDER_CLIENT_ID / FL_PROVIDER_SECRET are not set; aggregator calls will be rejected"
            );
        }
        let sync_interval_secs = parse_env("FL_SYNC_INTERVAL_SECS", DEFAULT_SYNC_INTERVAL_SECS);

        Self {
            listen_addr,
            db_path,
            cors_allow_origins,
            request_timeout: Duration::from_millis(parse_env(
                "FL_REQUEST_TIMEOUT_MS",
                DEFAULT_REQUEST_TIMEOUT_MS,
            )),
            provider_url: string_env("FL_PROVIDER_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_PROVIDER_URL.to_string()),
            provider_client_id,
            provider_secret,
            provider_timeout: Duration::from_secs(parse_env(
                "FL_PROVIDER_TIMEOUT_SECS",
                DEFAULT_PROVIDER_TIMEOUT_SECS,
            )),
            manual_sync_daily_limit: parse_env(
                "FL_MANUAL_SYNC_DAILY_LIMIT",
                DEFAULT_MANUAL_SYNC_DAILY_LIMIT,
            ),
            sync_concurrency: parse_env("FL_SYNC_CONCURRENCY", DEFAULT_SYNC_CONCURRENCY).max(1),
            sync_interval: (sync_interval_secs > 0).then(|| Duration::from_secs(sync_interval_secs)),
        }
    }
}

fn string_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parses `key`, falling back to `default` when unset or invalid.
fn parse_env<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = string_env(key) else {
        return default;
    };
    match raw.parse::<T>() {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Ignoring invalid {}='{}': {}", key, raw, e);
            default
        }
    }
}
