//! Exponential backoff for transient aggregator failures in batch syncs.

use log::{debug, warn};
use std::future::Future;
use std::time::Duration;

use finlink_core::errors::{Error, Result};
use finlink_core::providers::ProviderErrorKind;

/// Retry policy handed to the batch orchestrator.
///
/// Only provider errors whose kind is listed in `retryable` are retried. Timeouts
/// are left out by default so a slow institution fails the account for the round.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (0 = no retries).
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub retryable: Vec<ProviderErrorKind>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            retryable: vec![
                ProviderErrorKind::InstitutionDown,
                ProviderErrorKind::RateLimited,
                ProviderErrorKind::ServerError,
                ProviderErrorKind::Network,
            ],
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn is_retryable(&self, error: &Error) -> bool {
        error
            .as_provider()
            .map(|p| self.retryable.contains(&p.kind))
            .unwrap_or(false)
    }

    /// Whether the error should be retried after `attempt` (0-based) failed.
    pub fn should_retry(&self, attempt: u32, error: &Error) -> bool {
        attempt < self.max_retries && self.is_retryable(error)
    }

    /// `min(base_delay * 2^attempt, max_delay)`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Runs `f` until it succeeds, fails permanently or runs out of retries.
    ///
    /// Returns the result together with the number of attempts made.
    pub async fn execute<F, Fut, T>(&self, operation: &str, mut f: F) -> (Result<T>, u32)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match f().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!("{} succeeded after {} attempts", operation, attempt + 1);
                    }
                    return (Ok(value), attempt + 1);
                }
                Err(err) if self.should_retry(attempt, &err) => {
                    let delay = self.delay_for(attempt);
                    debug!(
                        "{} failed (attempt {}/{}), retrying in {:?}: {}",
                        operation,
                        attempt + 1,
                        self.max_retries + 1,
                        delay,
                        err
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    if attempt > 0 && self.is_retryable(&err) {
                        warn!(
                            "{} still failing after {} attempts: {}",
                            operation,
                            attempt + 1,
                            err
                        );
                    }
                    return (Err(err), attempt + 1);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finlink_core::providers::ProviderError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn provider(kind: ProviderErrorKind) -> Error {
        Error::Provider(ProviderError::new(kind, "boom"))
    }

    fn fast() -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            ..RetryPolicy::default()
        }
    }

    #[test]
    fn delay_grows_exponentially_up_to_the_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
        assert_eq!(policy.delay_for(10), Duration::from_secs(30));
        assert_eq!(policy.delay_for(40), Duration::from_secs(30));
    }

    #[test]
    fn only_listed_provider_kinds_are_retried() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(0, &provider(ProviderErrorKind::InstitutionDown)));
        assert!(!policy.should_retry(2, &provider(ProviderErrorKind::InstitutionDown)));
        assert!(!policy.should_retry(0, &provider(ProviderErrorKind::Timeout)));
        assert!(!policy.should_retry(0, &provider(ProviderErrorKind::LoginRequired)));
        assert!(!policy.should_retry(0, &Error::Unexpected("db".to_string())));
    }

    #[tokio::test]
    async fn transient_failures_are_retried_until_success() {
        let calls = AtomicU32::new(0);
        let (result, attempts) = fast()
            .execute("sync", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(provider(ProviderErrorKind::InstitutionDown))
                } else {
                    Ok(7)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn permanent_failures_return_immediately() {
        let calls = AtomicU32::new(0);
        let (result, attempts): (Result<()>, u32) = fast()
            .execute("sync", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(provider(ProviderErrorKind::InvalidRequest))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
