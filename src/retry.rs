use std::future::Future;
use std::time::Duration;

use log::debug;

use crate::Result;

/// Upper bound on a single backoff sleep
pub const MAX_DELAY: Duration = Duration::from_secs(8);

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// A policy that never sleeps, for tests and for callers that already throttle.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
        }
    }
}

/// Delay before the attempt after `attempt`: doubling from `base_delay`, capped at `MAX_DELAY`
fn backoff(policy: &RetryPolicy, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    policy.base_delay.saturating_mul(factor).min(MAX_DELAY)
}

/// Retry an async operation with exponential backoff.
///
/// Only retryable transport failures are retried; any other error is returned
/// from the attempt that produced it.
pub async fn retry<F, Fut, T>(policy: &RetryPolicy, what: &str, operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let delay = backoff(policy, attempt);
                debug!("{what}: attempt {attempt} failed: {e}, retrying in {delay:?}");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::Error;

    #[tokio::test]
    async fn test_retries_transport_until_success() {
        let calls = AtomicU32::new(0);
        let result = retry(&RetryPolicy::immediate(3), "flaky", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(Error::transport("test", "connection reset"))
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry(&RetryPolicy::immediate(2), "down", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::transport("test", "timed out"))
        })
        .await;
        assert!(result.unwrap_err().is_transport());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_backoff_doubles_then_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(backoff(&policy, 1), Duration::from_millis(500));
        assert_eq!(backoff(&policy, 2), Duration::from_secs(1));
        assert_eq!(backoff(&policy, 4), Duration::from_secs(4));
        assert_eq!(backoff(&policy, 5), MAX_DELAY);
        assert_eq!(backoff(&policy, 40), MAX_DELAY);
        assert_eq!(backoff(&policy, u32::MAX), MAX_DELAY);
    }

    #[tokio::test]
    async fn test_many_attempts_do_not_overflow() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry(&RetryPolicy::immediate(40), "down", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::transport("test", "timed out"))
        })
        .await;
        assert!(result.unwrap_err().is_transport());
        assert_eq!(calls.load(Ordering::SeqCst), 40);
    }

    #[tokio::test]
    async fn test_does_not_retry_non_transport() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry(&RetryPolicy::immediate(5), "parse", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::CaptionsUnavailable("dQw4w9WgXcQ".into()))
        })
        .await;
        assert!(matches!(result, Err(Error::CaptionsUnavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
