//! Caller-side retry of transient failures.
//!
//! The coordinator never retries on its own: a lock or pool timeout is
//! surfaced to the caller, who may hand the operation to a [`RetryPolicy`].
//! Business rejections are returned on the first attempt.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use innkeep_common::Result;

use crate::config::RetryConfig;

/// Exponential backoff over retryable errors.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    /// Create a policy from configuration.
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: config.base_delay,
            max_delay: config.max_delay,
        }
    }

    /// A policy that makes exactly one attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Total attempts, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay after the given failed attempt (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Run an operation, retrying while it fails with a retryable error.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        code = e.error_code(),
                        "Retrying after transient failure"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(&RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use innkeep_common::{ReservationError, RoomId};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(&RetryConfig {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        })
    }

    #[test]
    fn test_delay_doubles_up_to_cap() {
        let policy = fast_policy(10);
        assert_eq!(policy.delay_for(1), Duration::from_millis(1));
        assert_eq!(policy.delay_for(2), Duration::from_millis(2));
        assert_eq!(policy.delay_for(3), Duration::from_millis(4));
        assert_eq!(policy.delay_for(4), Duration::from_millis(4));
        assert_eq!(policy.delay_for(64), Duration::from_millis(4));
    }

    #[tokio::test]
    async fn test_retries_lock_timeouts_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = fast_policy(3)
            .run(move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(ReservationError::LockTimeout("room 1".into()))
                } else {
                    Ok(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = fast_policy(2)
            .run(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ReservationError::PoolTimeout("pool".into()))
            })
            .await;

        assert!(matches!(result, Err(ReservationError::PoolTimeout(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_business_rejection_is_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = fast_policy(5)
            .run(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ReservationError::RoomNotFound(RoomId::new(1)))
            })
            .await;

        assert!(matches!(result, Err(ReservationError::RoomNotFound(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
