//! Bounded exponential-backoff retry driver.
//!
//! A [`RetryPolicy`] runs an async operation up to `max_attempts` times.
//! Attempt indices run `0..max_attempts`; after a retryable failure on
//! attempt `n` (when attempts remain) it waits `base_delay * 2^n`, capped at
//! `max_delay`, and tries again. A retryable failure on the last attempt and
//! any non-retryable failure are returned as-is.
//!
//! Whether an error is retryable is decided by its [`ErrorKind`]
//! (see [`Classify`]), tested against the policy's retryable set.
//!
//! ```rust,ignore
//! let policy = RetryPolicy::new(3, Duration::from_secs(1))?
//!     .retry_on(&[ErrorKind::ProviderCommunication, ErrorKind::Verification]);
//!
//! let bytes = policy
//!     .execute_with(
//!         || provider.download(&candidate, &path, token.as_deref()),
//!         |attempt, delay, err| warn!(attempt, ?delay, error = %err, "download failed"),
//!     )
//!     .await?;
//! ```

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::error::{Classify, ErrorKind};

/// Upper bound on a single backoff delay unless overridden.
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RetryError {
    /// A policy with zero attempts would never run the operation.
    #[error("retry policy needs at least one attempt")]
    ZeroAttempts,
}

/// Bounded exponential-backoff execution wrapper.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    /// `None` retries every kind.
    retryable: Option<Vec<ErrorKind>>,
}

impl RetryPolicy {
    /// Create a policy that retries any error kind.
    ///
    /// Fails with [`RetryError::ZeroAttempts`] when `max_attempts` is 0.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Result<Self, RetryError> {
        if max_attempts == 0 {
            return Err(RetryError::ZeroAttempts);
        }
        Ok(Self {
            max_attempts,
            base_delay,
            max_delay: DEFAULT_MAX_DELAY,
            retryable: None,
        })
    }

    /// Restrict retries to the given error kinds.
    pub fn retry_on(mut self, kinds: &[ErrorKind]) -> Self {
        self.retryable = Some(kinds.to_vec());
        self
    }

    /// Cap every individual delay.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether errors of `kind` are retried by this policy.
    pub fn is_retryable(&self, kind: ErrorKind) -> bool {
        match &self.retryable {
            Some(kinds) => kinds.contains(&kind),
            None => true,
        }
    }

    /// Delay to wait after a failure on attempt index `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Run `operation` under this policy.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + Display,
    {
        self.execute_with(operation, |_, _, _| {}).await
    }

    /// Run `operation` under this policy, calling `on_retry(attempt, delay, error)`
    /// before each backoff sleep.
    pub async fn execute_with<F, Fut, T, E, R>(
        &self,
        mut operation: F,
        mut on_retry: R,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + Display,
        R: FnMut(u32, Duration, &E),
    {
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(attempts = attempt + 1, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) => {
                    let kind = e.kind();
                    if !self.is_retryable(kind) {
                        debug!(error = %e, ?kind, "Operation failed with non-retryable error");
                        return Err(e);
                    }
                    if attempt + 1 >= self.max_attempts {
                        warn!(
                            error = %e,
                            attempts = self.max_attempts,
                            "Operation failed after all retry attempts exhausted"
                        );
                        return Err(e);
                    }

                    let delay = self.delay_for(attempt);
                    on_retry(attempt, delay, &e);
                    debug!(
                        error = %e,
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Operation failed, retrying"
                    );

                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio_test::{assert_err, assert_ok};

    #[derive(Debug)]
    enum TestError {
        Transient,
        Permanent,
    }

    impl Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                TestError::Transient => write!(f, "transient error"),
                TestError::Permanent => write!(f, "permanent error"),
            }
        }
    }

    impl Classify for TestError {
        fn kind(&self) -> ErrorKind {
            match self {
                TestError::Transient => ErrorKind::ProviderCommunication,
                TestError::Permanent => ErrorKind::Configuration,
            }
        }
    }

    fn transient_policy(attempts: u32, base: Duration) -> RetryPolicy {
        RetryPolicy::new(attempts, base)
            .unwrap()
            .retry_on(&[ErrorKind::ProviderCommunication])
    }

    #[test]
    fn test_zero_attempts_rejected() {
        assert_eq!(
            RetryPolicy::new(0, Duration::from_secs(1)).unwrap_err(),
            RetryError::ZeroAttempts
        );
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = RetryPolicy::new(10, Duration::from_secs(1))
            .unwrap()
            .with_max_delay(Duration::from_secs(5));
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(5));
        assert_eq!(policy.delay_for(40), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_success_no_retry() {
        let policy = transient_policy(3, Duration::from_millis(1));
        let counter = AtomicU32::new(0);

        let result = policy
            .execute(|| async {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, TestError>(42)
            })
            .await;

        assert_eq!(assert_ok!(result), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_failures_then_success_reports_delays() {
        let policy = transient_policy(3, Duration::from_secs(1));
        let counter = Arc::new(AtomicU32::new(0));
        let mut retries: Vec<(u32, Duration)> = Vec::new();

        let result = policy
            .execute_with(
                || {
                    let counter = Arc::clone(&counter);
                    async move {
                        if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                            Err(TestError::Transient)
                        } else {
                            Ok("done")
                        }
                    }
                },
                |attempt, delay, _| retries.push((attempt, delay)),
            )
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(
            retries,
            vec![(0, Duration::from_secs(1)), (1, Duration::from_secs(2))]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_attempt_propagates_error() {
        let policy = transient_policy(3, Duration::from_secs(1));
        let counter = AtomicU32::new(0);
        let mut callbacks = 0;

        let result = policy
            .execute_with(
                || async {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(TestError::Transient)
                },
                |_, _, _| callbacks += 1,
            )
            .await;

        assert!(matches!(result, Err(TestError::Transient)));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(callbacks, 2);
    }

    #[tokio::test]
    async fn test_non_retryable_error_propagates_immediately() {
        let policy = transient_policy(5, Duration::from_secs(1));
        let counter = AtomicU32::new(0);

        let result = policy
            .execute(|| async {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(TestError::Permanent)
            })
            .await;

        assert!(matches!(assert_err!(result), TestError::Permanent));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_policy_retries_every_kind() {
        let policy = RetryPolicy::new(2, Duration::from_millis(10)).unwrap();
        let counter = AtomicU32::new(0);

        let _ = policy
            .execute(|| async {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(TestError::Permanent)
            })
            .await;

        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_waits_expected_total() {
        let policy = transient_policy(3, Duration::from_millis(100));
        let start = tokio::time::Instant::now();

        let _ = policy
            .execute(|| async { Err::<(), _>(TestError::Transient) })
            .await;

        // 100ms + 200ms, no sleep after the final attempt
        assert_eq!(start.elapsed(), Duration::from_millis(300));
    }
}
