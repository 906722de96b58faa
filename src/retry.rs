//! Bounded retry with exponential backoff for external calls.
//!
//! One [`RetryPolicy`] is shared by every call site; [`RetryingProvider`]
//! applies it to a [`CompletionProvider`] so agents never carry their own
//! retry configuration.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::warn;

use crate::provider::{CompletionProvider, CompletionRequest, ProviderError};

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, the first one included. Values below 1 act as 1.
    pub max_attempts: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub base_delay_ms: u64,
    /// Upper bound for a single delay.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2000,
            max_delay_ms: 10_000,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            max_delay_ms,
        }
    }

    /// Delay to wait after the given failed attempt (1-based).
    /// delay = min(max_delay_ms, base_delay_ms * 2^(attempt - 1))
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        let ms = self
            .base_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);
        Duration::from_millis(ms)
    }

    /// Runs `op` until it succeeds or the attempt budget is spent.
    /// The last error is returned unchanged.
    pub async fn run<T, E, F, Fut>(&self, op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.run_if(op, |_| true).await
    }

    /// Like [`run`](Self::run), but gives up immediately on errors for which
    /// `should_retry` returns false.
    pub async fn run_if<T, E, F, Fut, P>(&self, mut op: F, should_retry: P) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        P: Fn(&E) -> bool,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < max_attempts && should_retry(&err) => {
                    let delay = self.delay_for_attempt(attempt);
                    warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "external call failed, retrying"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Decorates a provider so every completion goes through a [`RetryPolicy`].
/// Only transient provider errors are retried.
pub struct RetryingProvider<P> {
    inner: P,
    policy: RetryPolicy,
}

impl<P: CompletionProvider> RetryingProvider<P> {
    pub fn new(inner: P, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl<P: CompletionProvider> CompletionProvider for RetryingProvider<P> {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        self.policy
            .run_if(|| self.inner.complete(request), ProviderError::is_transient)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, 1, 5)
    }

    #[test]
    fn exponential_backoff_is_capped() {
        let policy = RetryPolicy::new(5, 1000, 5000);
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(4000));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(5000));
        assert_eq!(policy.delay_for_attempt(60), Duration::from_millis(5000));
    }

    #[tokio::test]
    async fn success_on_first_attempt_short_circuits() {
        let mut calls = 0u32;
        let result: Result<&str, String> = fast_policy(3)
            .run(|| {
                calls += 1;
                async { Ok("done") }
            })
            .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn succeeds_on_attempt_within_budget() {
        let mut calls = 0u32;
        let result: Result<u32, String> = fast_policy(3)
            .run(|| {
                calls += 1;
                let n = calls;
                async move {
                    if n < 3 {
                        Err(format!("failure {n}"))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn exhausting_budget_returns_last_error_after_delays() {
        let policy = RetryPolicy::new(3, 10, 1000);
        let mut calls = 0u32;
        let start = Instant::now();
        let result: Result<(), String> = policy
            .run(|| {
                calls += 1;
                let n = calls;
                async move { Err(format!("failure {n}")) }
            })
            .await;
        assert_eq!(result.unwrap_err(), "failure 3");
        assert_eq!(calls, 3);
        // Two delays: 10ms + 20ms.
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn zero_attempts_still_calls_once() {
        let mut calls = 0u32;
        let result: Result<(), String> = fast_policy(0)
            .run(|| {
                calls += 1;
                async { Err("nope".to_string()) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn run_if_stops_on_permanent_error() {
        let mut calls = 0u32;
        let result: Result<(), String> = fast_policy(5)
            .run_if(
                || {
                    calls += 1;
                    async { Err("permanent".to_string()) }
                },
                |e| e != "permanent",
            )
            .await;
        assert_eq!(result.unwrap_err(), "permanent");
        assert_eq!(calls, 1);
    }

    struct FlakyProvider {
        calls: AtomicU32,
        fail_times: u32,
        status: u16,
    }

    #[async_trait]
    impl CompletionProvider for FlakyProvider {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String, ProviderError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.fail_times {
                Err(ProviderError::ApiError {
                    status: self.status,
                    message: format!("attempt {n}"),
                })
            } else {
                Ok("text".into())
            }
        }
    }

    fn request() -> CompletionRequest {
        CompletionRequest::new(vec![crate::provider::Message::user("hi")], 0.0, 10)
    }

    #[tokio::test]
    async fn retrying_provider_retries_transient_errors() {
        let provider = RetryingProvider::new(
            FlakyProvider {
                calls: AtomicU32::new(0),
                fail_times: 2,
                status: 503,
            },
            fast_policy(3),
        );
        assert_eq!(provider.complete(&request()).await.unwrap(), "text");
        assert_eq!(provider.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retrying_provider_does_not_retry_permanent_errors() {
        let provider = RetryingProvider::new(
            FlakyProvider {
                calls: AtomicU32::new(0),
                fail_times: 2,
                status: 401,
            },
            fast_policy(3),
        );
        let err = provider.complete(&request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::ApiError { status: 401, .. }));
        assert_eq!(provider.inner.calls.load(Ordering::SeqCst), 1);
    }
}
