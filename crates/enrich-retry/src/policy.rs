//! Retry/backoff policy (C8), mirroring the teacher's
//! `abp_retry::{RetryPolicy, RetryPolicyBuilder, TimeoutConfig}` contract
//! shape referenced from `abp-runtime::retry`.

use std::time::Duration;

use crate::metrics::FailureMetricsSink;
use crate::taxonomy::StageError;

/// The backoff shape between retry attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffKind {
    /// Every retry waits the same `base_delay`.
    Fixed,
    /// Retry `n` waits `base_delay * 2^(n - 1)`.
    Exponential,
}

/// How long a single stage invocation is allowed to run before it is
/// treated as a transient failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutConfig {
    /// The per-attempt timeout.
    pub per_attempt: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            per_attempt: Duration::from_secs(30),
        }
    }
}

/// Max attempts, base delay, and backoff kind for a stage's retry
/// behavior. `spec.md` §4.8's default: max 3 retries (4 attempts total),
/// base delay 10s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    backoff: BackoffKind,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_secs(10),
            backoff: BackoffKind::Exponential,
        }
    }
}

impl RetryPolicy {
    /// Start building a policy from [`RetryPolicy::default`].
    #[must_use]
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::default()
    }

    /// Total attempts allowed, including the first (non-retry) attempt.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// The delay before retry attempt `attempt` (1-indexed: the delay
    /// before the *second* overall attempt is `delay_for(1)`).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            BackoffKind::Fixed => self.base_delay,
            BackoffKind::Exponential => {
                let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
                self.base_delay.saturating_mul(factor)
            }
        }
    }

    /// Run `attempt`, retrying on [`StageError::is_retryable`] errors per
    /// this policy, incrementing `metrics` on every failed attempt
    /// (`spec.md` §4.8: "each retry increments a per-stage failure
    /// counter"). `step` labels the metric.
    pub async fn run<F, Fut, T>(
        &self,
        step: &str,
        metrics: &FailureMetricsSink,
        mut attempt: F,
    ) -> Result<T, StageError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, StageError>>,
    {
        let mut last_err = None;
        for attempt_no in 1..=self.max_attempts {
            match attempt().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() => {
                    metrics.record_failure(step);
                    tracing::warn!(
                        target: "enrich.retry",
                        step,
                        attempt = attempt_no,
                        max_attempts = self.max_attempts,
                        error = %err,
                        "stage attempt failed, retrying"
                    );
                    if attempt_no < self.max_attempts {
                        tokio::time::sleep(self.delay_for(attempt_no)).await;
                    }
                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }
        }
        let err = last_err.expect("loop runs at least once");
        tracing::error!(target: "enrich.retry", step, "retry budget exhausted");
        Err(err)
    }
}

/// Builder for [`RetryPolicy`].
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicyBuilder {
    inner: RetryPolicy,
}

impl Default for RetryPolicyBuilder {
    fn default() -> Self {
        Self {
            inner: RetryPolicy::default(),
        }
    }
}

impl RetryPolicyBuilder {
    /// Set the total number of attempts, including the first.
    #[must_use]
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.inner.max_attempts = max_attempts.max(1);
        self
    }

    /// Set the base delay used by both backoff kinds.
    #[must_use]
    pub fn base_delay(mut self, base_delay: Duration) -> Self {
        self.inner.base_delay = base_delay;
        self
    }

    /// Set the backoff shape.
    #[must_use]
    pub fn backoff(mut self, backoff: BackoffKind) -> Self {
        self.inner.backoff = backoff;
        self
    }

    /// Finish building.
    #[must_use]
    pub fn build(self) -> RetryPolicy {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn exponential_backoff_doubles() {
        let policy = RetryPolicy::builder()
            .backoff(BackoffKind::Exponential)
            .base_delay(Duration::from_secs(1))
            .build();
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
    }

    #[test]
    fn fixed_backoff_is_constant() {
        let policy = RetryPolicy::builder()
            .backoff(BackoffKind::Fixed)
            .base_delay(Duration::from_secs(5))
            .build();
        assert_eq!(policy.delay_for(1), Duration::from_secs(5));
        assert_eq!(policy.delay_for(9), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success_within_budget() {
        let policy = RetryPolicy::builder()
            .max_attempts(3)
            .base_delay(Duration::from_millis(1))
            .build();
        let metrics = FailureMetricsSink::new();
        let calls = AtomicU32::new(0);

        let result = policy
            .run("asr", &metrics, || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(StageError::Transient("model unavailable".into()))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(metrics.failures_for("asr"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_budget_and_returns_last_error() {
        let policy = RetryPolicy::builder()
            .max_attempts(2)
            .base_delay(Duration::from_millis(1))
            .build();
        let metrics = FailureMetricsSink::new();

        let result: Result<(), StageError> = policy
            .run("docqa", &metrics, || async {
                Err(StageError::Permanent("bad bytes".into()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(metrics.failures_for("docqa"), 2);
    }

    #[tokio::test]
    async fn non_retryable_errors_short_circuit() {
        let policy = RetryPolicy::default();
        let metrics = FailureMetricsSink::new();

        let result: Result<(), StageError> = policy
            .run("vqa", &metrics, || async { Err(StageError::NotFound("attachment".into())) })
            .await;

        assert!(result.is_err());
        assert_eq!(metrics.failures_for("vqa"), 0);
    }
}
