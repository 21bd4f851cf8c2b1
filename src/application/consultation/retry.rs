//! Bounded retry with exponential backoff for language model calls.

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout, timeout_at, Instant};

use crate::config::AiConfig;
use crate::ports::AIError;

/// Retry policy applied to every gateway call.
///
/// Each attempt is bounded by `attempt_timeout`; an attempt that runs out
/// of time counts as `AIError::Timeout`. Only retryable errors are retried.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial one).
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Factor applied to the delay after each retry.
    pub multiplier: u32,
    /// Cap on any single delay.
    pub max_backoff: Duration,
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            multiplier: 2,
            max_backoff: Duration::from_secs(8),
            attempt_timeout: Duration::from_secs(90),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &AiConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: config.initial_backoff(),
            attempt_timeout: config.timeout(),
            ..Self::default()
        }
    }

    /// A policy that makes exactly one attempt.
    pub fn single_attempt(attempt_timeout: Duration) -> Self {
        Self {
            max_attempts: 1,
            attempt_timeout,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    pub fn with_attempt_timeout(mut self, attempt_timeout: Duration) -> Self {
        self.attempt_timeout = attempt_timeout;
        self
    }

    /// Delay before retry number `retry` (0-based), honouring rate-limit hints.
    fn delay_for(&self, retry: u32, err: &AIError) -> Duration {
        let factor = self.multiplier.saturating_pow(retry);
        let backoff = self.initial_backoff.saturating_mul(factor);
        let hinted = match err {
            AIError::RateLimited { retry_after_secs } => {
                backoff.max(Duration::from_secs(u64::from(*retry_after_secs)))
            }
            _ => backoff,
        };
        hinted.min(self.max_backoff)
    }

    /// Like [`run`](Self::run), but gives up with `AIError::Timeout` once
    /// `deadline` passes, however many attempts remain.
    pub async fn run_until<T, F, Fut>(
        &self,
        deadline: Option<Instant>,
        operation: &'static str,
        call: F,
    ) -> Result<T, AIError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AIError>>,
    {
        let Some(deadline) = deadline else {
            return self.run(operation, call).await;
        };
        let budget = deadline.saturating_duration_since(Instant::now());
        match timeout_at(deadline, self.run(operation, call)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    operation,
                    budget_ms = budget.as_millis() as u64,
                    "Language model call ran out of turn budget"
                );
                Err(AIError::timeout(budget.as_secs()))
            }
        }
    }

    /// Runs `call` until it succeeds, fails permanently or attempts run out.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut call: F) -> Result<T, AIError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AIError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let result = match timeout(self.attempt_timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(AIError::timeout(self.attempt_timeout.as_secs())),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let delay = self.delay_for(attempt - 1, &err);
                    tracing::warn!(
                        operation,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Retrying language model call"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
