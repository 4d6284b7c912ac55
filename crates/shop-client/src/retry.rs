//! Retry policy: classify a failure, then retry or fail fast.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::cancel::CancellationToken;
use crate::error::{Error, ErrorClass, Result};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Backoff strategy to use.
    pub backoff: BackoffStrategy,
    /// Whether to respect Retry-After headers.
    pub respect_retry_after: bool,
    /// Maximum time to wait from Retry-After header.
    pub max_retry_after: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff: BackoffStrategy::Constant,
            respect_retry_after: true,
            max_retry_after: Duration::from_secs(60),
        }
    }
}

impl RetryConfig {
    /// Fixed delay between a bounded number of attempts.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay: delay,
            backoff: BackoffStrategy::Constant,
            ..Default::default()
        }
    }

    /// Set the maximum number of attempts.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set the delay before the first retry.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the backoff strategy.
    pub fn with_backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.backoff = backoff;
        self
    }

    /// A single attempt, never retried.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }
}

/// Backoff strategy for determining retry delays.
#[derive(Debug, Clone, Copy)]
pub enum BackoffStrategy {
    /// Constant delay between retries.
    Constant,
    /// Linear increase in delay (delay * attempt).
    Linear,
    /// Exponential increase in delay (delay * factor^attempt).
    Exponential { factor: f64 },
    /// Exponential with random jitter to avoid thundering herd.
    ExponentialWithJitter { factor: f64 },
}

impl BackoffStrategy {
    /// Calculate the delay for a given retry number (0-indexed).
    pub fn delay(&self, retry: u32, initial_delay: Duration, max_delay: Duration) -> Duration {
        let delay = match self {
            BackoffStrategy::Constant => initial_delay,
            BackoffStrategy::Linear => initial_delay.saturating_mul(retry + 1),
            BackoffStrategy::Exponential { factor } => {
                let multiplier = factor.powi(retry as i32);
                Duration::from_secs_f64(initial_delay.as_secs_f64() * multiplier)
            }
            BackoffStrategy::ExponentialWithJitter { factor } => {
                let base_delay = initial_delay.as_secs_f64() * factor.powi(retry as i32);
                let jitter = rand::rng().random::<f64>() * base_delay;
                Duration::from_secs_f64(base_delay + jitter)
            }
        };

        std::cmp::min(delay, max_delay)
    }
}

/// Decision produced once per attempt.
#[derive(Debug)]
pub enum RetryOutcome<T> {
    /// The attempt produced a value.
    Succeed(T),
    /// Sleep for the given delay, then try again.
    RetryAfter(Duration),
    /// Stop and propagate the error unchanged.
    FailFast(Error),
}

/// Per-call retry state. Create a fresh policy for each logical call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
    attempt: u32,
}

impl RetryPolicy {
    /// Create a new retry policy from config.
    pub fn new(config: RetryConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Number of attempts evaluated so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Evaluate the result of one attempt.
    ///
    /// `Unauthorized` and `Fatal` failures fail fast. `Transient` and
    /// `RateLimited` failures are retried while fewer than `max_attempts`
    /// attempts have been made; after that the last error is returned.
    pub fn evaluate<T, C>(&mut self, result: Result<T>, classify: C) -> RetryOutcome<T>
    where
        C: Fn(&Error) -> ErrorClass,
    {
        self.attempt += 1;

        let err = match result {
            Ok(value) => return RetryOutcome::Succeed(value),
            Err(err) => err,
        };

        let class = classify(&err);
        match class {
            ErrorClass::Unauthorized | ErrorClass::Fatal => RetryOutcome::FailFast(err),
            ErrorClass::Transient | ErrorClass::RateLimited => {
                if self.attempt >= self.config.max_attempts {
                    return RetryOutcome::FailFast(err);
                }

                let delay = self.delay_for(&err);
                warn!(
                    attempt = self.attempt,
                    max_attempts = self.config.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    %class,
                    error = %err,
                    "Request failed, retrying"
                );
                RetryOutcome::RetryAfter(delay)
            }
        }
    }

    fn delay_for(&self, err: &Error) -> Duration {
        match err.retry_after() {
            Some(retry_after) if self.config.respect_retry_after => {
                std::cmp::min(retry_after, self.config.max_retry_after)
            }
            _ => self.config.backoff.delay(
                self.attempt - 1,
                self.config.initial_delay,
                self.config.max_delay,
            ),
        }
    }
}

/// Run `attempt_fn` under a fresh [`RetryPolicy`].
///
/// Cancellation is checked before every attempt and during every delay.
pub async fn execute<T, F, Fut, C>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    classify: C,
    mut attempt_fn: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    C: Fn(&Error) -> ErrorClass,
{
    let mut policy = RetryPolicy::new(config.clone());

    loop {
        cancel.check()?;
        let result = attempt_fn().await;

        match policy.evaluate(result, &classify) {
            RetryOutcome::Succeed(value) => return Ok(value),
            RetryOutcome::FailFast(err) => return Err(err),
            RetryOutcome::RetryAfter(delay) => cancel.sleep(delay).await?,
        }
    }
}
