//! Cost-reported throttling for the GraphQL API.
//!
//! Each GraphQL response reports the requested cost of the query, the points
//! still available, and the rate at which points are restored. The server is
//! authoritative: the throttler trusts each response's snapshot instead of
//! keeping its own ledger.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tracing::{debug, warn};

use crate::cancel::CancellationToken;
use crate::error::{Error, ErrorKind, Result};
use crate::graphql::GraphQlResponse;

/// Error code the platform uses for throttled GraphQL calls.
pub const THROTTLED_CODE: &str = "THROTTLED";

/// Restore rate substituted when the server reports zero or nothing.
pub const DEFAULT_RESTORE_RATE: f64 = 50.0;

/// Configuration for a [`CostThrottler`].
#[derive(Debug, Clone)]
pub struct CostThrottleConfig {
    /// Maximum number of attempts when the server keeps answering THROTTLED.
    pub max_retry_count: u32,
    /// Restore rate (points per second) used when the server reports none.
    pub default_restore_rate: f64,
    /// Error code that marks a throttled response.
    pub throttled_code: String,
    /// Wait used when a throttled response carries no cost block.
    pub fallback_wait: Duration,
}

impl Default for CostThrottleConfig {
    fn default() -> Self {
        Self {
            max_retry_count: 10,
            default_restore_rate: DEFAULT_RESTORE_RATE,
            throttled_code: THROTTLED_CODE.to_string(),
            fallback_wait: Duration::from_secs(1),
        }
    }
}

impl CostThrottleConfig {
    /// Set the maximum number of attempts.
    pub fn with_max_retry_count(mut self, count: u32) -> Self {
        self.max_retry_count = count;
        self
    }

    /// Set the fallback wait.
    pub fn with_fallback_wait(mut self, wait: Duration) -> Self {
        self.fallback_wait = wait;
        self
    }
}

/// Cost snapshot carried by one response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostState {
    pub requested_cost: f64,
    pub remaining_available: f64,
    /// Always positive.
    pub restore_rate_per_second: f64,
}

impl CostState {
    /// Build a snapshot, substituting `default_restore_rate` for a
    /// non-positive reported rate.
    pub fn new(
        requested_cost: f64,
        remaining_available: f64,
        restore_rate_per_second: f64,
        default_restore_rate: f64,
    ) -> Self {
        let restore_rate_per_second = if restore_rate_per_second > 0.0 {
            restore_rate_per_second
        } else if default_restore_rate > 0.0 {
            default_restore_rate
        } else {
            DEFAULT_RESTORE_RATE
        };

        Self {
            requested_cost,
            remaining_available,
            restore_rate_per_second,
        }
    }

    /// Wait needed before the next call of the same cost.
    pub fn wait(&self) -> Duration {
        compute_wait(
            self.requested_cost,
            self.remaining_available,
            self.restore_rate_per_second,
        )
    }
}

/// Zero when `remaining > requested`, otherwise
/// `ceil((requested - remaining) / restore_rate)` whole seconds.
pub fn compute_wait(requested: f64, remaining: f64, restore_rate: f64) -> Duration {
    if remaining > requested {
        return Duration::ZERO;
    }

    let rate = if restore_rate > 0.0 {
        restore_rate
    } else {
        DEFAULT_RESTORE_RATE
    };
    let seconds = ((requested - remaining) / rate).ceil();

    if seconds.is_finite() && seconds > 0.0 {
        Duration::from_secs_f64(seconds)
    } else {
        Duration::ZERO
    }
}

/// Throttler for cost-reported APIs.
///
/// The only shared state is the most recent snapshot, kept for observability.
#[derive(Debug, Default)]
pub struct CostThrottler {
    config: CostThrottleConfig,
    last: Mutex<Option<CostState>>,
}

impl CostThrottler {
    /// Create a new cost throttler.
    pub fn new(config: CostThrottleConfig) -> Self {
        Self {
            config,
            last: Mutex::new(None),
        }
    }

    /// The configuration in effect.
    pub fn config(&self) -> &CostThrottleConfig {
        &self.config
    }

    /// The cost snapshot from the most recent response, if any.
    pub fn last_cost(&self) -> Option<CostState> {
        self.last.lock().map(|guard| *guard).unwrap_or(None)
    }

    /// Run `request_fn` and return its `data`.
    pub async fn execute<T, F, Fut>(&self, cancel: &CancellationToken, request_fn: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<GraphQlResponse<T>>>,
    {
        let response = self.execute_envelope(cancel, request_fn).await?;
        response.data.ok_or_else(|| {
            Error::new(ErrorKind::GraphQl {
                code: "NO_DATA".to_string(),
                message: "Response contained neither data nor errors".to_string(),
            })
        })
    }

    /// Run `request_fn` and return the whole envelope.
    ///
    /// This is the variant used by pagination, which needs more than `data`.
    pub async fn execute_envelope<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut request_fn: F,
    ) -> Result<GraphQlResponse<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<GraphQlResponse<T>>>,
    {
        let mut attempt = 0u32;

        loop {
            cancel.check()?;
            attempt += 1;

            let response = request_fn().await?;
            let cost = response.cost(self.config.default_restore_rate);
            if let Some(cost) = cost {
                self.record(cost);
            }
            let wait = cost.map(|c| c.wait()).unwrap_or_default();

            let Some(error) = response.first_error() else {
                if !wait.is_zero() {
                    debug!(wait_ms = wait.as_millis() as u64, ?cost, "Cost budget low, pausing");
                }
                cancel.sleep(wait).await?;
                return Ok(response);
            };

            if error.code() != Some(self.config.throttled_code.as_str()) {
                return Err(Error::new(ErrorKind::GraphQl {
                    code: error.code().unwrap_or("UNKNOWN").to_string(),
                    message: error.message.clone(),
                }));
            }

            if attempt >= self.config.max_retry_count {
                return Err(Error::new(ErrorKind::ThrottleExhausted { attempts: attempt }));
            }

            let wait = if cost.is_none() {
                self.config.fallback_wait
            } else {
                wait
            };
            warn!(
                attempt,
                max_attempts = self.config.max_retry_count,
                wait_ms = wait.as_millis() as u64,
                "GraphQL call throttled, retrying"
            );
            cancel.sleep(wait).await?;
        }
    }

    fn record(&self, cost: CostState) {
        if let Ok(mut last) = self.last.lock() {
            *last = Some(cost);
        }
    }
}
