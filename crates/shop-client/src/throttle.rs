//! Fixed-budget token bucket for the REST API.
//!
//! The REST API advertises a bucket of `capacity` calls that refills by
//! `tokens_per_release` every `release_interval`. The throttler only gates
//! admission; it is never told how a call turned out.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::cancel::CancellationToken;
use crate::error::Result;

/// Configuration for a [`QuotaThrottler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaConfig {
    /// Maximum number of tokens in the bucket.
    pub capacity: u32,
    /// Wall-clock cadence at which tokens are released.
    pub release_interval: Duration,
    /// Tokens released per interval.
    pub tokens_per_release: u32,
}

impl Default for QuotaConfig {
    /// The standard REST bucket: 40 calls, refilled at 2 per second.
    fn default() -> Self {
        Self {
            capacity: 40,
            release_interval: Duration::from_secs(1),
            tokens_per_release: 2,
        }
    }
}

impl QuotaConfig {
    /// The Shopify Plus REST bucket: 400 calls, refilled at 20 per second.
    pub fn plus() -> Self {
        Self {
            capacity: 400,
            release_interval: Duration::from_secs(1),
            tokens_per_release: 20,
        }
    }

    fn normalized(self) -> Self {
        Self {
            capacity: self.capacity.max(1),
            release_interval: self.release_interval.max(Duration::from_millis(1)),
            tokens_per_release: self.tokens_per_release.max(1),
        }
    }
}

/// Snapshot of a bucket's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    pub capacity: u32,
    pub available: u32,
    pub release_interval: Duration,
    pub tokens_per_release: u32,
}

#[derive(Debug)]
struct BucketState {
    available: u32,
    next_release: Instant,
}

/// Token-bucket limiter shared by every REST call made through one client.
///
/// Acquisitions are serialized behind a mutex, so concurrent callers can
/// neither drive `available` below zero nor count a release twice.
#[derive(Debug)]
pub struct QuotaThrottler {
    config: QuotaConfig,
    state: Mutex<BucketState>,
}

impl QuotaThrottler {
    /// Create a throttler with a full bucket.
    pub fn new(config: QuotaConfig) -> Self {
        let config = config.normalized();
        Self {
            state: Mutex::new(BucketState {
                available: config.capacity,
                next_release: Instant::now() + config.release_interval,
            }),
            config,
        }
    }

    /// The configuration in effect.
    pub fn config(&self) -> QuotaConfig {
        self.config
    }

    /// Take one token, suspending until the next release if the bucket is empty.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<()> {
        cancel.check()?;
        let mut state = self.state.lock().await;

        loop {
            self.release_due(&mut state, Instant::now());

            if state.available > 0 {
                state.available -= 1;
                return Ok(());
            }

            let wait = state
                .next_release
                .saturating_duration_since(Instant::now());
            debug!(wait_ms = wait.as_millis() as u64, "REST bucket empty, waiting for release");
            cancel.sleep(wait).await?;
        }
    }

    /// Current bucket state, with any due releases applied.
    pub async fn budget(&self) -> Budget {
        let mut state = self.state.lock().await;
        self.release_due(&mut state, Instant::now());
        Budget {
            capacity: self.config.capacity,
            available: state.available,
            release_interval: self.config.release_interval,
            tokens_per_release: self.config.tokens_per_release,
        }
    }

    /// Credit every release whose scheduled time has passed.
    fn release_due(&self, state: &mut BucketState, now: Instant) {
        if now < state.next_release {
            return;
        }

        let interval = self.config.release_interval.as_nanos();
        let overdue = (now - state.next_release).as_nanos();
        let releases = 1 + overdue / interval;
        let released = releases.saturating_mul(u128::from(self.config.tokens_per_release));

        let refilled = u128::from(state.available).saturating_add(released);
        state.available = refilled.min(u128::from(self.config.capacity)) as u32;

        // Keep the cadence anchored to the original schedule.
        let into_interval = Duration::from_nanos((overdue % interval) as u64);
        state.next_release = now + (self.config.release_interval - into_interval);
    }
}

impl Default for QuotaThrottler {
    fn default() -> Self {
        Self::new(QuotaConfig::default())
    }
}
