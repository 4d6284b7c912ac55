//! Cooperative cancellation shared between a caller and in-flight operations.
//!
//! Every suspension point in this crate (throttle waits, retry delays, bulk
//! poll sleeps) and every HTTP send goes through a [`CancellationToken`], so
//! cancelling stops further retries and polls immediately.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct Inner {
    canceled: AtomicBool,
    notify: Notify,
}

/// Cloneable cancellation signal. All clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl CancellationToken {
    /// Create a token that is not canceled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Wakes every waiter exactly once.
    pub fn cancel(&self) {
        if !self.inner.canceled.swap(true, Ordering::SeqCst) {
            self.inner.notify.notify_waiters();
        }
    }

    /// Whether cancellation has been requested.
    pub fn is_canceled(&self) -> bool {
        self.inner.canceled.load(Ordering::SeqCst)
    }

    /// Return a `Canceled` error if cancellation has been requested.
    pub fn check(&self) -> Result<()> {
        if self.is_canceled() {
            Err(Error::canceled())
        } else {
            Ok(())
        }
    }

    /// Wait until cancellation is requested. Returns immediately if already set.
    pub async fn canceled(&self) {
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a concurrent cancel() is not missed.
        notified.as_mut().enable();
        if self.is_canceled() {
            return;
        }
        notified.await;
    }

    /// Sleep for `duration`, aborting with `Canceled` if cancellation arrives
    /// before or during the wait.
    pub async fn sleep(&self, duration: Duration) -> Result<()> {
        self.check()?;
        if duration.is_zero() {
            return Ok(());
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(()),
            _ = self.canceled() => Err(Error::canceled()),
        }
    }

    /// Drive `future` to completion unless cancellation arrives first.
    pub async fn run<T, F>(&self, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check()?;
        tokio::select! {
            result = future => result,
            _ = self.canceled() => Err(Error::canceled()),
        }
    }
}
