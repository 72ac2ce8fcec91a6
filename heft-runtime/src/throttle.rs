use crate::rate::{Quota, RateError, RateLimiter};
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

/// Serialises calls to one upstream and paces them through a [`RateLimiter`].
///
/// At most one [`ThrottlePermit`] exists at a time, so callers that hold the
/// permit for the duration of their request get "one outstanding request at
/// the configured rate". Construct it once in the composition root and share
/// it behind an `Arc`.
#[derive(Debug)]
pub struct Throttle {
    limiter: RateLimiter,
    serial: Mutex<()>,
}

/// Proof of admission. Dropping it lets the next caller in.
#[derive(Debug)]
pub struct ThrottlePermit<'a> {
    _slot: MutexGuard<'a, ()>,
}

impl Throttle {
    pub fn new(quota: Quota) -> Self {
        Self {
            limiter: RateLimiter::new(quota),
            serial: Mutex::new(()),
        }
    }

    pub fn quota(&self) -> Quota {
        self.limiter.quota()
    }

    /// Wait for the serial slot, then for a rate token. Either wait ends
    /// early with [`RateError::Cancelled`] once `cancel` fires.
    pub async fn admit(&self, cancel: &CancellationToken) -> Result<ThrottlePermit<'_>, RateError> {
        let slot = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RateError::Cancelled),
            slot = self.serial.lock() => slot,
        };
        self.limiter.acquire(cancel).await?;
        Ok(ThrottlePermit { _slot: slot })
    }
}
