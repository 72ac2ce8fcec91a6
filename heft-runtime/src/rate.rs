use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RateError {
    #[error("rate limit wait cancelled")]
    Cancelled,
    #[error("invalid quota: {0}")]
    InvalidQuota(String),
}

/// Steady rate (`qps`) plus bucket capacity (`burst`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quota {
    pub qps: f64,
    pub burst: u32,
}

impl Quota {
    pub fn new(qps: f64, burst: u32) -> Result<Self, RateError> {
        if !qps.is_finite() || qps <= 0.0 {
            return Err(RateError::InvalidQuota(format!(
                "qps must be positive, got {qps}"
            )));
        }
        if burst == 0 {
            return Err(RateError::InvalidQuota("burst must be at least 1".into()));
        }
        Ok(Self { qps, burst })
    }
}

impl Default for Quota {
    /// One request per second, no burst.
    fn default() -> Self {
        Self { qps: 1.0, burst: 1 }
    }
}

#[derive(Debug)]
struct BucketState {
    quota: Quota,
    /// May go negative: callers that had to wait hold a reservation.
    tokens: f64,
    last: Instant,
}

impl BucketState {
    fn new(quota: Quota) -> Self {
        Self {
            quota,
            tokens: quota.burst as f64,
            last: Instant::now(),
        }
    }

    fn refill(&mut self, now: Instant) {
        let dt = now.saturating_duration_since(self.last).as_secs_f64();
        self.last = now;
        self.tokens = (self.tokens + dt * self.quota.qps).min(self.quota.burst as f64);
    }

    /// Take `need` tokens and return how long the caller must wait before using them.
    fn reserve(&mut self, need: f64, now: Instant) -> Duration {
        self.refill(now);
        self.tokens -= need;
        if self.tokens >= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(-self.tokens / self.quota.qps)
        }
    }

    fn refund(&mut self, amount: f64) {
        self.tokens = (self.tokens + amount).min(self.quota.burst as f64);
    }
}

/// Token-bucket rate limiter.
///
/// `acquire` reserves one token and sleeps until it is usable. A cancelled
/// wait hands its reservation back so later callers are not penalised.
#[derive(Debug)]
pub struct RateLimiter {
    bucket: Mutex<BucketState>,
}

impl RateLimiter {
    pub fn new(quota: Quota) -> Self {
        Self {
            bucket: Mutex::new(BucketState::new(quota)),
        }
    }

    pub fn quota(&self) -> Quota {
        self.lock().quota
    }

    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), RateError> {
        if cancel.is_cancelled() {
            return Err(RateError::Cancelled);
        }
        let started = Instant::now();
        let wait = self.lock().reserve(1.0, started);
        if wait.is_zero() {
            return Ok(());
        }

        tracing::trace!(target: "rate", wait_ms = wait.as_millis() as u64, "rate.waiting");
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                self.lock().refund(1.0);
                tracing::debug!(target: "rate", "rate.wait_cancelled");
                Err(RateError::Cancelled)
            }
            _ = sleep(wait) => {
                tracing::trace!(
                    target: "rate",
                    waited_ms = started.elapsed().as_millis() as u64,
                    "rate.acquired"
                );
                Ok(())
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BucketState> {
        // The bucket holds plain numbers; a panic mid-update cannot leave it unusable.
        self.bucket.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_rejects_degenerate_values() {
        assert!(Quota::new(0.0, 1).is_err());
        assert!(Quota::new(-2.0, 1).is_err());
        assert!(Quota::new(f64::NAN, 1).is_err());
        assert!(Quota::new(1.0, 0).is_err());
        assert_eq!(Quota::new(1.0, 1).unwrap(), Quota::default());
    }

    #[tokio::test(start_paused = true)]
    async fn burst_is_free_then_steady_rate_applies() {
        let limiter = RateLimiter::new(Quota::new(2.0, 3).unwrap());
        let cancel = CancellationToken::new();
        let t0 = Instant::now();

        for _ in 0..3 {
            limiter.acquire(&cancel).await.unwrap();
        }
        assert_eq!(t0.elapsed(), Duration::ZERO);

        limiter.acquire(&cancel).await.unwrap();
        assert!(t0.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn back_to_back_waits_queue_up() {
        let limiter = RateLimiter::new(Quota::default());
        let cancel = CancellationToken::new();
        let t0 = Instant::now();

        let (a, b, c) = tokio::join!(
            limiter.acquire(&cancel),
            limiter.acquire(&cancel),
            limiter.acquire(&cancel)
        );
        a.unwrap();
        b.unwrap();
        c.unwrap();
        assert!(t0.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn pre_cancelled_token_fails_fast() {
        let limiter = RateLimiter::new(Quota::default());
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert_eq!(limiter.acquire(&cancel).await, Err(RateError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_wait_refunds_its_reservation() {
        let limiter = RateLimiter::new(Quota::default());
        let cancel = CancellationToken::new();
        limiter.acquire(&cancel).await.unwrap();

        let doomed = CancellationToken::new();
        let (res, ()) = tokio::join!(limiter.acquire(&doomed), async {
            sleep(Duration::from_millis(100)).await;
            doomed.cancel();
        });
        assert_eq!(res, Err(RateError::Cancelled));

        let t0 = Instant::now();
        limiter.acquire(&cancel).await.unwrap();
        let waited = t0.elapsed();
        assert!(waited >= Duration::from_millis(850), "waited {waited:?}");
        assert!(waited < Duration::from_secs(1), "waited {waited:?}");
    }
}
