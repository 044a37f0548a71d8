//! Token bucket rate limiting for outbound requests.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use reader_core::{Options, ReaderError, Result};
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::trace;

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    fn refill(&mut self, now: Instant, rate: f64, burst: f64) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        self.tokens = (self.tokens + elapsed.as_secs_f64() * rate).min(burst);
        self.last_refill = now;
    }
}

/// Token bucket shared by every request of a reader.
///
/// Tokens accumulate continuously at `requests_per_second` up to `burst`; each
/// request consumes one. The bucket starts full. A non-positive rate turns
/// the limiter off.
#[derive(Debug)]
pub struct RateLimiter {
    rate: f64,
    burst: f64,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// Create a limiter allowing `requests_per_second` with the given burst.
    ///
    /// A burst of zero is treated as one.
    #[must_use]
    pub fn new(requests_per_second: f64, burst: u32) -> Self {
        let burst = f64::from(burst.max(1));
        Self {
            rate: requests_per_second,
            burst,
            bucket: Mutex::new(Bucket {
                tokens: burst,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Create a limiter that never waits.
    #[must_use]
    pub fn unlimited() -> Self {
        Self::new(0.0, 1)
    }

    /// Create the limiter described by reader options.
    #[must_use]
    pub fn from_options(options: &Options) -> Self {
        Self::new(options.requests_per_second, options.rate_burst)
    }

    /// Returns true if requests are throttled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.rate > 0.0 && self.rate.is_finite()
    }

    /// Takes a token if one is available right now.
    ///
    /// On success returns `None`; otherwise returns how long until the next
    /// token accrues.
    fn take(&self) -> Option<Duration> {
        let mut bucket = self.bucket.lock().unwrap_or_else(PoisonError::into_inner);
        bucket.refill(Instant::now(), self.rate, self.burst);
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            return None;
        }
        let wait = (1.0 - bucket.tokens) / self.rate;
        Some(Duration::try_from_secs_f64(wait).unwrap_or(Duration::MAX))
    }

    /// Takes a token without waiting.
    ///
    /// Returns false if the bucket is empty.
    pub fn try_acquire(&self) -> bool {
        !self.is_enabled() || self.take().is_none()
    }

    /// Waits until a token is available.
    ///
    /// # Errors
    /// Returns [`ReaderError::Canceled`] as soon as `ctx` is cancelled.
    pub async fn wait(&self, ctx: &CancellationToken) -> Result<()> {
        if ctx.is_cancelled() {
            return Err(ReaderError::Canceled);
        }
        if !self.is_enabled() {
            return Ok(());
        }

        while let Some(delay) = self.take() {
            trace!("Rate limiting: waiting {}ms", delay.as_millis());
            tokio::select! {
                biased;
                () = ctx.cancelled() => return Err(ReaderError::Canceled),
                () = sleep(delay) => {}
            }
        }
        Ok(())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::unlimited()
    }
}
