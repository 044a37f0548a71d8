//! Per-reader configuration.
//!
//! [`Options`] is built once when a reader is constructed and never changes
//! afterwards. Durations serialize as integer milliseconds so the struct can
//! be loaded from plain config files.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ReaderError, Result};

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay for retry backoff.
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Default cap on a single backoff sleep.
pub const DEFAULT_MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default cap on concurrently running fetches within one read.
pub const DEFAULT_MAX_CONCURRENCY: usize = 10;

/// Default user agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("reader/", env!("CARGO_PKG_VERSION"));

/// Immutable configuration shared by every component of a reader.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Per-request timeout. Zero disables the timeout.
    #[serde(with = "duration_ms")]
    pub timeout: Duration,
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; later retries double it.
    #[serde(with = "duration_ms")]
    pub retry_base_delay: Duration,
    /// Upper bound for a single backoff sleep.
    #[serde(with = "duration_ms")]
    pub max_retry_delay: Duration,
    /// Outbound request rate. Zero or negative disables rate limiting.
    pub requests_per_second: f64,
    /// Token bucket capacity.
    pub rate_burst: u32,
    /// Directory for cached responses. Empty disables caching.
    pub cache_dir: PathBuf,
    /// Maximum age of a cached response. Zero means entries never expire.
    #[serde(with = "duration_ms")]
    pub cache_ttl: Duration,
    /// User agent header value.
    pub user_agent: String,
    /// Maximum number of identifiers fetched at the same time.
    pub max_concurrency: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
            max_retry_delay: DEFAULT_MAX_RETRY_DELAY,
            requests_per_second: 0.0,
            rate_burst: 1,
            cache_dir: PathBuf::new(),
            cache_ttl: Duration::ZERO,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

impl Options {
    /// Creates options with default settings: no caching, no rate limiting.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the retry budget and the base backoff delay.
    #[must_use]
    pub const fn with_retries(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_base_delay = base_delay;
        self
    }

    /// Sets the cap on a single backoff sleep.
    #[must_use]
    pub const fn with_max_retry_delay(mut self, max_delay: Duration) -> Self {
        self.max_retry_delay = max_delay;
        self
    }

    /// Sets the outbound request rate and burst size.
    #[must_use]
    pub const fn with_rate_limit(mut self, requests_per_second: f64, burst: u32) -> Self {
        self.requests_per_second = requests_per_second;
        self.rate_burst = burst;
        self
    }

    /// Enables on-disk caching in `dir` with the given TTL.
    #[must_use]
    pub fn with_cache(mut self, dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        self.cache_dir = dir.into();
        self.cache_ttl = ttl;
        self
    }

    /// Sets the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the concurrency cap for one read.
    #[must_use]
    pub const fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    /// Returns true if responses should be cached on disk.
    #[must_use]
    pub fn caching_enabled(&self) -> bool {
        !self.cache_dir.as_os_str().is_empty()
    }

    /// Returns true if outbound requests are throttled.
    #[must_use]
    pub fn rate_limit_enabled(&self) -> bool {
        self.requests_per_second > 0.0
    }

    /// Checks that the options describe a usable reader.
    ///
    /// # Errors
    /// Returns [`ReaderError::InvalidInput`] for a zero concurrency cap, a zero
    /// burst, or a non-finite request rate.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(ReaderError::InvalidInput(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.rate_burst == 0 {
            return Err(ReaderError::InvalidInput(
                "rate_burst must be at least 1".to_string(),
            ));
        }
        if !self.requests_per_second.is_finite() {
            return Err(ReaderError::InvalidInput(format!(
                "requests_per_second must be finite, got {}",
                self.requests_per_second
            )));
        }
        Ok(())
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(
        value: &Duration,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
