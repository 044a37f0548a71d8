//! Retrying, rate-limited, caching HTTP execution.
//!
//! [`RetryingTransport::execute`] is the single path every adapter request
//! takes to the network:
//!
//! 1. A fresh cache entry short-circuits the call.
//! 2. Otherwise up to `max_retries + 1` attempts are made, each preceded by a
//!    wait on the shared [`RateLimiter`].
//! 3. Transport failures and 5xx responses are retried after an exponential
//!    backoff; 4xx responses end the call immediately.
//! 4. Successful bodies are written back to the cache.
//!
//! Cancellation interrupts limiter waits, backoff sleeps and in-flight
//! requests alike.

use std::sync::Arc;
use std::time::Duration;

use reader_cache::{NoopCache, ResponseCache, cache_for_dir};
use reader_core::{FetchRequest, FetchResponse, Fingerprint, Options, ReaderError, Result};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::rate_limit::RateLimiter;

/// Longest error body kept in an error message.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// How many times to try a request and how long to wait in between.
///
/// The delay before retry `k` (1-based) is `base_delay * 2^(k-1)`, capped at
/// `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Policy described by reader options.
    #[must_use]
    pub const fn from_options(options: &Options) -> Self {
        Self {
            max_retries: options.max_retries,
            base_delay: options.retry_base_delay,
            max_delay: options.max_retry_delay,
        }
    }

    /// A policy that makes exactly one attempt.
    #[must_use]
    pub const fn no_retries() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Total number of attempts, including the first.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Backoff before retry number `retry` (1-based).
    #[must_use]
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_options(&Options::default())
    }
}

/// Executes adapter requests with caching, rate limiting and retries.
///
/// Cloning is cheap; clones share the HTTP connection pool, the limiter and
/// the cache.
#[derive(Debug, Clone)]
pub struct RetryingTransport {
    client: Client,
    limiter: Arc<RateLimiter>,
    cache: Arc<dyn ResponseCache>,
    policy: RetryPolicy,
    cache_ttl: Duration,
}

impl RetryingTransport {
    /// Create a transport from its parts.
    #[must_use]
    pub fn new(
        client: Client,
        limiter: Arc<RateLimiter>,
        cache: Arc<dyn ResponseCache>,
        policy: RetryPolicy,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            client,
            limiter,
            cache,
            policy,
            cache_ttl,
        }
    }

    /// Create a transport with no cache and no rate limiting.
    #[must_use]
    pub fn with_client(client: Client, policy: RetryPolicy) -> Self {
        Self::new(
            client,
            Arc::new(RateLimiter::unlimited()),
            Arc::new(NoopCache::new()),
            policy,
            Duration::ZERO,
        )
    }

    /// Create the transport described by reader options.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built or the cache
    /// directory cannot be created.
    pub fn from_options(options: &Options) -> Result<Self> {
        Ok(Self::new(
            build_client(options)?,
            Arc::new(RateLimiter::from_options(options)),
            cache_for_dir(&options.cache_dir)?,
            RetryPolicy::from_options(options),
            options.cache_ttl,
        ))
    }

    /// Returns the retry policy.
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Returns the shared rate limiter.
    #[must_use]
    pub const fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Returns the response cache.
    #[must_use]
    pub const fn cache(&self) -> &Arc<dyn ResponseCache> {
        &self.cache
    }

    /// Executes a request.
    ///
    /// # Errors
    /// - [`ReaderError::Canceled`] if `ctx` is cancelled at any point.
    /// - [`ReaderError::RemoteClient`] or [`ReaderError::RateLimited`] on a
    ///   4xx response, without retrying.
    /// - [`ReaderError::RetriesExhausted`] wrapping the last failure when every
    ///   attempt hit a transport error or a 5xx response.
    #[instrument(
        skip(self, ctx, request),
        fields(method = %request.method(), url = %request.url())
    )]
    pub async fn execute(
        &self,
        ctx: &CancellationToken,
        request: &FetchRequest,
    ) -> Result<FetchResponse> {
        if ctx.is_cancelled() {
            return Err(ReaderError::Canceled);
        }

        let fingerprint = self.cache.is_enabled().then(|| request.fingerprint());
        if let Some(fingerprint) = &fingerprint {
            if let Some(body) = self.cached(fingerprint).await {
                return Ok(FetchResponse::cached(body));
            }
        }

        let max_attempts = self.policy.max_attempts();
        let mut attempt = 1;
        loop {
            self.limiter.wait(ctx).await?;
            debug!(attempt, max_attempts, "Sending request");

            match self.attempt(ctx, request).await {
                Ok(response) => {
                    if let Some(fingerprint) = &fingerprint {
                        self.store(fingerprint, &response).await;
                    }
                    return Ok(response);
                }
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.policy.delay_for_retry(attempt);
                    warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Request failed, retrying"
                    );
                    tokio::select! {
                        biased;
                        () = ctx.cancelled() => return Err(ReaderError::Canceled),
                        () = sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(e) if e.is_retryable() => {
                    warn!(attempts = attempt, error = %e, "Giving up on request");
                    return Err(ReaderError::RetriesExhausted {
                        attempts: attempt,
                        source: Box::new(e),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Looks up a fresh cache entry. Cache read failures count as misses.
    async fn cached(&self, fingerprint: &Fingerprint) -> Option<Vec<u8>> {
        match self.cache.get(fingerprint).await {
            Ok(Some(body)) => {
                debug!(bytes = body.len(), "Serving response from cache");
                Some(body)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Cache read failed, fetching from network");
                None
            }
        }
    }

    async fn store(&self, fingerprint: &Fingerprint, response: &FetchResponse) {
        if !StatusCode::from_u16(response.status).is_ok_and(|s| s.is_success()) {
            return;
        }
        if let Err(e) = self
            .cache
            .set(fingerprint, &response.body, self.cache_ttl)
            .await
        {
            warn!(error = %e, "Failed to cache response");
        }
    }

    /// One network round trip, raced against cancellation.
    async fn attempt(
        &self,
        ctx: &CancellationToken,
        request: &FetchRequest,
    ) -> Result<FetchResponse> {
        let send = async {
            let response = self
                .client
                .request(request.method().clone(), request.url())
                .headers(request.headers().clone())
                .send()
                .await
                .map_err(transport_error)?;

            let status = response.status();
            if status.is_success() || status.is_redirection() {
                let body = response.bytes().await.map_err(transport_error)?;
                return Ok(FetchResponse::fresh(status.as_u16(), body.to_vec()));
            }

            let retry_after = retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            Err(status_error(status, request.url(), body, retry_after))
        };

        tokio::select! {
            biased;
            () = ctx.cancelled() => Err(ReaderError::Canceled),
            result = send => result,
        }
    }
}

/// Builds the HTTP client described by reader options.
///
/// # Errors
/// Returns [`ReaderError::InvalidInput`] if the client cannot be built, for
/// example because the user agent is not a valid header value.
pub fn build_client(options: &Options) -> Result<Client> {
    let mut builder = Client::builder().user_agent(options.user_agent.as_str());
    if !options.timeout.is_zero() {
        builder = builder.timeout(options.timeout);
    }
    builder
        .build()
        .map_err(|e| ReaderError::InvalidInput(format!("HTTP client: {e}")))
}

fn transport_error(e: reqwest::Error) -> ReaderError {
    if e.is_builder() {
        return ReaderError::InvalidInput(e.to_string());
    }
    ReaderError::Network(e.to_string())
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn status_error(
    status: StatusCode,
    url: &str,
    body: String,
    retry_after: Option<Duration>,
) -> ReaderError {
    let body = truncate(body);
    let url = url.to_string();
    match status.as_u16() {
        429 => ReaderError::RateLimited { url, retry_after },
        code @ 400..=499 => ReaderError::RemoteClient {
            status: code,
            url,
            body,
        },
        code => ReaderError::RemoteServer {
            status: code,
            url,
            body,
        },
    }
}

fn truncate(mut body: String) -> String {
    if let Some((idx, _)) = body.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        body.truncate(idx);
        body.push_str("...");
    }
    body
}
