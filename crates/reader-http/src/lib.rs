#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/reader/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! HTTP execution for the reader fetch pipeline.
//!
//! - [`RateLimiter`] - Token bucket shared by every request of a reader
//! - [`RetryingTransport`] - Cache lookup, throttling, retries and cancellation
//! - [`fetch_all`] - Bounded-concurrency fan-out over identifiers

/// Parallel fetch orchestration.
pub mod orchestrator;
/// Token bucket rate limiting.
pub mod rate_limit;
/// Retrying HTTP transport.
pub mod transport;

#[cfg(test)]
mod test_server;

pub use orchestrator::fetch_all;
pub use rate_limit::RateLimiter;
pub use transport::{RetryPolicy, RetryingTransport, build_client};

// Re-export the cancellation token so callers need not depend on tokio-util
pub use tokio_util::sync::CancellationToken;
