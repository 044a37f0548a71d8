//! Error types for reader operations.
//!
//! This module defines [`ReaderError`] which covers every failure a fetch can
//! end in: rejected input, transport and remote failures, decode failures,
//! cancellation, and the wrappers added by the retry loop and the fan-out.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while fetching and decoding provider data.
#[derive(Error, Debug)]
pub enum ReaderError {
    /// Bad identifier, date range, or option value, rejected before any request.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Transient transport failure (connection refused, DNS, timeout, truncated body).
    #[error("Network error: {0}")]
    Network(String),

    /// The provider answered with a 5xx status.
    #[error("Server error {status} from {url}: {body}")]
    RemoteServer {
        /// HTTP status code.
        status: u16,
        /// Requested URL.
        url: String,
        /// Response body, possibly truncated.
        body: String,
    },

    /// The provider answered with a 4xx status other than 429.
    #[error("Client error {status} from {url}: {body}")]
    RemoteClient {
        /// HTTP status code.
        status: u16,
        /// Requested URL.
        url: String,
        /// Response body, possibly truncated.
        body: String,
    },

    /// The provider answered 429 Too Many Requests.
    #[error("Rate limited by {url}: retry after {retry_after:?}")]
    RateLimited {
        /// Requested URL.
        url: String,
        /// Value of the `Retry-After` header, when the provider sent one.
        retry_after: Option<Duration>,
    },

    /// The adapter could not decode a response payload.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The operation was cancelled before it completed.
    #[error("Operation canceled")]
    Canceled,

    /// Every attempt allowed by the retry budget failed.
    #[error("Request failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// Number of attempts made, including the first.
        attempts: u32,
        /// Error of the final attempt.
        #[source]
        source: Box<ReaderError>,
    },

    /// Fetching a single identifier failed.
    #[error("Fetch failed for {id}: {source}")]
    Fetch {
        /// Identifier whose fetch failed.
        id: String,
        /// Underlying failure.
        #[source]
        source: Box<ReaderError>,
    },

    /// Error reading or writing the response cache.
    #[error("Cache error: {0}")]
    Cache(String),

    /// A fetch task panicked or was torn down before reporting.
    #[error("Fetch task failed: {0}")]
    TaskFailed(String),
}

impl ReaderError {
    /// Wraps an error with the identifier whose fetch produced it.
    #[must_use]
    pub fn for_id(id: impl Into<String>, source: Self) -> Self {
        Self::Fetch {
            id: id.into(),
            source: Box::new(source),
        }
    }

    /// Returns the innermost error, looking through retry and fetch wrappers.
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::RetriesExhausted { source, .. } | Self::Fetch { source, .. } => {
                source.root_cause()
            }
            other => other,
        }
    }

    /// Returns true if a retry of the same request may succeed.
    ///
    /// Only transport failures and 5xx responses qualify.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::RemoteServer { .. })
    }

    /// Returns true if this error, or the error it wraps, is a cancellation.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        matches!(self.root_cause(), Self::Canceled)
    }

    /// Returns true if the root cause is a 4xx response, including 429.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.root_cause(),
            Self::RemoteClient { .. } | Self::RateLimited { .. }
        )
    }
}

/// Result type alias using [`ReaderError`].
pub type Result<T> = std::result::Result<T, ReaderError>;
