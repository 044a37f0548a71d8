//! Request descriptions and cache fingerprints.
//!
//! Adapters describe the HTTP call they need as a [`FetchRequest`]; the
//! transport executes it and hands back a [`FetchResponse`]. Each request
//! has a [`Fingerprint`] that keys the response cache.

use std::fmt;

use http::Method;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use sha2::{Digest, Sha256};

use crate::error::{ReaderError, Result};

/// An HTTP request built by a source adapter.
#[derive(Clone, Debug)]
pub struct FetchRequest {
    method: Method,
    url: String,
    headers: HeaderMap,
}

impl FetchRequest {
    /// Creates a request with the given method and URL and no headers.
    #[must_use]
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
        }
    }

    /// Creates a GET request.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// Adds a header that takes part in the cache fingerprint.
    ///
    /// # Errors
    /// Returns [`ReaderError::InvalidInput`] if the name or value is not a
    /// valid HTTP header.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self> {
        let (name, value) = parse_header(name, value)?;
        self.headers.append(name, value);
        Ok(self)
    }

    /// Adds a credential header (API key, bearer token).
    ///
    /// The value is marked sensitive: it is redacted from `Debug` output and
    /// left out of the cache fingerprint.
    ///
    /// # Errors
    /// Returns [`ReaderError::InvalidInput`] if the name or value is not a
    /// valid HTTP header.
    pub fn secret_header(mut self, name: &str, value: &str) -> Result<Self> {
        let (name, mut value) = parse_header(name, value)?;
        value.set_sensitive(true);
        self.headers.append(name, value);
        Ok(self)
    }

    /// Returns the HTTP method.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the request headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Computes the cache fingerprint of this request.
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::from_parts(&self.method, &self.url, &self.headers)
    }
}

fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| ReaderError::InvalidInput(format!("header name {name:?}: {e}")))?;
    let value = HeaderValue::from_str(value)
        .map_err(|e| ReaderError::InvalidInput(format!("header value for {name}: {e}")))?;
    Ok((name, value))
}

/// Deterministic, collision-resistant identity of a request.
///
/// SHA-256 over the method, the URL and every non-sensitive header, rendered
/// as lowercase hex so it can be used directly as a file name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Computes the fingerprint of a request from its parts.
    ///
    /// Header order does not affect the result.
    #[must_use]
    pub fn from_parts(method: &Method, url: &str, headers: &HeaderMap) -> Self {
        let mut relevant: Vec<(&str, &[u8])> = headers
            .iter()
            .filter(|(_, value)| !value.is_sensitive())
            .map(|(name, value)| (name.as_str(), value.as_bytes()))
            .collect();
        relevant.sort_unstable();

        let mut hasher = Sha256::new();
        hasher.update(method.as_str().as_bytes());
        hasher.update(b"\n");
        hasher.update(url.as_bytes());
        hasher.update(b"\n");
        for (name, value) in relevant {
            hasher.update(name.as_bytes());
            hasher.update(b":");
            hasher.update(value);
            hasher.update(b"\n");
        }

        Self(hex::encode(hasher.finalize()))
    }

    /// Returns the hex digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A successful response, either fresh from the network or replayed from cache.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchResponse {
    /// HTTP status code. Cached responses report 200.
    pub status: u16,
    /// Raw response body.
    pub body: Vec<u8>,
    /// True if the body was served from the response cache.
    pub from_cache: bool,
}

impl FetchResponse {
    /// Creates a response that came from the network.
    #[must_use]
    pub const fn fresh(status: u16, body: Vec<u8>) -> Self {
        Self {
            status,
            body,
            from_cache: false,
        }
    }

    /// Creates a response replayed from the cache.
    #[must_use]
    pub const fn cached(body: Vec<u8>) -> Self {
        Self {
            status: 200,
            body,
            from_cache: true,
        }
    }
}
