//! Cache trait for storing raw provider responses.
//!
//! This module defines the [`ResponseCache`] trait that the transport uses to
//! skip network calls for requests it has already answered.

use async_trait::async_trait;
use std::fmt::Debug;
use std::time::Duration;

use crate::{error::Result, request::Fingerprint};

/// Trait for caching raw response bodies keyed by request fingerprint.
///
/// Implementations are shared by every concurrent fetch of a reader and must
/// synchronize internally.
#[async_trait]
pub trait ResponseCache: Send + Sync + Debug {
    /// Retrieves a cached body.
    ///
    /// Returns `Ok(Some(bytes))` for a fresh entry, `Ok(None)` if the entry is
    /// missing or older than its TTL.
    async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<Vec<u8>>>;

    /// Stores a body. A zero `ttl` means the entry never expires.
    async fn set(&self, fingerprint: &Fingerprint, payload: &[u8], ttl: Duration) -> Result<()>;

    /// Removes an entry if present.
    async fn delete(&self, fingerprint: &Fingerprint) -> Result<()>;

    /// Removes entries whose TTL has elapsed.
    ///
    /// Returns the number of entries removed.
    async fn invalidate_stale(&self) -> Result<usize>;

    /// Clears all cached data.
    async fn clear(&self) -> Result<()>;

    /// Returns false for pass-through caches that never store anything.
    fn is_enabled(&self) -> bool {
        true
    }
}
