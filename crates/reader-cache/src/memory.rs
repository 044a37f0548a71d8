//! In-memory cache implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reader_core::{Fingerprint, ResponseCache, Result};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Cache entry with timestamp for TTL-based invalidation.
#[derive(Debug, Clone)]
struct CacheEntry {
    data: Vec<u8>,
    cached_at: DateTime<Utc>,
    ttl: Duration,
}

impl CacheEntry {
    fn new(data: Vec<u8>, ttl: Duration) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
            ttl,
        }
    }

    fn is_stale(&self) -> bool {
        if self.ttl.is_zero() {
            return false;
        }
        let age = Utc::now().signed_duration_since(self.cached_at);
        age > chrono::TimeDelta::from_std(self.ttl).unwrap_or(chrono::TimeDelta::MAX)
    }
}

/// Simple in-memory cache for testing and short-lived processes.
///
/// Bodies are stored in a `RwLock`-protected `HashMap` and are lost when the
/// cache is dropped.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: RwLock<HashMap<Fingerprint, CacheEntry>>,
}

impl InMemoryCache {
    /// Create a new empty in-memory cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, fresh or not.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns true if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl ResponseCache for InMemoryCache {
    #[instrument(skip(self), fields(fingerprint = %fingerprint))]
    async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<Vec<u8>>> {
        let cache = self.entries.read().await;
        match cache.get(fingerprint) {
            Some(entry) if !entry.is_stale() => {
                debug!("Cache hit");
                Ok(Some(entry.data.clone()))
            }
            Some(_) => {
                debug!("Cache entry expired");
                Ok(None)
            }
            None => {
                debug!("Cache miss");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self, payload), fields(fingerprint = %fingerprint, bytes = payload.len()))]
    async fn set(&self, fingerprint: &Fingerprint, payload: &[u8], ttl: Duration) -> Result<()> {
        let mut cache = self.entries.write().await;
        cache.insert(fingerprint.clone(), CacheEntry::new(payload.to_vec(), ttl));
        debug!("Cached response");
        Ok(())
    }

    async fn delete(&self, fingerprint: &Fingerprint) -> Result<()> {
        self.entries.write().await.remove(fingerprint);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn invalidate_stale(&self) -> Result<usize> {
        let mut cache = self.entries.write().await;
        let before = cache.len();
        cache.retain(|_, entry| !entry.is_stale());
        let removed = before - cache.len();

        if removed > 0 {
            debug!("Invalidated {} stale cache entries", removed);
        }
        Ok(removed)
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<()> {
        self.entries.write().await.clear();
        debug!("Cleared all cache entries");
        Ok(())
    }
}
