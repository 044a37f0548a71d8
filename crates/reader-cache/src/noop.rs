//! No-op cache implementation.

use async_trait::async_trait;
use reader_core::{Fingerprint, ResponseCache, Result};
use std::time::Duration;
use tracing::trace;

/// A no-op cache that doesn't store anything.
///
/// `get` always returns `Ok(None)` and every write succeeds without effect.
/// Used when no cache directory is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

impl NoopCache {
    /// Create a new no-op cache.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ResponseCache for NoopCache {
    async fn get(&self, _fingerprint: &Fingerprint) -> Result<Option<Vec<u8>>> {
        trace!("NoopCache: get called, returning None");
        Ok(None)
    }

    async fn set(&self, _fingerprint: &Fingerprint, _payload: &[u8], _ttl: Duration) -> Result<()> {
        trace!("NoopCache: set called, doing nothing");
        Ok(())
    }

    async fn delete(&self, _fingerprint: &Fingerprint) -> Result<()> {
        trace!("NoopCache: delete called, doing nothing");
        Ok(())
    }

    async fn invalidate_stale(&self) -> Result<usize> {
        trace!("NoopCache: invalidate_stale called, returning 0");
        Ok(0)
    }

    async fn clear(&self) -> Result<()> {
        trace!("NoopCache: clear called, doing nothing");
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        false
    }
}
