#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/reader/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Response cache implementations for the reader fetch pipeline.
//!
//! This crate provides implementations of the [`ResponseCache`] trait from `reader-core`:
//!
//! - [`FileCache`] - One file per response in a cache directory
//! - [`InMemoryCache`] - Simple in-memory cache for testing
//! - [`NoopCache`] - No-op cache that doesn't store anything
//!
//! [`cache_for_dir`] picks between the file cache and the no-op cache the way
//! [`Options::cache_dir`](reader_core::Options::cache_dir) prescribes.

use std::path::Path;
use std::sync::Arc;

/// Directory-backed cache implementation.
pub mod file;
/// In-memory cache implementation.
pub mod memory;
/// No-op cache implementation.
pub mod noop;

// Re-export the trait for convenience
pub use reader_core::ResponseCache;

// Re-export implementations
pub use file::FileCache;
pub use memory::InMemoryCache;
pub use noop::NoopCache;

/// Builds the cache for a configured directory.
///
/// An empty path disables caching and yields a [`NoopCache`].
///
/// # Errors
/// Returns an error if the directory cannot be created.
pub fn cache_for_dir(dir: &Path) -> reader_core::Result<Arc<dyn ResponseCache>> {
    if dir.as_os_str().is_empty() {
        return Ok(Arc::new(NoopCache::new()));
    }
    Ok(Arc::new(FileCache::new(dir)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_dir_disables_caching() {
        let cache = cache_for_dir(Path::new("")).unwrap();
        assert!(!cache.is_enabled());
    }

    #[test]
    fn test_dir_enables_file_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_for_dir(dir.path()).unwrap();
        assert!(cache.is_enabled());
    }
}
