//! Directory-backed cache implementation.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use reader_core::{Fingerprint, ReaderError, ResponseCache, Result};
use serde::{Deserialize, Serialize};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::Builder;
use tracing::{debug, instrument, warn};

/// File extension of cache entries.
const ENTRY_EXTENSION: &str = "entry";

/// Name prefix of in-progress writes.
const TEMP_PREFIX: &str = ".reader-tmp-";

/// Metadata line written ahead of the payload in every entry file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct EntryHeader {
    stored_at: DateTime<Utc>,
    ttl_ms: u64,
}

impl EntryHeader {
    fn new(stored_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            stored_at,
            ttl_ms: u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX),
        }
    }

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        if self.ttl_ms == 0 {
            return false;
        }
        let ttl = i64::try_from(self.ttl_ms)
            .ok()
            .and_then(TimeDelta::try_milliseconds)
            .unwrap_or(TimeDelta::MAX);
        now.signed_duration_since(self.stored_at) > ttl
    }
}

/// Splits an entry file into its header and payload.
///
/// Returns `None` for files that were not written by [`FileCache`].
fn decode_entry(raw: &[u8]) -> Option<(EntryHeader, &[u8])> {
    let newline = raw.iter().position(|&b| b == b'\n')?;
    let header = serde_json::from_slice(&raw[..newline]).ok()?;
    Some((header, &raw[newline + 1..]))
}

fn encode_header(header: &EntryHeader) -> Result<Vec<u8>> {
    let mut line = serde_json::to_vec(header).map_err(|e| ReaderError::Cache(e.to_string()))?;
    line.push(b'\n');
    Ok(line)
}

fn is_entry(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == ENTRY_EXTENSION)
}

/// Temp files left behind by a write that never reached its rename.
fn is_temp(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(TEMP_PREFIX))
}

fn cache_err(path: &Path, e: impl std::fmt::Display) -> ReaderError {
    ReaderError::Cache(format!("{}: {e}", path.display()))
}

/// On-disk cache storing one file per response.
///
/// Each entry lives at `<dir>/<fingerprint>.entry`: a single JSON line with
/// the storage timestamp and TTL, then the raw response bytes. Expiry is
/// read from that line, never from file metadata. Writes go through a
/// temporary file in the same directory and an atomic rename, so readers
/// see either the old entry or the new one.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    /// Create a cache rooted at `dir`, creating the directory if needed.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| cache_err(&dir, e))?;
        debug!(dir = %dir.display(), "File cache initialized");
        Ok(Self { dir })
    }

    /// Returns the cache directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.dir
            .join(format!("{}.{ENTRY_EXTENSION}", fingerprint.as_str()))
    }

    async fn write_entry(
        &self,
        fingerprint: &Fingerprint,
        payload: &[u8],
        header: EntryHeader,
    ) -> Result<()> {
        let dir = self.dir.clone();
        let path = self.entry_path(fingerprint);
        let mut contents = encode_header(&header)?;
        contents.extend_from_slice(payload);

        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut tmp = Builder::new()
                .prefix(TEMP_PREFIX)
                .tempfile_in(&dir)
                .map_err(|e| cache_err(&dir, e))?;
            tmp.write_all(&contents)
                .map_err(|e| cache_err(tmp.path(), e))?;
            tmp.as_file()
                .sync_all()
                .map_err(|e| cache_err(tmp.path(), e))?;
            tmp.persist(&path).map_err(|e| cache_err(&path, e.error))?;
            Ok(())
        })
        .await
        .map_err(|e| ReaderError::Cache(format!("cache write task failed: {e}")))?
    }

    /// Lists the files in the cache directory accepted by `keep`.
    async fn files_where(&self, keep: fn(&Path) -> bool) -> Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| cache_err(&self.dir, e))?;

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| cache_err(&self.dir, e))?
        {
            let path = entry.path();
            if keep(&path) {
                files.push(path);
            }
        }
        Ok(files)
    }

    async fn remove(path: &Path) -> Result<bool> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(cache_err(path, e)),
        }
    }
}

#[async_trait]
impl ResponseCache for FileCache {
    #[instrument(skip(self), fields(fingerprint = %fingerprint))]
    async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<Vec<u8>>> {
        let path = self.entry_path(fingerprint);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Cache miss");
                return Ok(None);
            }
            Err(e) => return Err(cache_err(&path, e)),
        };

        let Some((header, payload)) = decode_entry(&raw) else {
            warn!(path = %path.display(), "Ignoring unreadable cache entry");
            return Ok(None);
        };

        if header.is_expired(Utc::now()) {
            debug!(stored_at = %header.stored_at, "Cache entry expired");
            return Ok(None);
        }

        debug!(bytes = payload.len(), "Cache hit");
        Ok(Some(payload.to_vec()))
    }

    #[instrument(skip(self, payload), fields(fingerprint = %fingerprint, bytes = payload.len()))]
    async fn set(&self, fingerprint: &Fingerprint, payload: &[u8], ttl: Duration) -> Result<()> {
        self.write_entry(fingerprint, payload, EntryHeader::new(Utc::now(), ttl))
            .await?;
        debug!("Cached response");
        Ok(())
    }

    #[instrument(skip(self), fields(fingerprint = %fingerprint))]
    async fn delete(&self, fingerprint: &Fingerprint) -> Result<()> {
        if Self::remove(&self.entry_path(fingerprint)).await? {
            debug!("Deleted cache entry");
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn invalidate_stale(&self) -> Result<usize> {
        let now = Utc::now();
        let mut removed = 0usize;

        for path in self.files_where(is_entry).await? {
            let stale = match tokio::fs::read(&path).await {
                Ok(raw) => decode_entry(&raw).is_none_or(|(header, _)| header.is_expired(now)),
                // Removed concurrently.
                Err(e) if e.kind() == ErrorKind::NotFound => false,
                Err(e) => return Err(cache_err(&path, e)),
            };
            if stale && Self::remove(&path).await? {
                removed += 1;
            }
        }

        if removed > 0 {
            debug!("Invalidated {} stale cache entries", removed);
        }
        Ok(removed)
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<()> {
        // Also sweeps temp files orphaned by an interrupted write.
        for path in self.files_where(|p| is_entry(p) || is_temp(p)).await? {
            Self::remove(&path).await?;
        }
        debug!("Cleared all cache entries");
        Ok(())
    }
}
