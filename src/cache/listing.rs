// Local file-list cache.
// Persists the last known listing with a freshness timestamp and serves stale-while-revalidate reads.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::error::Result;
use crate::storage::FileRecord;

use super::store::KeyValueStore;

/// Key holding the serialized file list.
pub const CACHED_FILES_KEY: &str = "cachedFiles";
/// Key holding the last successful write time as decimal epoch millis.
pub const LAST_FETCHED_KEY: &str = "lastFetched";

/// A listing together with the time it was last written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedListing {
    pub files: Vec<FileRecord>,
    pub fetched_at_ms: i64,
}

impl CachedListing {
    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.fetched_at_ms)
    }
}

/// The last known listing, whether or not it is still fresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub files: Vec<FileRecord>,
    /// Missing after `invalidate()`.
    pub fetched_at_ms: Option<i64>,
    pub fresh: bool,
}

/// File-list cache over a key-value store.
///
/// Every read and write goes through one lock so a reader never pairs a file
/// list with a timestamp from a different write.
pub struct ListingCache {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
    lock: Mutex<()>,
}

impl ListingCache {
    pub fn new(store: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            lock: Mutex::new(()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the listing if it was written less than one TTL ago.
    pub fn read(&self) -> Option<CachedListing> {
        self.read_at(Utc::now())
    }

    pub fn read_at(&self, now: DateTime<Utc>) -> Option<CachedListing> {
        let entry = self.load_at(now)?;
        match (entry.fresh, entry.fetched_at_ms) {
            (true, Some(fetched_at_ms)) => Some(CachedListing {
                files: entry.files,
                fetched_at_ms,
            }),
            _ => None,
        }
    }

    /// Return the last known listing regardless of freshness.
    pub fn load(&self) -> Option<CacheEntry> {
        self.load_at(Utc::now())
    }

    pub fn load_at(&self, now: DateTime<Utc>) -> Option<CacheEntry> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        let files = self.read_files()?;
        let fetched_at_ms = self.read_timestamp();
        let fresh = fetched_at_ms.is_some_and(|at| self.is_fresh(at, now.timestamp_millis()));

        Some(CacheEntry {
            files,
            fetched_at_ms,
            fresh,
        })
    }

    /// Replace the cached listing and mark it fresh as of now.
    pub fn write(&self, files: &[FileRecord]) -> Result<CachedListing> {
        self.write_at(files, Utc::now())
    }

    pub fn write_at(&self, files: &[FileRecord], at: DateTime<Utc>) -> Result<CachedListing> {
        let bytes = serde_json::to_vec(files)?;
        let fetched_at_ms = at.timestamp_millis();

        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        // Clear freshness first so an interrupted write reads back as stale
        self.store.delete(LAST_FETCHED_KEY)?;
        self.store.set(CACHED_FILES_KEY, &bytes)?;
        self.store
            .set(LAST_FETCHED_KEY, fetched_at_ms.to_string().as_bytes())?;

        debug!(count = files.len(), "Cached file listing");
        Ok(CachedListing {
            files: files.to_vec(),
            fetched_at_ms,
        })
    }

    /// Mark the listing stale without discarding it.
    pub fn invalidate(&self) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.store.delete(LAST_FETCHED_KEY)
    }

    fn is_fresh(&self, fetched_at_ms: i64, now_ms: i64) -> bool {
        let age_ms = now_ms.saturating_sub(fetched_at_ms);
        i128::from(age_ms) < self.ttl.as_millis() as i128
    }

    fn read_files(&self) -> Option<Vec<FileRecord>> {
        let bytes = match self.store.get(CACHED_FILES_KEY) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Failed to read cached listing");
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(files) => Some(files),
            Err(e) => {
                debug!(error = %e, "Cached listing unreadable, treating as miss");
                None
            }
        }
    }

    fn read_timestamp(&self) -> Option<i64> {
        let bytes = self.store.get(LAST_FETCHED_KEY).ok().flatten()?;
        std::str::from_utf8(&bytes).ok()?.trim().parse().ok()
    }
}
