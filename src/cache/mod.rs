// Cache module for local persistence.
// Keeps the last known file listing and the saved session available offline.

pub mod listing;
pub mod paths;
pub mod store;

pub use listing::{CacheEntry, CachedListing, LAST_FETCHED_KEY, CACHED_FILES_KEY, ListingCache};
pub use store::{FileStore, KeyValueStore, MemoryStore, write_atomic};
