// Refresh results and the events the coordinator publishes.

use crate::cache::CacheEntry;
use crate::storage::FileRecord;

use super::retry::ScheduledRetry;

/// Where a listing came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingSource {
    /// Fetched from the remote store just now.
    Network,
    /// Served from the local cache; `fresh` is false once the TTL has passed.
    Cache { fresh: bool },
    /// In-memory state after a local upload or removal.
    Local,
    /// Nothing to show yet; a retry is on its way.
    Pending,
}

impl ListingSource {
    pub fn label(&self) -> &'static str {
        match self {
            ListingSource::Network => "live",
            ListingSource::Cache { fresh: true } => "cached",
            ListingSource::Cache { fresh: false } => "stale",
            ListingSource::Local => "local",
            ListingSource::Pending => "loading",
        }
    }
}

/// A file listing and how it was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub files: Vec<FileRecord>,
    pub source: ListingSource,
    /// Set when a background retry has been scheduled.
    pub retry: Option<ScheduledRetry>,
}

impl Listing {
    pub fn network(files: Vec<FileRecord>) -> Self {
        Self {
            files,
            source: ListingSource::Network,
            retry: None,
        }
    }

    pub fn local(files: Vec<FileRecord>) -> Self {
        Self {
            files,
            source: ListingSource::Local,
            retry: None,
        }
    }

    pub fn cached(entry: CacheEntry) -> Self {
        Self {
            files: entry.files,
            source: ListingSource::Cache { fresh: entry.fresh },
            retry: None,
        }
    }

    /// Best interim result while a retry is outstanding.
    pub fn interim(cached: Option<CacheEntry>, retry: ScheduledRetry) -> Self {
        let mut listing = match cached {
            Some(entry) => Self::cached(entry),
            None => Self {
                files: Vec::new(),
                source: ListingSource::Pending,
                retry: None,
            },
        };
        listing.retry = Some(retry);
        listing
    }
}

/// A user-visible notification. Each occurrence is published once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Offline,
    RetriesExhausted { attempts: u32 },
    RemoteRejected(String),
}

impl Notice {
    pub fn title(&self) -> &'static str {
        match self {
            Notice::Offline => "No Internet Connection",
            Notice::RetriesExhausted { .. } => "Error",
            Notice::RemoteRejected(_) => "Request Rejected",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Notice::Offline => "Showing saved files until the connection returns.".to_string(),
            Notice::RetriesExhausted { .. } => "Failed to load files after multiple attempts. \
                 Please check your connection and try again."
                .to_string(),
            Notice::RemoteRejected(message) => message.clone(),
        }
    }
}

/// Something the coordinator wants the view to know about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// The listing changed outside a direct `refresh` call.
    Updated(Listing),
    RetryScheduled(ScheduledRetry),
    Connectivity(Option<bool>),
    Notice(Notice),
}
