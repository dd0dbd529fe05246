// Files tab state management.
// Tracks the displayed listing, its source, the selection, and the offline/retry banner.

use ratatui::widgets::ListState;

use filestash::storage::FileRecord;
use filestash::sync::{Listing, ListingSource, ScheduledRetry};

/// Loading state for async data.
#[derive(Debug, Clone, Default)]
pub enum LoadingState<T> {
    #[default]
    Idle,
    Loading,
    Loaded(T),
    Error(String),
}

impl<T> LoadingState<T> {
    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadingState::Loaded(_))
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            LoadingState::Loaded(data) => Some(data),
            _ => None,
        }
    }
}

/// Status line shown above the file list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Banner {
    Offline,
    Retrying { attempt: u32, max_retries: u32 },
}

impl Banner {
    pub fn text(&self) -> String {
        match self {
            Banner::Offline => "No Internet Connection".to_string(),
            Banner::Retrying {
                attempt,
                max_retries,
            } => format!("Retrying... (Attempt {}/{})", attempt, max_retries),
        }
    }
}

/// State for the Files tab.
#[derive(Debug, Default)]
pub struct FilesTabState {
    pub data: LoadingState<Vec<FileRecord>>,
    pub list_state: ListState,
    pub source: Option<ListingSource>,
    pub retry: Option<ScheduledRetry>,
    pub connected: Option<bool>,
    /// Operation in flight, e.g. "Uploading notes.txt".
    pub activity: Option<String>,
}

impl FilesTabState {
    pub fn files(&self) -> &[FileRecord] {
        self.data.data().map(Vec::as_slice).unwrap_or_default()
    }

    pub fn selected_item(&self) -> Option<&FileRecord> {
        self.files().get(self.list_state.selected()?)
    }

    pub fn select_next(&mut self) {
        let len = self.files().len();
        if len == 0 {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) if i + 1 < len => i + 1,
            Some(i) => i,
            None => 0,
        };
        self.list_state.select(Some(i));
    }

    pub fn select_prev(&mut self) {
        if self.files().is_empty() {
            return;
        }
        let i = self.list_state.selected().map_or(0, |i| i.saturating_sub(1));
        self.list_state.select(Some(i));
    }

    /// Show a listing, keeping the selection on the same file when it is still present.
    pub fn apply_listing(&mut self, listing: Listing) {
        self.retry = listing.retry;

        if listing.source == ListingSource::Pending && listing.files.is_empty() {
            if !self.data.is_loaded() {
                self.data = LoadingState::Loading;
                self.source = Some(ListingSource::Pending);
            }
            return;
        }
        self.source = Some(listing.source);

        let selected_id = self.selected_item().map(|file| file.id.clone());
        let index = selected_id
            .and_then(|id| listing.files.iter().position(|file| file.id == id))
            .or((!listing.files.is_empty()).then_some(0));

        self.data = LoadingState::Loaded(listing.files);
        self.list_state.select(index);
    }

    pub fn set_loading(&mut self) {
        if !self.data.is_loaded() {
            self.data = LoadingState::Loading;
        }
    }

    /// Record a failed load. Already-loaded files stay on screen.
    pub fn set_error(&mut self, error: String) {
        self.retry = None;
        if !self.data.is_loaded() {
            self.data = LoadingState::Error(error);
        }
    }

    pub fn banner(&self) -> Option<Banner> {
        if self.connected == Some(false) {
            return Some(Banner::Offline);
        }
        self.retry.map(|retry| Banner::Retrying {
            attempt: retry.attempt,
            max_retries: retry.max_retries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;

    fn file(id: &str) -> FileRecord {
        FileRecord {
            id: id.to_string(),
            name: format!("{}.png", id),
            size_bytes: 1,
            mime_type: "image/png".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            etag: None,
        }
    }

    fn retry(attempt: u32) -> ScheduledRetry {
        ScheduledRetry {
            attempt,
            max_retries: 3,
            delay: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_selection_follows_file() {
        let mut state = FilesTabState::default();
        state.apply_listing(Listing::network(vec![file("a"), file("b"), file("c")]));
        assert_eq!(state.list_state.selected(), Some(0));

        state.select_next();
        state.select_next();
        assert_eq!(state.selected_item().unwrap().id, "c");

        state.apply_listing(Listing::local(vec![file("c"), file("d")]));
        assert_eq!(state.selected_item().unwrap().id, "c");

        state.apply_listing(Listing::local(vec![file("d")]));
        assert_eq!(state.selected_item().unwrap().id, "d");

        state.apply_listing(Listing::local(Vec::new()));
        assert_eq!(state.list_state.selected(), None);
    }

    #[test]
    fn test_selection_stops_at_ends() {
        let mut state = FilesTabState::default();
        state.apply_listing(Listing::network(vec![file("a"), file("b")]));
        state.select_prev();
        assert_eq!(state.list_state.selected(), Some(0));
        state.select_next();
        state.select_next();
        assert_eq!(state.list_state.selected(), Some(1));
    }

    #[test]
    fn test_pending_listing_keeps_loaded_files() {
        let mut state = FilesTabState::default();
        state.apply_listing(Listing::interim(None, retry(1)));
        assert!(matches!(state.data, LoadingState::Loading));

        state.apply_listing(Listing::network(vec![file("a")]));
        state.apply_listing(Listing::interim(None, retry(2)));
        assert_eq!(state.files().len(), 1);
        assert_eq!(state.banner().unwrap().text(), "Retrying... (Attempt 2/3)");
    }

    #[test]
    fn test_offline_banner_wins() {
        let mut state = FilesTabState {
            retry: Some(retry(1)),
            ..FilesTabState::default()
        };
        state.connected = Some(false);
        assert_eq!(state.banner(), Some(Banner::Offline));
        state.connected = None;
        assert!(matches!(state.banner(), Some(Banner::Retrying { .. })));
    }

    #[test]
    fn test_error_does_not_hide_files() {
        let mut state = FilesTabState::default();
        state.set_error("boom".to_string());
        assert!(matches!(state.data, LoadingState::Error(_)));

        state.apply_listing(Listing::network(vec![file("a")]));
        state.set_error("again".to_string());
        assert_eq!(state.files().len(), 1);
    }
}
