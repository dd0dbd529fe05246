// Cache path utilities.
// Resolves where the key-value store, log file, and downloads live on this platform.

use std::path::PathBuf;

use directories::{ProjectDirs, UserDirs};

/// Get the base cache directory (~/.cache/filestash on Linux).
pub fn cache_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "filestash").map(|dirs| dirs.cache_dir().to_path_buf())
}

/// Directory holding the persisted key-value entries.
pub fn store_dir() -> Option<PathBuf> {
    cache_dir().map(|dir| dir.join("store"))
}

/// Path to the application log file.
pub fn log_path() -> Option<PathBuf> {
    cache_dir().map(|dir| dir.join("filestash.log"))
}

/// Where downloaded files are saved: the user's download folder, else the cache.
pub fn download_dir() -> Option<PathBuf> {
    UserDirs::new()
        .and_then(|dirs| dirs.download_dir().map(|dir| dir.to_path_buf()))
        .or_else(|| cache_dir().map(|dir| dir.join("downloads")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_paths() {
        // These tests verify path construction, not actual filesystem
        if let Some(store) = store_dir() {
            assert!(store.ends_with("store"));
        }
        if let Some(log) = log_path() {
            assert!(log.ends_with("filestash.log"));
        }
    }
}
