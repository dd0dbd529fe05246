// filestash library.
// Offline-tolerant file listing, upload, preview, and download for a hosted storage bucket.

pub mod cache;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod preview;
pub mod storage;
pub mod sync;
pub mod transfer;

pub use error::{Result, StashError};
