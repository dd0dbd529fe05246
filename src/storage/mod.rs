// Remote storage module.
// Collaborator traits for the hosted backend plus the HTTP client that implements them.

pub mod auth;
pub mod client;
pub mod endpoints;
pub mod session;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

pub use auth::{AuthClient, SessionStore};
pub use client::StorageClient;
pub use session::{SessionManager, TokenRefresher};
pub use types::*;

/// Object-storage operations the sync layer depends on.
///
/// Paths are object keys inside the configured bucket, e.g. `<user_id>/<name>`.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// List the user's files in remote order.
    async fn list(&self, user_id: &str) -> Result<Vec<FileRecord>>;

    /// Store `bytes` at `path`. Fails if an object already exists there.
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<RemoteFileDescriptor>;

    /// Delete the object at `path`.
    async fn remove(&self, path: &str) -> Result<()>;

    /// Create a time-limited URL for reading the object at `path`.
    async fn sign_url(&self, path: &str, ttl: Duration) -> Result<String>;

    /// Fetch the object's contents.
    async fn download(&self, path: &str) -> Result<Vec<u8>>;
}
