// Storage and auth API types.
// Wire structs for the hosted REST API plus the FileRecord model the cache stores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Marker object the storage service creates to keep empty folders alive.
const FOLDER_PLACEHOLDER: &str = ".emptyFolderPlaceholder";

/// A file owned by the signed-in user, as shown in the listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    /// Final path segment of the storage key.
    pub name: String,
    pub size_bytes: u64,
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub etag: Option<String>,
}

impl FileRecord {
    /// Build a record for a just-uploaded object from what the client already knows.
    ///
    /// The remote id is used when the upload response carries one; otherwise a
    /// local placeholder id is generated. Timestamps and size are local values and
    /// may differ from the remote metadata until the next full refresh.
    pub fn uploaded(
        remote_id: Option<String>,
        target_path: &str,
        size_bytes: u64,
        mime_type: &str,
        now: DateTime<Utc>,
    ) -> Self {
        let id = remote_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| format!("local-{}", now.timestamp_millis()));
        Self {
            id,
            name: name_from_key(target_path).unwrap_or_else(|| "unnamed".to_string()),
            size_bytes,
            mime_type: mime_type.to_string(),
            created_at: now,
            updated_at: now,
            etag: None,
        }
    }
}

/// Final path segment of a storage key.
///
/// `None` when the key has no segment usable as a file name, including `.` and `..`.
pub fn name_from_key(key: &str) -> Option<String> {
    key.rsplit('/')
        .find(|segment| !segment.is_empty())
        .filter(|segment| !matches!(*segment, "." | ".."))
        .map(str::to_string)
}

/// Object metadata as returned by the storage list endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObjectMetadata {
    #[serde(rename = "eTag")]
    pub etag: Option<String>,
    pub size: Option<u64>,
    pub mimetype: Option<String>,
}

/// Entry in a storage list response. Folders come back with a null id.
#[derive(Debug, Clone, Deserialize)]
pub struct FileObject {
    pub name: String,
    pub id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Option<ObjectMetadata>,
}

impl FileObject {
    /// Convert to a FileRecord, skipping folders and placeholder objects.
    pub fn into_record(self) -> Option<FileRecord> {
        let id = self.id.filter(|id| !id.is_empty())?;
        let name = name_from_key(&self.name)?;
        if name == FOLDER_PLACEHOLDER {
            return None;
        }

        let metadata = self.metadata.unwrap_or_default();
        let created_at = self.created_at.or(self.updated_at).unwrap_or_else(Utc::now);
        let updated_at = self.updated_at.unwrap_or(created_at);

        Some(FileRecord {
            id,
            name,
            size_bytes: metadata.size.unwrap_or(0),
            mime_type: metadata
                .mimetype
                .unwrap_or_else(|| "application/octet-stream".to_string()),
            created_at,
            updated_at,
            etag: metadata.etag.map(|tag| tag.trim_matches('"').to_string()),
        })
    }
}

/// What the upload endpoint tells us about a stored object.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteFileDescriptor {
    #[serde(rename = "Id", alias = "id", default)]
    pub id: Option<String>,
    #[serde(rename = "Key", alias = "key", default)]
    pub key: Option<String>,
}

/// Signed URL response; the path is relative to the storage API root.
#[derive(Debug, Deserialize)]
pub struct SignedUrlResponse {
    #[serde(rename = "signedURL", alias = "signedUrl")]
    pub signed_url: String,
}

/// Authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Session issued by the auth service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// Expiry as epoch seconds.
    pub expires_at: i64,
    pub user: User,
}

impl Session {
    /// Seconds of slack before expiry at which a session is refreshed.
    const EXPIRY_SKEW_SECS: i64 = 60;

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() + Self::EXPIRY_SKEW_SECS >= self.expires_at
    }
}

/// Token grant response from the auth service.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: Option<i64>,
    pub expires_at: Option<i64>,
    pub user: User,
}

impl TokenResponse {
    pub fn into_session(self, now: DateTime<Utc>) -> Session {
        let expires_at = self
            .expires_at
            .unwrap_or_else(|| now.timestamp() + self.expires_in.unwrap_or(3600));
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}
