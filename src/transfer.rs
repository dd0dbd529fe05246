// Signed URLs, previews, and downloads for listed files.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::cache::write_atomic;
use crate::error::{Result, StashError};
use crate::preview::PreviewKind;
use crate::storage::{FileRecord, RemoteStore};

/// What the view needs to show a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub kind: PreviewKind,
    pub signed_url: String,
    pub viewer_url: Option<String>,
}

/// Read-side operations on one user's files.
pub struct Transfers {
    remote: Arc<dyn RemoteStore>,
    user_id: String,
    signed_url_ttl: Duration,
}

impl Transfers {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        user_id: impl Into<String>,
        signed_url_ttl: Duration,
    ) -> Self {
        Self {
            remote,
            user_id: user_id.into(),
            signed_url_ttl,
        }
    }

    fn object_path(&self, file: &FileRecord) -> String {
        format!("{}/{}", self.user_id, file.name)
    }

    pub async fn signed_url(&self, file: &FileRecord) -> Result<String> {
        self.remote
            .sign_url(&self.object_path(file), self.signed_url_ttl)
            .await
    }

    pub async fn preview(&self, file: &FileRecord) -> Result<Preview> {
        let signed_url = self.signed_url(file).await?;
        let kind = PreviewKind::classify(&signed_url, &file.mime_type);
        let viewer_url = kind.viewer_url(&signed_url);
        debug!(name = %file.name, kind = kind.label(), "Prepared preview");
        Ok(Preview {
            kind,
            signed_url,
            viewer_url,
        })
    }

    /// Save a file into `dir`, reusing an earlier download of the same name.
    pub async fn download(&self, file: &FileRecord, dir: &Path) -> Result<PathBuf> {
        let target = target_in(dir, &file.name)?;
        if tokio::fs::try_exists(&target).await? {
            debug!(path = %target.display(), "Already downloaded");
            return Ok(target);
        }

        let bytes = self.remote.download(&self.object_path(file)).await?;
        tokio::fs::create_dir_all(dir).await?;
        let path = target.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
            .await
            .map_err(|e| StashError::Other(e.to_string()))??;

        info!(path = %target.display(), "Downloaded file");
        Ok(target)
    }
}

/// `dir/name`, provided `name` is a single plain path component.
fn target_in(dir: &Path, name: &str) -> Result<PathBuf> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(dir.join(name)),
        _ => Err(StashError::Other(format!(
            "Refusing to save {name:?} outside the download folder"
        ))),
    }
}
