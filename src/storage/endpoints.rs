// Storage API endpoint functions.
// Implements RemoteStore against the hosted object-storage REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use tracing::debug;

use crate::error::Result;

use super::RemoteStore;
use super::client::{StorageClient, encode_key};
use super::types::{FileObject, FileRecord, RemoteFileDescriptor, SignedUrlResponse};

/// Page size for list requests.
const LIST_PAGE_SIZE: u32 = 100;

/// Request body for the list endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListRequest<'a> {
    prefix: &'a str,
    limit: u32,
    offset: u32,
    sort_by: SortBy,
}

#[derive(Debug, Serialize)]
struct SortBy {
    column: &'static str,
    order: &'static str,
}

/// Request body for the remove endpoint.
#[derive(Debug, Serialize)]
struct RemoveRequest<'a> {
    prefixes: [&'a str; 1],
}

/// Request body for the sign endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignRequest {
    expires_in: u64,
}

#[async_trait]
impl RemoteStore for StorageClient {
    async fn list(&self, user_id: &str) -> Result<Vec<FileRecord>> {
        let mut records = Vec::new();
        let mut offset = 0;

        loop {
            let body = ListRequest {
                prefix: user_id,
                limit: LIST_PAGE_SIZE,
                offset,
                sort_by: SortBy {
                    column: "name",
                    order: "asc",
                },
            };
            let path = format!("/object/list/{}", self.bucket());
            let response = self.send(|| self.post(&path).json(&body)).await?;
            let page: Vec<FileObject> = response.json().await?;
            let page_len = page.len() as u32;
            records.extend(page.into_iter().filter_map(FileObject::into_record));

            if page_len < LIST_PAGE_SIZE {
                break;
            }
            offset += page_len;
        }

        debug!(user = user_id, count = records.len(), "Listed files");
        Ok(records)
    }

    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<RemoteFileDescriptor> {
        let url = format!("/object/{}/{}", self.bucket(), encode_key(path));
        let response = self
            .send(|| {
                self.post(&url)
                    .header(CONTENT_TYPE, content_type)
                    .header("x-upsert", "false")
                    .body(bytes.clone())
            })
            .await?;
        let descriptor: RemoteFileDescriptor = response.json().await?;
        Ok(descriptor)
    }

    async fn remove(&self, path: &str) -> Result<()> {
        let body = RemoveRequest { prefixes: [path] };
        let url = format!("/object/{}", self.bucket());
        self.send(|| self.delete(&url).json(&body)).await?;
        Ok(())
    }

    async fn sign_url(&self, path: &str, ttl: Duration) -> Result<String> {
        let body = SignRequest {
            expires_in: ttl.as_secs(),
        };
        let url = format!("/object/sign/{}/{}", self.bucket(), encode_key(path));
        let response = self.send(|| self.post(&url).json(&body)).await?;
        let signed: SignedUrlResponse = response.json().await?;
        Ok(absolute_signed_url(self, &signed.signed_url))
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>> {
        let url = format!("/object/authenticated/{}/{}", self.bucket(), encode_key(path));
        let response = self.send(|| self.get(&url)).await?;
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}

/// The sign endpoint returns a path relative to the storage API root.
fn absolute_signed_url(client: &StorageClient, signed: &str) -> String {
    if signed.starts_with("http://") || signed.starts_with("https://") {
        signed.to_string()
    } else if signed.starts_with('/') {
        client.url(signed)
    } else {
        client.url(&format!("/{}", signed))
    }
}
