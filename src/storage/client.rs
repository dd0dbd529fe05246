// Hosted storage HTTP client.
// Handles API-key and bearer headers, request timeouts, and status classification.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{
    Client, RequestBuilder, Response,
    header::{AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT},
};
use tracing::debug;

use crate::config::Config;
use crate::error::{Result, StashError};

use super::session::SessionManager;

/// Transport-level timeout for every request.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Storage API client bound to one bucket and one signed-in user.
#[derive(Clone)]
pub struct StorageClient {
    client: Client,
    base_url: String,
    bucket: String,
    session: Arc<SessionManager>,
}

impl StorageClient {
    /// Create a client that authenticates each request with the session's current token.
    pub fn new(config: &Config, session: Arc<SessionManager>) -> Result<Self> {
        let client = build_http_client(&config.anon_key, None)?;
        Ok(Self {
            client,
            base_url: format!("{}/storage/v1", config.project_url),
            bucket: config.bucket.clone(),
            session,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Absolute URL for a storage API path.
    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub(crate) fn post(&self, path: &str) -> RequestBuilder {
        self.client.post(self.url(path))
    }

    pub(crate) fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(self.url(path))
    }

    pub(crate) fn delete(&self, path: &str) -> RequestBuilder {
        self.client.delete(self.url(path))
    }

    /// Send the request built by `build` with the current bearer token and
    /// convert error statuses. A rejected token is refreshed and the request rebuilt once.
    pub(crate) async fn send<F>(&self, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder + Send + Sync,
    {
        self.session
            .authorized(|token| {
                let request = build().bearer_auth(token);
                async move { check_response(request.send().await?).await }
            })
            .await
    }
}

/// Build an HTTP client with the project's default headers.
///
/// Without a default `bearer`, callers authorize each request themselves.
pub(crate) fn build_http_client(anon_key: &str, bearer: Option<&str>) -> Result<Client> {
    let mut headers = HeaderMap::new();

    headers.insert(
        "apikey",
        HeaderValue::from_str(anon_key).map_err(|e| StashError::Config(e.to_string()))?,
    );
    if let Some(bearer) = bearer {
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", bearer))
                .map_err(|e| StashError::Config(e.to_string()))?,
        );
    }
    headers.insert(USER_AGENT, HeaderValue::from_static("filestash"));

    Client::builder()
        .default_headers(headers)
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|e| StashError::Other(e.to_string()))
}

/// Check response status and convert errors.
pub(crate) async fn check_response(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().path().to_string();
    let body = response.text().await.unwrap_or_default();
    debug!(status = status.as_u16(), url = %url, "Request failed");
    Err(StashError::from_status(status.as_u16(), &body))
}

/// Percent-encode each segment of an object key, keeping the separators.
pub(crate) fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
