// Error types for filestash.
// Splits remote failures into retryable network faults and structured rejections.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StashError {
    #[error("No internet connection")]
    Offline,

    #[error("Network request failed: {0}")]
    NetworkFailure(String),

    #[error("Failed to load files after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("Remote rejected request ({status}): {message}")]
    RemoteRejected { status: u16, message: String },

    #[error("Unreadable cached data: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown file: {0}")]
    UnknownFile(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Missing {0} environment variable")]
    MissingCredentials(&'static str),

    #[error("{0}")]
    Other(String),
}

impl StashError {
    /// Whether the coordinator should retry the failed call with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StashError::NetworkFailure(_))
    }

    /// Whether the remote refused the access token, so a fresh one may succeed.
    ///
    /// The storage API reports expired tokens as 400 with a "jwt expired" message.
    pub fn is_unauthorized(&self) -> bool {
        match self {
            StashError::RemoteRejected { status: 401, .. } => true,
            StashError::RemoteRejected { message, .. } => {
                message.to_ascii_lowercase().contains("jwt")
            }
            _ => false,
        }
    }

    /// Classify an HTTP error status and response body.
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            408 | 429 | 500..=599 => {
                StashError::NetworkFailure(format!("HTTP {}: {}", status, body))
            }
            _ => StashError::RemoteRejected {
                status,
                message: remote_message(body),
            },
        }
    }
}

impl From<reqwest::Error> for StashError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => StashError::from_status(status.as_u16(), &err.to_string()),
            None => StashError::NetworkFailure(err.to_string()),
        }
    }
}

/// Pull a human-readable message out of a JSON error body, falling back to the raw text.
fn remote_message(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    parsed
        .as_ref()
        .and_then(|value| {
            ["message", "msg", "error_description", "error"]
                .iter()
                .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
        })
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string())
}

pub type Result<T> = std::result::Result<T, StashError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_errors_are_retryable() {
        assert!(StashError::from_status(503, "unavailable").is_retryable());
        assert!(StashError::from_status(429, "slow down").is_retryable());
        assert!(StashError::from_status(408, "").is_retryable());
    }

    #[test]
    fn test_client_errors_are_rejections() {
        let err = StashError::from_status(
            400,
            r#"{"statusCode":"403","error":"Unauthorized","message":"jwt expired"}"#,
        );
        match err {
            StashError::RemoteRejected { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "jwt expired");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!StashError::from_status(401, "nope").is_retryable());
    }

    #[test]
    fn test_rejection_message_falls_back_to_body() {
        let err = StashError::from_status(409, "  Duplicate  ");
        assert_eq!(
            err.to_string(),
            "Remote rejected request (409): Duplicate"
        );
    }

    #[test]
    fn test_only_network_failures_retry() {
        assert!(!StashError::Offline.is_retryable());
        assert!(!StashError::RetriesExhausted { attempts: 4 }.is_retryable());
        assert!(!StashError::UnknownFile("x".into()).is_retryable());
    }

    #[test]
    fn test_token_rejections() {
        assert!(StashError::from_status(401, "").is_unauthorized());
        assert!(
            StashError::from_status(400, r#"{"statusCode":"403","message":"jwt expired"}"#)
                .is_unauthorized()
        );
        assert!(!StashError::from_status(409, "Duplicate").is_unauthorized());
        assert!(!StashError::NetworkFailure("reset".into()).is_unauthorized());
    }
}
