// Auth API client and session persistence.
// Password sign-in, token refresh, and restoring a saved session on startup.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::KeyValueStore;
use crate::config::Config;
use crate::error::{Result, StashError};

use super::client::{build_http_client, check_response};
use super::types::{Session, TokenResponse};

/// Key the session is stored under.
pub const SESSION_KEY: &str = "session";

#[derive(Debug, Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

/// Client for the hosted auth service.
pub struct AuthClient {
    client: Client,
    base_url: String,
}

impl AuthClient {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            client: build_http_client(&config.anon_key, Some(&config.anon_key))?,
            base_url: format!("{}/auth/v1", config.project_url),
        })
    }

    /// Sign in with email and password.
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        let body = PasswordGrant { email, password };
        let session = self.token_grant("password", &body).await?;
        info!(user = %session.user.id, "Signed in");
        Ok(session)
    }

    /// Exchange a refresh token for a new session.
    pub async fn refresh_session(&self, refresh_token: &str) -> Result<Session> {
        let body = RefreshGrant { refresh_token };
        let session = self.token_grant("refresh_token", &body).await?;
        debug!(user = %session.user.id, "Session refreshed");
        Ok(session)
    }

    async fn token_grant<B: Serialize + ?Sized>(&self, grant_type: &str, body: &B) -> Result<Session> {
        let response = self
            .client
            .post(format!("{}/token", self.base_url))
            .query(&[("grant_type", grant_type)])
            .json(body)
            .send()
            .await?;
        let response = check_response(response).await?;
        let token: TokenResponse = response.json().await?;
        Ok(token.into_session(Utc::now()))
    }
}

/// Persists the current session in the key-value store.
pub struct SessionStore {
    store: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Load the saved session. An unreadable record counts as no session.
    pub fn load(&self) -> Result<Option<Session>> {
        let Some(bytes) = self.store.get(SESSION_KEY)? else {
            return Ok(None);
        };
        match serde_json::from_slice(&bytes) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                warn!(error = %e, "Discarding unreadable saved session");
                Ok(None)
            }
        }
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        let bytes = serde_json::to_vec(session)?;
        self.store.set(SESSION_KEY, &bytes)
    }

    pub fn clear(&self) -> Result<()> {
        self.store.delete(SESSION_KEY)
    }
}

/// Email/password pair used when no usable session is saved.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    /// Read FILESTASH_EMAIL and FILESTASH_PASSWORD.
    pub fn from_env() -> Result<Self> {
        let email = std::env::var("FILESTASH_EMAIL")
            .map_err(|_| StashError::MissingCredentials("FILESTASH_EMAIL"))?;
        let password = std::env::var("FILESTASH_PASSWORD")
            .map_err(|_| StashError::MissingCredentials("FILESTASH_PASSWORD"))?;
        Ok(Self { email, password })
    }
}

/// What startup should do with the saved session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPlan {
    Reuse(Session),
    Refresh(String),
    SignIn,
}

/// Decide how to obtain a usable session from what was saved.
pub fn plan_session(saved: Option<Session>, now: DateTime<Utc>) -> SessionPlan {
    match saved {
        Some(session) if !session.is_expired(now) => SessionPlan::Reuse(session),
        Some(session) => SessionPlan::Refresh(session.refresh_token),
        None => SessionPlan::SignIn,
    }
}

/// Restore the saved session, refreshing or signing in as needed, and save the result.
pub async fn restore_or_sign_in(auth: &AuthClient, sessions: &SessionStore) -> Result<Session> {
    let saved = sessions.load()?;
    let session = match plan_session(saved.clone(), Utc::now()) {
        SessionPlan::Reuse(session) => {
            debug!(user = %session.user.id, "Reusing saved session");
            return Ok(session);
        }
        SessionPlan::Refresh(refresh_token) => match auth.refresh_session(&refresh_token).await {
            Ok(session) => session,
            // Unreachable auth server: start with the expired session so cached files still show
            Err(e) if e.is_retryable() => match saved {
                Some(session) => {
                    warn!(error = %e, "Session refresh unavailable, keeping saved session");
                    return Ok(session);
                }
                None => return Err(e),
            },
            Err(e) => {
                warn!(error = %e, "Session refresh failed, signing in again");
                sessions.clear()?;
                sign_in_from_env(auth).await?
            }
        },
        SessionPlan::SignIn => sign_in_from_env(auth).await?,
    };

    sessions.save(&session)?;
    Ok(session)
}

async fn sign_in_from_env(auth: &AuthClient) -> Result<Session> {
    let credentials = Credentials::from_env()?;
    auth.sign_in_with_password(&credentials.email, &credentials.password)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::storage::User;

    fn session(expires_at: i64) -> Session {
        Session {
            access_token: "access".into(),
            refresh_token: "refresh".into(),
            expires_at,
            user: User {
                id: "user-1".into(),
                email: Some("me@example.com".into()),
            },
        }
    }

    #[test]
    fn test_session_round_trip_through_store() {
        let sessions = SessionStore::new(Arc::new(MemoryStore::new()));
        assert!(sessions.load().unwrap().is_none());

        let saved = session(2_000_000_000);
        sessions.save(&saved).unwrap();
        assert_eq!(sessions.load().unwrap(), Some(saved));

        sessions.clear().unwrap();
        assert!(sessions.load().unwrap().is_none());
    }

    #[test]
    fn test_corrupt_session_is_ignored() {
        let store = Arc::new(MemoryStore::new());
        store.set(SESSION_KEY, b"{not json").unwrap();
        let sessions = SessionStore::new(store);
        assert!(sessions.load().unwrap().is_none());
    }

    #[test]
    fn test_plan_session() {
        let now = Utc::now();
        assert_eq!(plan_session(None, now), SessionPlan::SignIn);

        let fresh = session(now.timestamp() + 3600);
        assert_eq!(plan_session(Some(fresh.clone()), now), SessionPlan::Reuse(fresh));

        let expired = session(now.timestamp() - 10);
        assert_eq!(
            plan_session(Some(expired), now),
            SessionPlan::Refresh("refresh".into())
        );
    }

    #[test]
    fn test_token_response_into_session() {
        let json = r#"{"access_token":"a","token_type":"bearer","expires_in":3600,
            "refresh_token":"r","user":{"id":"u-1","email":"x@y.z"}}"#;
        let token: TokenResponse = serde_json::from_str(json).unwrap();
        let now = Utc::now();
        let session = token.into_session(now);
        assert_eq!(session.expires_at, now.timestamp() + 3600);
        assert_eq!(session.user.id, "u-1");
    }
}
