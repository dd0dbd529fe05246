// Live session shared by every storage request.
// Refreshes the access token before it expires or after the API rejects it.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::Result;

use super::auth::{AuthClient, SessionStore};
use super::types::Session;

/// Exchanges a refresh token for a new session.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh_session(&self, refresh_token: &str) -> Result<Session>;
}

#[async_trait]
impl TokenRefresher for AuthClient {
    async fn refresh_session(&self, refresh_token: &str) -> Result<Session> {
        AuthClient::refresh_session(self, refresh_token).await
    }
}

/// Holds the current session and keeps its access token usable.
///
/// Every refreshed session is saved so the next launch starts from it.
pub struct SessionManager {
    refresher: Arc<dyn TokenRefresher>,
    sessions: SessionStore,
    current: Mutex<Session>,
    refreshing: tokio::sync::Mutex<()>,
}

impl SessionManager {
    pub fn new(
        session: Session,
        refresher: Arc<dyn TokenRefresher>,
        sessions: SessionStore,
    ) -> Self {
        Self {
            refresher,
            sessions,
            current: Mutex::new(session),
            refreshing: tokio::sync::Mutex::new(()),
        }
    }

    pub fn current(&self) -> Session {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Token for the next request, refreshed first when it is about to expire.
    ///
    /// If the auth server cannot be reached the old token is handed out and the
    /// request decides the outcome.
    pub async fn access_token(&self) -> Result<String> {
        let session = self.current();
        if !session.is_expired(Utc::now()) {
            return Ok(session.access_token);
        }
        match self.refresh(&session.access_token).await {
            Ok(token) => Ok(token),
            Err(e) if e.is_retryable() => {
                warn!(error = %e, "Token refresh unavailable, using expiring token");
                Ok(session.access_token)
            }
            Err(e) => Err(e),
        }
    }

    /// Replace the session whose access token is `stale_token`.
    ///
    /// Callers racing on the same stale token share one refresh.
    pub async fn refresh(&self, stale_token: &str) -> Result<String> {
        let _guard = self.refreshing.lock().await;
        let session = self.current();
        if session.access_token != stale_token {
            debug!("Token already refreshed");
            return Ok(session.access_token);
        }

        let fresh = self.refresher.refresh_session(&session.refresh_token).await?;
        self.sessions.save(&fresh)?;
        let token = fresh.access_token.clone();
        info!(user = %fresh.user.id, expires_at = fresh.expires_at, "Access token refreshed");
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = fresh;
        Ok(token)
    }

    /// Run `op` with a usable token. A rejected token is refreshed and `op` runs once more.
    pub async fn authorized<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let token = self.access_token().await?;
        match op(token.clone()).await {
            Err(e) if e.is_unauthorized() => {
                debug!(error = %e, "Access token rejected");
                let token = self.refresh(&token).await?;
                op(token).await
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::error::StashError;
    use crate::storage::User;
    use std::collections::VecDeque;

    /// Hands out scripted refresh results and records the refresh tokens it saw.
    #[derive(Default)]
    struct FakeRefresher {
        results: Mutex<VecDeque<Result<Session>>>,
        seen: Mutex<Vec<String>>,
    }

    impl FakeRefresher {
        fn with(results: Vec<Result<Session>>) -> Arc<Self> {
            Arc::new(Self {
                results: Mutex::new(results.into()),
                seen: Mutex::default(),
            })
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TokenRefresher for FakeRefresher {
        async fn refresh_session(&self, refresh_token: &str) -> Result<Session> {
            self.seen.lock().unwrap().push(refresh_token.to_string());
            self.results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(StashError::NetworkFailure("no script".into())))
        }
    }

    fn session(access: &str, expires_in: i64) -> Session {
        Session {
            access_token: access.into(),
            refresh_token: format!("refresh-{access}"),
            expires_at: Utc::now().timestamp() + expires_in,
            user: User {
                id: "user-1".into(),
                email: None,
            },
        }
    }

    fn manager(initial: Session, refresher: Arc<FakeRefresher>) -> (SessionManager, SessionStore) {
        let store = Arc::new(MemoryStore::new());
        let manager = SessionManager::new(initial, refresher, SessionStore::new(store.clone()));
        (manager, SessionStore::new(store))
    }

    fn rejected() -> StashError {
        StashError::from_status(400, r#"{"statusCode":"403","message":"jwt expired"}"#)
    }

    #[tokio::test]
    async fn test_valid_token_used_as_is() {
        let refresher = FakeRefresher::with(vec![]);
        let (manager, _) = manager(session("old", 3600), refresher.clone());

        assert_eq!(manager.access_token().await.unwrap(), "old");
        assert_eq!(refresher.calls(), 0);
    }

    #[tokio::test]
    async fn test_expiring_token_refreshed_and_saved() {
        let refresher = FakeRefresher::with(vec![Ok(session("new", 3600))]);
        let (manager, saved) = manager(session("old", 30), refresher.clone());

        assert_eq!(manager.access_token().await.unwrap(), "new");
        assert_eq!(*refresher.seen.lock().unwrap(), vec!["refresh-old".to_string()]);
        assert_eq!(saved.load().unwrap().unwrap().access_token, "new");
        assert_eq!(manager.access_token().await.unwrap(), "new");
        assert_eq!(refresher.calls(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_auth_keeps_old_token() {
        let refresher = FakeRefresher::with(vec![Err(StashError::NetworkFailure("down".into()))]);
        let (manager, saved) = manager(session("old", -600), refresher);

        assert_eq!(manager.access_token().await.unwrap(), "old");
        assert!(saved.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_revoked_refresh_token_is_an_error() {
        let refresher = FakeRefresher::with(vec![Err(StashError::from_status(
            400,
            r#"{"error_description":"Invalid Refresh Token"}"#,
        ))]);
        let (manager, _) = manager(session("old", -600), refresher);

        let err = manager.access_token().await.unwrap_err();
        assert!(matches!(err, StashError::RemoteRejected { .. }));
    }

    #[tokio::test]
    async fn test_rejected_token_refreshes_then_retries() {
        // Looks valid locally but the server has already expired it.
        let refresher = FakeRefresher::with(vec![Ok(session("new", 3600))]);
        let (manager, saved) = manager(session("old", 3600), refresher.clone());
        let tokens = Mutex::new(Vec::new());

        let listed = manager
            .authorized(|token| {
                tokens.lock().unwrap().push(token.clone());
                async move {
                    match token.as_str() {
                        "new" => Ok(vec!["a.png"]),
                        _ => Err(rejected()),
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(listed, vec!["a.png"]);
        assert_eq!(*tokens.lock().unwrap(), vec!["old".to_string(), "new".to_string()]);
        assert_eq!(refresher.calls(), 1);
        assert_eq!(saved.load().unwrap().unwrap().access_token, "new");
    }

    #[tokio::test]
    async fn test_expired_session_recovers_after_reconnect() {
        // Started offline with an expired session; the auth server is back now.
        let refresher = FakeRefresher::with(vec![
            Err(StashError::NetworkFailure("down".into())),
            Err(StashError::NetworkFailure("down".into())),
            Ok(session("new", 3600)),
        ]);
        let (manager, _) = manager(session("old", -600), refresher.clone());
        let op = |token: String| async move {
            match token.as_str() {
                "new" => Ok(()),
                _ => Err(StashError::from_status(401, "")),
            }
        };

        let err = manager.authorized(op).await.unwrap_err();
        assert!(err.is_retryable());

        manager.authorized(op).await.unwrap();
        assert_eq!(manager.current().access_token, "new");
        assert_eq!(refresher.calls(), 3);
    }

    #[tokio::test]
    async fn test_other_rejections_not_refreshed() {
        let refresher = FakeRefresher::with(vec![]);
        let (manager, _) = manager(session("old", 3600), refresher.clone());

        let err = manager
            .authorized(|_| async { Err::<(), _>(StashError::from_status(409, "Duplicate")) })
            .await
            .unwrap_err();
        assert!(matches!(err, StashError::RemoteRejected { status: 409, .. }));
        assert_eq!(refresher.calls(), 0);
    }

    #[tokio::test]
    async fn test_stale_refresh_reuses_newer_token() {
        let refresher = FakeRefresher::with(vec![Ok(session("new", 3600))]);
        let (manager, _) = manager(session("old", 3600), refresher.clone());

        assert_eq!(manager.refresh("old").await.unwrap(), "new");
        assert_eq!(manager.refresh("old").await.unwrap(), "new");
        assert_eq!(refresher.calls(), 1);
    }
}
