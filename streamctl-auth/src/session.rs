//! Session acquisition.
//!
//! Every outward-facing operation asks the [`SessionFactory`] for a fresh
//! [`Session`]. The stored token is validated each time, refreshed when it is
//! invalid or about to expire and a refresh path exists, and the refreshed
//! pair is persisted. Nothing runs between calls.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult, Remedy};
use crate::secrets::{Credentials, SecretKey, SecretStore};
use crate::token::{TokenEndpoint, TokenInfo};

/// An authenticated context bound to one access token.
#[derive(Clone)]
pub struct Session {
    client_id: String,
    access_token: String,
    user_id: Option<String>,
    login: Option<String>,
    expires_in: Option<Duration>,
}

impl Session {
    /// Create a session from raw parts.
    pub fn new(client_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            access_token: access_token.into(),
            user_id: None,
            login: None,
            expires_in: None,
        }
    }

    /// Attach what token validation reported.
    #[must_use]
    pub fn with_info(mut self, info: &TokenInfo) -> Self {
        self.user_id = info.user_id.clone();
        self.login = info.login.clone();
        self.expires_in = info.remaining();
        self
    }

    /// Set the remaining lifetime.
    #[must_use]
    pub fn with_expires_in(mut self, expires_in: Option<Duration>) -> Self {
        self.expires_in = expires_in;
        self
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Id of the user the token belongs to, when validation reported it.
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Login of the user the token belongs to, when validation reported it.
    pub fn login(&self) -> Option<&str> {
        self.login.as_deref()
    }

    /// Remaining lifetime when acquired, `None` if unknown or non-expiring.
    pub fn expires_in(&self) -> Option<Duration> {
        self.expires_in
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("client_id", &self.client_id)
            .field("user_id", &self.user_id)
            .field("login", &self.login)
            .field("expires_in", &self.expires_in)
            .finish_non_exhaustive()
    }
}

/// Produces validated sessions from stored credentials.
#[derive(Clone)]
pub struct SessionFactory {
    secrets: Arc<dyn SecretStore>,
    tokens: Arc<dyn TokenEndpoint>,
    refresh_window: Duration,
}

impl SessionFactory {
    /// Create a factory.
    pub fn new(
        config: &AuthConfig,
        secrets: Arc<dyn SecretStore>,
        tokens: Arc<dyn TokenEndpoint>,
    ) -> Self {
        Self {
            secrets,
            tokens,
            refresh_window: config.refresh_window,
        }
    }

    /// Acquire a ready-to-use session.
    pub async fn session(&self) -> AuthResult<Session> {
        let creds = Credentials::load(self.secrets.as_ref())?;
        let client_id = creds
            .client_id
            .clone()
            .ok_or_else(|| AuthError::missing(SecretKey::ClientId, Remedy::Setup))?;
        let access_token = creds
            .access_token
            .clone()
            .ok_or_else(|| AuthError::missing(SecretKey::AccessToken, Remedy::Authenticate))?;

        match self.tokens.validate(&access_token).await? {
            None => {
                debug!("Stored access token is invalid");
                let Some((secret, refresh_token)) = creds.refresh_pair() else {
                    return Err(AuthError::TokenExpired);
                };
                self.refresh(&client_id, secret, refresh_token).await
            }
            Some(info) => {
                let session = Session::new(&client_id, &access_token).with_info(&info);
                if !info.expires_within(self.refresh_window) {
                    return Ok(session);
                }

                let Some((secret, refresh_token)) = creds.refresh_pair() else {
                    warn!(
                        expires_in = info.expires_in,
                        "Access token expires soon and cannot be refreshed; using it as is"
                    );
                    return Ok(session);
                };

                match self.refresh(&client_id, secret, refresh_token).await {
                    Ok(refreshed) => Ok(refreshed.carry_identity(&session)),
                    Err(e) => {
                        warn!(
                            error = %e,
                            expires_in = info.expires_in,
                            "Proactive refresh failed; using the still-valid token"
                        );
                        Ok(session)
                    }
                }
            }
        }
    }

    async fn refresh(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> AuthResult<Session> {
        let issued = self
            .tokens
            .refresh(client_id, client_secret, refresh_token)
            .await
            .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;

        self.secrets
            .store_tokens(&issued.access_token, issued.refresh_token.as_deref())?;
        info!("Access token refreshed and stored");

        let expires_in = issued.expires_in.filter(|s| *s > 0).map(Duration::from_secs);
        Ok(Session::new(client_id, issued.access_token).with_expires_in(expires_in))
    }
}

impl Session {
    /// Keep the user identity of an earlier session for the same account.
    fn carry_identity(mut self, previous: &Session) -> Self {
        self.user_id = previous.user_id.clone();
        self.login = previous.login.clone();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::MemoryStore;
    use crate::token::TokenResponse;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Validates only `valid_token`, reporting `expires_in` for it.
    struct FakeTokens {
        valid_token: String,
        expires_in: u64,
        refresh_ok: bool,
        refreshes: AtomicUsize,
    }

    impl FakeTokens {
        fn new(valid_token: &str, expires_in: u64) -> Self {
            Self {
                valid_token: valid_token.to_string(),
                expires_in,
                refresh_ok: true,
                refreshes: AtomicUsize::new(0),
            }
        }

        fn failing_refresh(mut self) -> Self {
            self.refresh_ok = false;
            self
        }

        fn refresh_count(&self) -> usize {
            self.refreshes.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TokenEndpoint for FakeTokens {
        async fn exchange_code(&self, _: &str, _: &str, _: &str, _: &str) -> AuthResult<TokenResponse> {
            unreachable!("sessions never exchange codes")
        }

        async fn refresh(&self, _: &str, secret: &str, refresh_token: &str) -> AuthResult<TokenResponse> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            assert_eq!(secret, "shh");
            if !self.refresh_ok {
                return Err(AuthError::RemoteCallFailed {
                    status: 400,
                    body: "Invalid refresh token".into(),
                });
            }
            Ok(TokenResponse {
                access_token: format!("fresh-from-{refresh_token}"),
                refresh_token: Some("refresh-2".into()),
                expires_in: Some(14_000),
                scope: vec![],
                token_type: None,
            })
        }

        async fn validate(&self, access_token: &str) -> AuthResult<Option<TokenInfo>> {
            Ok((access_token == self.valid_token).then(|| TokenInfo {
                client_id: "cid".into(),
                login: Some("streamer".into()),
                user_id: Some("42".into()),
                scopes: vec![],
                expires_in: self.expires_in,
            }))
        }
    }

    fn factory(store: Arc<MemoryStore>, tokens: Arc<FakeTokens>) -> SessionFactory {
        SessionFactory::new(&AuthConfig::twitch(), store, tokens)
    }

    fn base_store() -> MemoryStore {
        MemoryStore::new()
            .with(SecretKey::ClientId, "cid")
            .with(SecretKey::AccessToken, "current")
    }

    #[tokio::test]
    async fn test_valid_token_without_secret_skips_refresh() {
        let store = Arc::new(base_store());
        let tokens = Arc::new(FakeTokens::new("current", 10_000));

        let session = factory(store, tokens.clone()).session().await.unwrap();

        assert_eq!(session.access_token(), "current");
        assert_eq!(session.client_id(), "cid");
        assert_eq!(session.user_id(), Some("42"));
        assert_eq!(session.expires_in(), Some(Duration::from_secs(10_000)));
        assert_eq!(tokens.refresh_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_token_refreshes_and_persists() {
        let store = Arc::new(
            base_store()
                .with(SecretKey::ClientSecret, "shh")
                .with(SecretKey::RefreshToken, "refresh-1"),
        );
        let tokens = Arc::new(FakeTokens::new("something-else", 10_000));

        let session = factory(store.clone(), tokens.clone()).session().await.unwrap();

        assert_eq!(session.access_token(), "fresh-from-refresh-1");
        assert_eq!(tokens.refresh_count(), 1);
        assert_eq!(
            store.get(SecretKey::AccessToken).unwrap().as_deref(),
            Some("fresh-from-refresh-1")
        );
        assert_eq!(store.get(SecretKey::RefreshToken).unwrap().as_deref(), Some("refresh-2"));
    }

    #[tokio::test]
    async fn test_invalid_token_without_secret_is_expired() {
        let store = Arc::new(base_store().with(SecretKey::RefreshToken, "refresh-1"));
        let tokens = Arc::new(FakeTokens::new("something-else", 10_000));

        let err = factory(store, tokens.clone()).session().await.unwrap_err();

        assert!(matches!(err, AuthError::TokenExpired));
        assert_eq!(err.remedy(), Some(Remedy::Authenticate));
        assert_eq!(tokens.refresh_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_token_refresh_failure() {
        let store = Arc::new(
            base_store()
                .with(SecretKey::ClientSecret, "shh")
                .with(SecretKey::RefreshToken, "refresh-1"),
        );
        let tokens = Arc::new(FakeTokens::new("something-else", 10_000).failing_refresh());

        let err = factory(store.clone(), tokens).session().await.unwrap_err();

        assert!(matches!(err, AuthError::RefreshFailed(_)));
        assert_eq!(store.get(SecretKey::AccessToken).unwrap().as_deref(), Some("current"));
    }

    #[tokio::test]
    async fn test_expiring_token_is_refreshed_proactively() {
        let store = Arc::new(
            base_store()
                .with(SecretKey::ClientSecret, "shh")
                .with(SecretKey::RefreshToken, "refresh-1"),
        );
        let tokens = Arc::new(FakeTokens::new("current", 100));

        let session = factory(store.clone(), tokens.clone()).session().await.unwrap();

        assert_eq!(session.access_token(), "fresh-from-refresh-1");
        assert_eq!(session.user_id(), Some("42"));
        assert_eq!(tokens.refresh_count(), 1);
    }

    #[tokio::test]
    async fn test_expiring_token_refresh_failure_degrades() {
        let store = Arc::new(
            base_store()
                .with(SecretKey::ClientSecret, "shh")
                .with(SecretKey::RefreshToken, "refresh-1"),
        );
        let tokens = Arc::new(FakeTokens::new("current", 100).failing_refresh());

        let session = factory(store.clone(), tokens.clone()).session().await.unwrap();

        assert_eq!(session.access_token(), "current");
        assert_eq!(tokens.refresh_count(), 1);
        assert_eq!(store.get(SecretKey::AccessToken).unwrap().as_deref(), Some("current"));
    }

    #[tokio::test]
    async fn test_expiring_token_without_refresh_token_degrades() {
        let store = Arc::new(base_store().with(SecretKey::ClientSecret, "shh"));
        let tokens = Arc::new(FakeTokens::new("current", 100));

        let session = factory(store, tokens.clone()).session().await.unwrap();

        assert_eq!(session.access_token(), "current");
        assert_eq!(tokens.refresh_count(), 0);
    }

    #[tokio::test]
    async fn test_non_expiring_token_is_not_refreshed() {
        let store = Arc::new(
            base_store()
                .with(SecretKey::ClientSecret, "shh")
                .with(SecretKey::RefreshToken, "refresh-1"),
        );
        let tokens = Arc::new(FakeTokens::new("current", 0));

        let session = factory(store, tokens.clone()).session().await.unwrap();

        assert_eq!(session.expires_in(), None);
        assert_eq!(tokens.refresh_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_credentials() {
        let tokens = Arc::new(FakeTokens::new("current", 100));

        let err = factory(Arc::new(MemoryStore::new()), tokens.clone())
            .session()
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AuthError::ConfigMissing {
                key: SecretKey::ClientId,
                remedy: Remedy::Setup
            }
        ));

        let store = Arc::new(MemoryStore::new().with(SecretKey::ClientId, "cid"));
        let err = factory(store, tokens).session().await.unwrap_err();
        assert!(matches!(
            err,
            AuthError::ConfigMissing {
                key: SecretKey::AccessToken,
                remedy: Remedy::Authenticate
            }
        ));
    }
}
