//! Identity server token operations.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};

/// Tokens returned from the token endpoint.
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Vec<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .field("token_type", &self.token_type)
            .finish_non_exhaustive()
    }
}

/// What the validate endpoint reports about a live token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub client_id: String,
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Seconds of lifetime left. Zero means the token does not expire.
    #[serde(default)]
    pub expires_in: u64,
}

impl TokenInfo {
    /// Remaining lifetime, `None` for non-expiring tokens.
    pub fn remaining(&self) -> Option<Duration> {
        (self.expires_in > 0).then(|| Duration::from_secs(self.expires_in))
    }

    /// Whether the token expires sooner than `window`.
    pub fn expires_within(&self, window: Duration) -> bool {
        self.remaining().is_some_and(|left| left < window)
    }
}

/// Operations against the identity server's token endpoints.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Exchange an authorization code for an access and refresh token.
    async fn exchange_code(
        &self,
        client_id: &str,
        client_secret: &str,
        code: &str,
        redirect_uri: &str,
    ) -> AuthResult<TokenResponse>;

    /// Obtain a new token pair from a refresh token.
    async fn refresh(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> AuthResult<TokenResponse>;

    /// Check a token. `Ok(None)` means the server rejected it as invalid.
    async fn validate(&self, access_token: &str) -> AuthResult<Option<TokenInfo>>;
}

/// [`TokenEndpoint`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTokenEndpoint {
    client: Client,
    token_url: String,
    validate_url: String,
}

impl HttpTokenEndpoint {
    /// Create an endpoint client from the configured URLs.
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            client: Client::new(),
            token_url: config.token_url.clone(),
            validate_url: config.validate_url.clone(),
        }
    }

    async fn post_token(&self, params: &[(&str, &str)]) -> AuthResult<TokenResponse> {
        let response = self
            .client
            .post(&self.token_url)
            .header("Accept", "application/json")
            .form(params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::RemoteCallFailed { status, body });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl TokenEndpoint for HttpTokenEndpoint {
    async fn exchange_code(
        &self,
        client_id: &str,
        client_secret: &str,
        code: &str,
        redirect_uri: &str,
    ) -> AuthResult<TokenResponse> {
        debug!("Exchanging authorization code");
        self.post_token(&[
            ("grant_type", "authorization_code"),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ])
        .await
    }

    async fn refresh(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> AuthResult<TokenResponse> {
        debug!("Refreshing access token");
        self.post_token(&[
            ("grant_type", "refresh_token"),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    async fn validate(&self, access_token: &str) -> AuthResult<Option<TokenInfo>> {
        let response = self
            .client
            .get(&self.validate_url)
            .header("Authorization", format!("OAuth {}", access_token))
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(Some(response.json().await?)),
            StatusCode::UNAUTHORIZED => Ok(None),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(AuthError::RemoteCallFailed {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }
}
