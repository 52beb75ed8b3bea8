//! Browser-driven authorization.
//!
//! [`Authenticator::begin`] binds the redirect listener, generates the CSRF
//! state and returns the URL to open. [`PendingAuthorization::complete`] waits
//! for exactly one of: a delivered callback, or the timeout. Either way the
//! listener is shut down and joined before the outcome is returned.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{info, warn};

use crate::config::{AuthConfig, FlowKind};
use crate::error::{AuthError, AuthResult, Remedy};
use crate::listener::{CallbackResult, RedirectListener};
use crate::secrets::{SecretKey, SecretStore};
use crate::state::AuthorizationState;
use crate::token::TokenEndpoint;

/// Tokens obtained by a successful authorization.
#[derive(Clone)]
pub struct AuthOutcome {
    pub flow: FlowKind,
    pub access_token: String,
    pub refresh_token: Option<String>,
}

impl std::fmt::Debug for AuthOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthOutcome")
            .field("flow", &self.flow)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish_non_exhaustive()
    }
}

/// Runs authorization attempts and persists their results.
#[derive(Clone)]
pub struct Authenticator {
    config: AuthConfig,
    secrets: Arc<dyn SecretStore>,
    tokens: Arc<dyn TokenEndpoint>,
}

impl Authenticator {
    /// Create an authenticator.
    pub fn new(
        config: AuthConfig,
        secrets: Arc<dyn SecretStore>,
        tokens: Arc<dyn TokenEndpoint>,
    ) -> Self {
        Self {
            config,
            secrets,
            tokens,
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Start an attempt: check credentials, bind the listener, build the URL.
    pub async fn begin(&self, flow: FlowKind) -> AuthResult<PendingAuthorization> {
        let client_id = self
            .secrets
            .get(SecretKey::ClientId)?
            .ok_or_else(|| AuthError::missing(SecretKey::ClientId, Remedy::Setup))?;

        let client_secret = match flow {
            FlowKind::AuthorizationCode => Some(
                self.secrets
                    .get(SecretKey::ClientSecret)?
                    .ok_or_else(|| AuthError::missing(SecretKey::ClientSecret, Remedy::AddSecret))?,
            ),
            FlowKind::ImplicitToken => None,
        };

        let state = AuthorizationState::generate()?;
        let listener = RedirectListener::bind(self.config.callback_port).await?;
        let redirect_uri = self.config.redirect_uri_for(listener.local_addr().port());
        let url = self
            .config
            .authorization_url(&client_id, flow, state.as_str(), &redirect_uri);

        let (sink, receiver) = oneshot::channel();
        let shutdown = CancellationToken::new();
        let path = self.config.route_path();
        let server = tokio::spawn(listener.serve(path, state, sink, shutdown.clone()));

        info!(flow = ?flow, redirect_uri = %redirect_uri, "Authorization attempt started");

        Ok(PendingAuthorization {
            flow,
            url,
            redirect_uri,
            client_id,
            client_secret,
            receiver,
            server,
            timeout: self.config.callback_timeout,
            shutdown_guard: shutdown.clone().drop_guard(),
            shutdown,
            secrets: Arc::clone(&self.secrets),
            tokens: Arc::clone(&self.tokens),
        })
    }

    /// Run a whole attempt, handing the URL to `present` before waiting.
    pub async fn authenticate<F>(&self, flow: FlowKind, present: F) -> AuthResult<AuthOutcome>
    where
        F: FnOnce(&str),
    {
        let pending = self.begin(flow).await?;
        present(pending.url());
        pending.complete().await
    }
}

/// What ended the wait.
enum Waited {
    Callback(CallbackResult),
    ListenerGone,
    TimedOut,
}

/// An attempt whose listener is serving and whose URL awaits the operator.
///
/// Dropping it without calling [`complete`](Self::complete) stops the listener.
pub struct PendingAuthorization {
    flow: FlowKind,
    url: String,
    redirect_uri: String,
    client_id: String,
    client_secret: Option<String>,
    receiver: oneshot::Receiver<CallbackResult>,
    server: JoinHandle<AuthResult<()>>,
    timeout: Duration,
    shutdown: CancellationToken,
    shutdown_guard: DropGuard,
    secrets: Arc<dyn SecretStore>,
    tokens: Arc<dyn TokenEndpoint>,
}

impl std::fmt::Debug for PendingAuthorization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingAuthorization")
            .field("flow", &self.flow)
            .field("redirect_uri", &self.redirect_uri)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl PendingAuthorization {
    /// The URL the operator must open.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The redirect URI registered with this attempt.
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Wait for the callback or the timeout, then persist the result.
    pub async fn complete(self) -> AuthResult<AuthOutcome> {
        let Self {
            flow,
            redirect_uri,
            client_id,
            client_secret,
            mut receiver,
            server,
            timeout,
            shutdown,
            shutdown_guard,
            secrets,
            tokens,
            ..
        } = self;

        let waited = tokio::select! {
            delivered = &mut receiver => match delivered {
                Ok(result) => Waited::Callback(result),
                Err(_) => Waited::ListenerGone,
            },
            _ = tokio::time::sleep(timeout) => Waited::TimedOut,
        };

        shutdown.cancel();
        drop(shutdown_guard);
        let served = server.await;

        let result = match waited {
            Waited::Callback(result) => result,
            Waited::TimedOut => {
                warn!(timeout = ?timeout, "Timed out waiting for authorization callback");
                return Err(AuthError::AuthTimeout(timeout));
            }
            Waited::ListenerGone => {
                return Err(match served {
                    Ok(Err(e)) => e,
                    Ok(Ok(())) => AuthError::Listener("stopped before a callback arrived".into()),
                    Err(e) => AuthError::Listener(e.to_string()),
                });
            }
        };

        if let Ok(Err(e)) = served {
            warn!(error = %e, "Redirect listener reported an error during shutdown");
        }

        match (flow, result) {
            (_, CallbackResult::Denied(reason)) => {
                warn!(reason = %reason, "Authorization denied");
                Err(AuthError::AuthDenied(reason))
            }
            (FlowKind::ImplicitToken, CallbackResult::Token(access_token)) => {
                secrets.set(SecretKey::AccessToken, &access_token)?;
                info!("Access token received and stored");
                Ok(AuthOutcome {
                    flow,
                    access_token,
                    refresh_token: None,
                })
            }
            (FlowKind::AuthorizationCode, CallbackResult::Code(code)) => {
                // Checked in `begin`.
                let client_secret = client_secret.unwrap_or_default();
                let issued = tokens
                    .exchange_code(&client_id, &client_secret, &code, &redirect_uri)
                    .await?;
                secrets.store_tokens(&issued.access_token, issued.refresh_token.as_deref())?;
                info!("Access and refresh tokens received and stored");
                Ok(AuthOutcome {
                    flow,
                    access_token: issued.access_token,
                    refresh_token: issued.refresh_token,
                })
            }
            (FlowKind::ImplicitToken, CallbackResult::Code(_)) => Err(AuthError::AuthDenied(
                "received an authorization code while expecting a token".into(),
            )),
            (FlowKind::AuthorizationCode, CallbackResult::Token(_)) => Err(AuthError::AuthDenied(
                "received a token while expecting an authorization code".into(),
            )),
        }
    }
}
