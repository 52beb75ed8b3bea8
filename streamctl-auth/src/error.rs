//! Authorization and session errors.

use std::time::Duration;
use thiserror::Error;

use crate::secrets::{SecretError, SecretKey};

/// What the operator should run to recover from an authorization failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remedy {
    /// Store a client id (`streamctl setup`).
    Setup,
    /// Run the browser flow again (`streamctl authenticate`).
    Authenticate,
    /// Store a client secret (`streamctl setup --secret`).
    AddSecret,
}

impl std::fmt::Display for Remedy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Setup => write!(f, "run `streamctl setup --client-id <id>`"),
            Self::Authenticate => write!(f, "run `streamctl authenticate`"),
            Self::AddSecret => write!(f, "run `streamctl setup --client-id <id> --secret`"),
        }
    }
}

/// Errors from authorization attempts and session acquisition.
#[derive(Debug, Error)]
pub enum AuthError {
    /// A required credential is not stored.
    #[error("No {key} stored; {remedy}")]
    ConfigMissing { key: SecretKey, remedy: Remedy },

    /// The authorization server returned an error parameter.
    #[error("Authorization denied: {0}; {}", Remedy::Authenticate)]
    AuthDenied(String),

    /// No callback arrived in time.
    #[error("Timed out after {0:?} waiting for the authorization callback; {}", Remedy::Authenticate)]
    AuthTimeout(Duration),

    /// The stored token is invalid and cannot be refreshed.
    #[error("Access token is invalid or expired; {}", Remedy::Authenticate)]
    TokenExpired,

    /// A refresh was attempted and failed.
    #[error("Token refresh failed: {0}; {}", Remedy::Authenticate)]
    RefreshFailed(String),

    /// The identity server answered with a non-success status.
    #[error("Remote call failed with HTTP {status}: {body}")]
    RemoteCallFailed { status: u16, body: String },

    /// The identity server could not be reached.
    #[error("Could not reach the identity server: {0}")]
    Transport(#[from] reqwest::Error),

    /// The secret store failed.
    #[error(transparent)]
    Secret(#[from] SecretError),

    /// The redirect listener could not be started or stopped unexpectedly.
    #[error("Redirect listener error: {0}")]
    Listener(String),

    /// Failed to generate the CSRF state.
    #[error("Failed to generate random state: {0}")]
    Random(String),
}

impl AuthError {
    /// Shorthand for a missing credential.
    pub fn missing(key: SecretKey, remedy: Remedy) -> Self {
        Self::ConfigMissing { key, remedy }
    }

    /// The remediation the operator should run, if one applies.
    pub fn remedy(&self) -> Option<Remedy> {
        match self {
            Self::ConfigMissing { remedy, .. } => Some(*remedy),
            Self::AuthDenied(_)
            | Self::AuthTimeout(_)
            | Self::TokenExpired
            | Self::RefreshFailed(_) => Some(Remedy::Authenticate),
            _ => None,
        }
    }
}

/// Result type for authorization operations.
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_client_id_points_at_setup() {
        let err = AuthError::missing(SecretKey::ClientId, Remedy::Setup);
        assert_eq!(err.remedy(), Some(Remedy::Setup));
        let msg = err.to_string();
        assert!(msg.contains("client-id"));
        assert!(msg.contains("streamctl setup"));
    }

    #[test]
    fn test_expired_points_at_authenticate() {
        let err = AuthError::TokenExpired;
        assert_eq!(err.remedy(), Some(Remedy::Authenticate));
        assert!(err.to_string().contains("streamctl authenticate"));
    }

    #[test]
    fn test_remote_failure_has_no_remedy() {
        let err = AuthError::RemoteCallFailed {
            status: 500,
            body: "oops".into(),
        };
        assert_eq!(err.remedy(), None);
        assert!(err.to_string().contains("HTTP 500"));
    }
}
