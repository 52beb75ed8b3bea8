//! Top-level error type.

use streamctl_auth::AuthError;
use streamctl_helix::HelixError;
use streamctl_polls::WatchError;
use thiserror::Error;

/// Any failure of a streamctl operation.
#[derive(Debug, Error)]
pub enum StreamctlError {
    /// Authorization or session acquisition failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// A platform API call failed.
    #[error(transparent)]
    Helix(#[from] HelixError),

    /// Watching a poll failed.
    #[error(transparent)]
    Watch(#[from] WatchError),

    /// Stored credentials could not be read or written.
    #[error(transparent)]
    Secret(#[from] streamctl_auth::SecretError),
}

/// Result type for streamctl operations.
pub type Result<T> = std::result::Result<T, StreamctlError>;
