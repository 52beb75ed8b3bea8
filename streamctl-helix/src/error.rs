//! Platform API errors.

use thiserror::Error;

/// Errors from Helix API calls.
#[derive(Debug, Error)]
pub enum HelixError {
    /// The API answered with a non-success status.
    #[error("Helix returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// The API could not be reached or the response could not be read.
    #[error("Could not reach the Helix API: {0}")]
    Transport(#[from] reqwest::Error),

    /// No poll with this id exists (yet).
    #[error("Poll {0} not found")]
    PollNotFound(String),

    /// No user with this login exists.
    #[error("User {0} not found")]
    UserNotFound(String),

    /// The request was rejected before being sent.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A successful response carried no data.
    #[error("Helix returned no data for {0}")]
    EmptyResponse(&'static str),
}

impl HelixError {
    /// Whether the failure happened before any HTTP status was received.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Result type for Helix calls.
pub type HelixResult<T> = Result<T, HelixError>;
