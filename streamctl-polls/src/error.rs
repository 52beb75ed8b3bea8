//! Watch errors.

use streamctl_helix::HelixError;
use thiserror::Error;

/// Terminal failures of a poll watch.
#[derive(Debug, Error)]
pub enum WatchError {
    /// Too many consecutive poll fetches failed.
    #[error("Gave up after {failures} consecutive failed poll fetches: {source}")]
    WatchAborted {
        /// Consecutive failures observed, including the last one.
        failures: u32,
        /// The last fetch error.
        source: HelixError,
    },

    /// The polling task ended without reporting a result.
    #[error("Poll watcher stopped without a result")]
    WatcherStopped,
}

impl WatchError {
    /// Whether the watch ended because the API could not be reached at all.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::WatchAborted { source, .. } if source.is_transport())
    }
}

/// Result type for watches.
pub type WatchResult<T> = Result<T, WatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aborted_message_keeps_status() {
        let err = WatchError::WatchAborted {
            failures: 3,
            source: HelixError::Status {
                status: 503,
                body: "unavailable".into(),
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("3 consecutive"));
        assert!(msg.contains("HTTP 503"));
        assert!(!err.is_unreachable());
    }
}
