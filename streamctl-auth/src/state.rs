//! Per-attempt CSRF state.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use std::fmt;

use crate::error::AuthError;

/// Bytes of entropy in every generated state.
pub const STATE_BYTES: usize = 32;

/// Random, URL-safe value correlating an authorization request with its callback.
///
/// Generated once per attempt and compared exactly once by the redirect listener.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthorizationState(String);

impl AuthorizationState {
    /// Generate a fresh state from the OS random source.
    pub fn generate() -> Result<Self, AuthError> {
        let mut bytes = [0u8; STATE_BYTES];
        getrandom::getrandom(&mut bytes).map_err(|e| AuthError::Random(e.to_string()))?;
        Ok(Self(URL_SAFE_NO_PAD.encode(bytes)))
    }

    /// The encoded value sent in the authorization URL.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compare against a value received from a callback without early exit.
    pub fn matches(&self, received: &str) -> bool {
        let expected = self.0.as_bytes();
        let received = received.as_bytes();
        if expected.len() != received.len() {
            return false;
        }
        expected
            .iter()
            .zip(received)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

impl From<&str> for AuthorizationState {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Debug for AuthorizationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AuthorizationState").field(&"<redacted>").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_is_url_safe() {
        let state = AuthorizationState::generate().unwrap();
        // 32 bytes, unpadded base64
        assert_eq!(state.as_str().len(), 43);
        assert!(state
            .as_str()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_consecutive_states_differ() {
        let a = AuthorizationState::generate().unwrap();
        let b = AuthorizationState::generate().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_matches() {
        let state = AuthorizationState::from("abc-123");
        assert!(state.matches("abc-123"));
        assert!(!state.matches("abc-124"));
        assert!(!state.matches("abc"));
        assert!(!state.matches(""));
    }
}
