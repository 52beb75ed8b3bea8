//! Helix client configuration.

use std::time::Duration;

/// Production Helix base URL.
pub const HELIX_BASE_URL: &str = "https://api.twitch.tv/helix";

/// Where and how the client talks to Helix.
#[derive(Debug, Clone)]
pub struct HelixConfig {
    /// Base URL without a trailing slash.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for HelixConfig {
    fn default() -> Self {
        Self {
            base_url: HELIX_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl HelixConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Point the client at a different base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub(crate) fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash() {
        let config = HelixConfig::new().with_base_url("http://127.0.0.1:9000/helix/");
        assert_eq!(config.url("polls"), "http://127.0.0.1:9000/helix/polls");
    }

    #[test]
    fn test_default() {
        let config = HelixConfig::default();
        assert_eq!(config.url("users"), "https://api.twitch.tv/helix/users");
        assert_eq!(config.timeout, Duration::from_secs(10));
    }
}
