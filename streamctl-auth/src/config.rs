//! Authorization configuration.

use std::time::Duration;

/// Scopes requested from the platform for every authorization attempt.
pub const DEFAULT_SCOPES: &[&str] = &["channel:manage:polls", "moderator:manage:announcements"];

/// Default local port the redirect listener binds to.
pub const DEFAULT_CALLBACK_PORT: u16 = 3024;

/// Which OAuth2 grant an authorization attempt uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowKind {
    /// Implicit grant. The access token arrives in the URL fragment.
    ImplicitToken,
    /// Authorization code grant. Requires a stored client secret.
    AuthorizationCode,
}

impl FlowKind {
    /// The `response_type` value sent to the authorization server.
    pub fn response_type(&self) -> &'static str {
        match self {
            Self::ImplicitToken => "token",
            Self::AuthorizationCode => "code",
        }
    }

    /// Pick the flow from whether a client secret is available.
    pub fn for_secret(has_secret: bool) -> Self {
        if has_secret {
            Self::AuthorizationCode
        } else {
            Self::ImplicitToken
        }
    }
}

/// Configuration for authorizing against the platform.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Authorization endpoint URL
    pub auth_url: String,
    /// Token endpoint URL (code exchange and refresh)
    pub token_url: String,
    /// Token validation endpoint URL
    pub validate_url: String,
    /// Requested scopes
    pub scopes: Vec<String>,
    /// Redirect URI host (e.g., "http://localhost")
    pub redirect_host: String,
    /// Redirect URI path (e.g., "redirect")
    pub redirect_path: String,
    /// Fixed local port for the redirect listener
    pub callback_port: u16,
    /// How long to wait for the browser callback
    pub callback_timeout: Duration,
    /// Tokens with less lifetime than this are refreshed proactively
    pub refresh_window: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::twitch()
    }
}

impl AuthConfig {
    /// Create a configuration with explicit endpoints and default behavior.
    pub fn new(
        auth_url: impl Into<String>,
        token_url: impl Into<String>,
        validate_url: impl Into<String>,
    ) -> Self {
        Self {
            auth_url: auth_url.into(),
            token_url: token_url.into(),
            validate_url: validate_url.into(),
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            redirect_host: "http://localhost".to_string(),
            redirect_path: "redirect".to_string(),
            callback_port: DEFAULT_CALLBACK_PORT,
            callback_timeout: Duration::from_secs(5 * 60),
            refresh_window: Duration::from_secs(330),
        }
    }

    /// Twitch identity endpoints.
    pub fn twitch() -> Self {
        Self::new(
            "https://id.twitch.tv/oauth2/authorize",
            "https://id.twitch.tv/oauth2/token",
            "https://id.twitch.tv/oauth2/validate",
        )
    }

    /// Set the redirect listener port.
    #[must_use]
    pub fn with_callback_port(mut self, port: u16) -> Self {
        self.callback_port = port;
        self
    }

    /// Set the callback timeout.
    #[must_use]
    pub fn with_callback_timeout(mut self, timeout: Duration) -> Self {
        self.callback_timeout = timeout;
        self
    }

    /// Set the proactive refresh window.
    #[must_use]
    pub fn with_refresh_window(mut self, window: Duration) -> Self {
        self.refresh_window = window;
        self
    }

    /// Replace the requested scopes.
    #[must_use]
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Build the redirect URI for the configured port.
    pub fn redirect_uri(&self) -> String {
        self.redirect_uri_for(self.callback_port)
    }

    /// Build the redirect URI for a given port.
    pub fn redirect_uri_for(&self, port: u16) -> String {
        let host = self.redirect_host.trim_end_matches('/');
        format!("{}:{}{}", host, port, self.route_path())
    }

    /// Path the redirect listener serves, always with a leading slash.
    pub fn route_path(&self) -> String {
        format!("/{}", self.redirect_path.trim_start_matches('/'))
    }

    /// Build the URL the operator opens in a browser.
    pub fn authorization_url(
        &self,
        client_id: &str,
        flow: FlowKind,
        state: &str,
        redirect_uri: &str,
    ) -> String {
        let scope = self.scopes.join(" ");
        let params = [
            ("response_type", flow.response_type()),
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
            ("scope", scope.as_str()),
            ("state", state),
        ];

        let query = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        format!("{}?{}", self.auth_url, query)
    }
}
