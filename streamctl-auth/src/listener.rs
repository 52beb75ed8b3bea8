//! Local HTTP listener for the authorization redirect.
//!
//! Implicit-grant responses arrive in the URL fragment, which browsers never
//! send to a server. The first request therefore usually carries no
//! parameters; it is answered with a small page that re-submits the fragment
//! as a query string to the same path. The second request is then checked
//! against the expected state and, when it matches, delivered once.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{AuthError, AuthResult};
use crate::state::AuthorizationState;

const RESUBMIT_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<title>Authorization Redirect</title>
<script type="text/javascript">
window.onload = function() {
    const fragment = window.location.hash.substring(1);
    if (fragment.length === 0) {
        document.getElementById("status").textContent = "No authorization response found. You may close this tab.";
        return;
    }
    const params = new URLSearchParams(fragment);
    const query = Array.from(params.entries())
        .map(([key, value]) => `${encodeURIComponent(key)}=${encodeURIComponent(value)}`)
        .join('&');
    window.location.replace(`${window.location.pathname}?${query}`);
};
</script>
</head>
<body>
<h1 id="status">Processing authorization callback...</h1>
</body>
</html>"#;

const RECEIVED_TEXT: &str = "Callback received successfully.\nYou may close this tab or window.\n";

/// Payload decoded from a state-matching callback.
#[derive(Clone, PartialEq, Eq)]
pub enum CallbackResult {
    /// Implicit grant: the access token itself.
    Token(String),
    /// Authorization code grant: the code to exchange.
    Code(String),
    /// The authorization server reported an error.
    Denied(String),
}

impl std::fmt::Debug for CallbackResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Token(_) => f.write_str("Token(<redacted>)"),
            Self::Code(_) => f.write_str("Code(<redacted>)"),
            Self::Denied(reason) => f.debug_tuple("Denied").field(reason).finish(),
        }
    }
}

impl CallbackResult {
    /// Decode the parameters of a state-matching request.
    ///
    /// Returns `None` when neither an error, a token nor a code is present.
    pub fn from_params(params: &HashMap<String, String>) -> Option<Self> {
        let non_empty = |key: &str| params.get(key).filter(|v| !v.is_empty());

        if let Some(error) = non_empty("error") {
            let description = params
                .get("error_description")
                .map(String::as_str)
                .unwrap_or_default();
            return Some(Self::Denied(format!("{}: {}", error, description)));
        }
        if let Some(token) = non_empty("access_token") {
            return Some(Self::Token(token.clone()));
        }
        non_empty("code").map(|code| Self::Code(code.clone()))
    }
}

/// One-shot delivery slot shared by all requests of one listener.
type Sink = Arc<Mutex<Option<oneshot::Sender<CallbackResult>>>>;

struct ListenerState {
    expected: AuthorizationState,
    sink: Sink,
}

/// Build the router serving the redirect path.
///
/// At most one [`CallbackResult`] is ever sent on `sink`.
pub fn router(
    path: &str,
    expected: AuthorizationState,
    sink: oneshot::Sender<CallbackResult>,
) -> Router {
    let state = Arc::new(ListenerState {
        expected,
        sink: Arc::new(Mutex::new(Some(sink))),
    });

    Router::new()
        .route(path, get(handle_redirect))
        .with_state(state)
}

/// GET <redirect path> - Receive the authorization callback
async fn handle_redirect(
    State(state): State<Arc<ListenerState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if params.is_empty() {
        debug!("Serving fragment re-submission page");
        return Html(RESUBMIT_HTML).into_response();
    }

    let received = params.get("state").map(String::as_str).unwrap_or_default();
    if !state.expected.matches(received) {
        warn!("Rejected callback with mismatched state");
        return (StatusCode::FORBIDDEN, format!("Invalid state {}\n", received)).into_response();
    }

    let Some(result) = CallbackResult::from_params(&params) else {
        return (
            StatusCode::BAD_REQUEST,
            "Callback carried no token, code or error\n",
        )
            .into_response();
    };

    match state.sink.lock().take() {
        Some(sender) => {
            info!(result = ?result, "Authorization callback received");
            // The receiver only disappears once the attempt has already ended.
            let _ = sender.send(result);
        }
        None => debug!("Callback already delivered, ignoring repeat"),
    }

    (StatusCode::OK, RECEIVED_TEXT).into_response()
}

/// A bound, not yet serving, redirect listener.
///
/// `localhost` may resolve to either loopback, so the port is bound on
/// `127.0.0.1` and, where IPv6 is available, on `::1` as well.
#[derive(Debug)]
pub struct RedirectListener {
    listeners: Vec<TcpListener>,
    local_addrs: Vec<SocketAddr>,
}

impl RedirectListener {
    /// Bind to the loopback interfaces on the given port (0 picks a free one).
    pub async fn bind(port: u16) -> AuthResult<Self> {
        let v4 = TcpListener::bind((Ipv4Addr::LOCALHOST, port)).await.map_err(|e| {
            AuthError::Listener(format!(
                "failed to bind 127.0.0.1:{}: {}. Is another authorization running, or pass a different --callback-port",
                port, e
            ))
        })?;
        let v4_addr = v4
            .local_addr()
            .map_err(|e| AuthError::Listener(e.to_string()))?;

        let mut listeners = vec![v4];
        let mut local_addrs = vec![v4_addr];
        match TcpListener::bind((Ipv6Addr::LOCALHOST, v4_addr.port())).await {
            Ok(v6) => {
                let v6_addr = v6
                    .local_addr()
                    .map_err(|e| AuthError::Listener(e.to_string()))?;
                listeners.push(v6);
                local_addrs.push(v6_addr);
            }
            Err(e) => debug!(error = %e, "IPv6 loopback unavailable, serving 127.0.0.1 only"),
        }

        debug!(addrs = ?local_addrs, "Redirect listener bound");
        Ok(Self {
            listeners,
            local_addrs,
        })
    }

    /// The IPv4 loopback address actually bound.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addrs[0]
    }

    /// Every address bound, IPv4 first.
    pub fn local_addrs(&self) -> &[SocketAddr] {
        &self.local_addrs
    }

    /// Serve until `shutdown` is cancelled.
    ///
    /// The socket is closed when this returns.
    pub async fn serve(
        self,
        path: impl Into<String>,
        expected: AuthorizationState,
        sink: oneshot::Sender<CallbackResult>,
        shutdown: CancellationToken,
    ) -> AuthResult<()> {
        let path: String = path.into();
        let app = router(&path, expected, sink);
        let addrs = self.local_addrs;

        let mut servers = JoinSet::new();
        for listener in self.listeners {
            let app = app.clone();
            let shutdown = shutdown.clone();
            servers.spawn(async move {
                axum::serve(listener, app)
                    .with_graceful_shutdown(shutdown.cancelled_owned())
                    .await
            });
        }
        drop(app);

        while let Some(joined) = servers.join_next().await {
            joined
                .map_err(|e| AuthError::Listener(e.to_string()))?
                .map_err(|e| AuthError::Listener(e.to_string()))?;
        }

        debug!(addrs = ?addrs, "Redirect listener stopped");
        Ok(())
    }
}
