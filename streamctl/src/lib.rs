//! # streamctl
//!
//! Authorize a command-line tool against Twitch and drive polls through the
//! authorized session.
//!
//! ## Quick Start
//!
//! ```ignore
//! use streamctl::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let app = App::with_keyring(AuthConfig::twitch());
//!     let outcome = app
//!         .run_poll(&request, |poll| println!("Poll {} created", poll.id), async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Crates
//!
//! - [`auth`]: authorization flows, credential storage, session acquisition
//! - [`helix`]: the platform API client
//! - [`polls`]: poll watching and tallying

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod app;
pub mod error;

// ============================================================================
// Crate Re-exports
// ============================================================================

/// Authorization, credential storage and sessions.
pub use streamctl_auth as auth;

/// Platform API client.
pub use streamctl_helix as helix;

/// Poll watching and tallying.
pub use streamctl_polls as polls;

pub use app::{App, PollOutcome, PollRequest};
pub use error::{Result, StreamctlError};

/// Convenient prelude for common imports.
///
/// ```ignore
/// use streamctl::prelude::*;
/// ```
pub mod prelude {
    // App
    pub use crate::{App, PollOutcome, PollRequest, Result, StreamctlError};

    // Auth
    pub use crate::auth::{
        AuthConfig, AuthError, Authenticator, FlowKind, KeyringStore, MemoryStore, Remedy,
        SecretKey, SecretStore, Session, SessionFactory,
    };

    // Helix
    pub use crate::helix::{AnnouncementColor, HelixClient, HelixConfig, HelixError, Poll};

    // Polls
    pub use crate::polls::{PollTally, PollWatcher, WatchConfig, WatchError};
}
