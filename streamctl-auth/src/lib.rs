//! # streamctl-auth
//!
//! OAuth2 authorization for streamctl.
//!
//! ## Core Concepts
//!
//! - **[`Authenticator`]**: Runs one browser-based authorization attempt
//!   (implicit grant or authorization code grant) against a local redirect
//!   listener and persists the resulting tokens.
//! - **[`SessionFactory`]**: Turns stored credentials into a validated
//!   [`Session`], refreshing the access token when needed.
//! - **[`SecretStore`]**: Where credentials live. [`KeyringStore`] uses the OS
//!   keychain, [`MemoryStore`] keeps them in memory.
//! - **[`TokenEndpoint`]**: Code exchange, refresh and validation against the
//!   identity server.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use streamctl_auth::{AuthConfig, Authenticator, FlowKind, HttpTokenEndpoint, KeyringStore};
//!
//! let config = AuthConfig::twitch();
//! let secrets = Arc::new(KeyringStore::default());
//! let tokens = Arc::new(HttpTokenEndpoint::new(&config));
//!
//! let auth = Authenticator::new(config, secrets, tokens);
//! auth.authenticate(FlowKind::ImplicitToken, |url| println!("Open {url}")).await?;
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod flow;
pub mod listener;
pub mod secrets;
pub mod session;
pub mod state;
pub mod token;

pub use config::{AuthConfig, FlowKind, DEFAULT_CALLBACK_PORT, DEFAULT_SCOPES};
pub use error::{AuthError, AuthResult, Remedy};
pub use flow::{AuthOutcome, Authenticator, PendingAuthorization};
pub use listener::{CallbackResult, RedirectListener};
pub use secrets::{
    Credentials, KeyringStore, MemoryStore, SecretError, SecretKey, SecretStore, KEYRING_SERVICE,
};
pub use session::{Session, SessionFactory};
pub use state::AuthorizationState;
pub use token::{HttpTokenEndpoint, TokenEndpoint, TokenInfo, TokenResponse};
