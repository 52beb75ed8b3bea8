//! Credential persistence.
//!
//! The [`SecretStore`] trait is the only persistence the authorization code
//! relies on. [`KeyringStore`] keeps secrets in the OS keychain and
//! [`MemoryStore`] keeps them in process memory.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Keychain service name all secrets are filed under.
pub const KEYRING_SERVICE: &str = "streamctl";

/// Keys the secret store understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecretKey {
    ClientId,
    ClientSecret,
    AccessToken,
    RefreshToken,
}

impl SecretKey {
    /// All keys, in setup order.
    pub const ALL: [SecretKey; 4] = [
        Self::ClientId,
        Self::ClientSecret,
        Self::AccessToken,
        Self::RefreshToken,
    ];

    /// The label the value is stored under.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClientId => "client-id",
            Self::ClientSecret => "client-secret",
            Self::AccessToken => "access-token",
            Self::RefreshToken => "refresh-token",
        }
    }
}

impl fmt::Display for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from the secret backend.
#[derive(Debug, Error)]
pub enum SecretError {
    /// The backend refused to read a key.
    #[error("Failed to read {key} from the secret store: {message}")]
    Read { key: SecretKey, message: String },

    /// The backend refused to write a key.
    #[error("Failed to write {key} to the secret store: {message}")]
    Write { key: SecretKey, message: String },
}

/// Opaque key/value persistence for credentials.
///
/// An empty stored value is reported as absent.
pub trait SecretStore: Send + Sync {
    /// Read a value, `None` if it was never stored.
    fn get(&self, key: SecretKey) -> Result<Option<String>, SecretError>;

    /// Store a value, replacing any previous one.
    fn set(&self, key: SecretKey, value: &str) -> Result<(), SecretError>;

    /// Persist a freshly issued token pair.
    ///
    /// The refresh token is written first so a half-finished write never
    /// leaves a new access token paired with a stale refresh token.
    fn store_tokens(&self, access_token: &str, refresh_token: Option<&str>) -> Result<(), SecretError> {
        if let Some(refresh) = refresh_token {
            self.set(SecretKey::RefreshToken, refresh)?;
        }
        self.set(SecretKey::AccessToken, access_token)
    }
}

/// Secrets kept in the operating system keychain.
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new(KEYRING_SERVICE)
    }
}

impl KeyringStore {
    /// Create a store filing entries under the given service name.
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: SecretKey) -> Result<keyring::Entry, keyring::Error> {
        keyring::Entry::new(&self.service, key.as_str())
    }
}

impl SecretStore for KeyringStore {
    fn get(&self, key: SecretKey) -> Result<Option<String>, SecretError> {
        let read = self.entry(key).and_then(|entry| entry.get_password());
        match read {
            Ok(value) if value.is_empty() => Ok(None),
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => {
                debug!(key = %key, "No keychain entry");
                Ok(None)
            }
            Err(e) => Err(SecretError::Read {
                key,
                message: e.to_string(),
            }),
        }
    }

    fn set(&self, key: SecretKey, value: &str) -> Result<(), SecretError> {
        self.entry(key)
            .and_then(|entry| entry.set_password(value))
            .map_err(|e| SecretError::Write {
                key,
                message: e.to_string(),
            })?;
        debug!(key = %key, "Stored keychain entry");
        Ok(())
    }
}

/// Secrets kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<SecretKey, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, handy for seeding.
    #[must_use]
    pub fn with(self, key: SecretKey, value: impl Into<String>) -> Self {
        self.values.write().insert(key, value.into());
        self
    }
}

impl SecretStore for MemoryStore {
    fn get(&self, key: SecretKey) -> Result<Option<String>, SecretError> {
        Ok(self
            .values
            .read()
            .get(&key)
            .filter(|v| !v.is_empty())
            .cloned())
    }

    fn set(&self, key: SecretKey, value: &str) -> Result<(), SecretError> {
        self.values.write().insert(key, value.to_string());
        Ok(())
    }
}

/// Snapshot of every stored credential.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl Credentials {
    /// Read all keys from a store.
    pub fn load(store: &dyn SecretStore) -> Result<Self, SecretError> {
        Ok(Self {
            client_id: store.get(SecretKey::ClientId)?,
            client_secret: store.get(SecretKey::ClientSecret)?,
            access_token: store.get(SecretKey::AccessToken)?,
            refresh_token: store.get(SecretKey::RefreshToken)?,
        })
    }

    /// The client secret and refresh token, when both are stored.
    pub fn refresh_pair(&self) -> Option<(&str, &str)> {
        Some((self.client_secret.as_deref()?, self.refresh_token.as_deref()?))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &redact(&self.refresh_token))
            .finish()
    }
}
