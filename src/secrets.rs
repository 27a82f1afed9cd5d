//! Secret handling.
//!
//! [`Secret`] keeps passwords and tokens out of Debug/Display output.
//! [`TokenStore`] keeps the remote access token in the OS keyring, keyed by
//! base URL, so it does not have to live in the config file.

use std::fmt;

use keyring::Entry;
use tracing::warn;

use crate::error::{BridgeError, Result};

const SERVICE_NAME: &str = "text2data";

/// A string that never shows up in Debug or Display output.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the secret value. Only drivers and HTTP headers should need this.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Stores the remote access token in the OS keyring.
#[derive(Debug, Clone, Default)]
pub struct TokenStore;

impl TokenStore {
    pub fn new() -> Self {
        Self
    }

    /// Stores `token` for `base_url`.
    pub fn store(&self, base_url: &str, token: &Secret) -> Result<()> {
        let entry = Self::entry(base_url)?;
        entry
            .set_password(token.expose())
            .map_err(|e| BridgeError::config(format!("Failed to store access token: {e}")))
    }

    /// Retrieves the token for `base_url`.
    ///
    /// A missing entry or an unavailable keyring both yield `None`.
    pub fn retrieve(&self, base_url: &str) -> Option<Secret> {
        let entry = match Self::entry(base_url) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("{e}");
                return None;
            }
        };

        match entry.get_password() {
            Ok(token) => Some(Secret::new(token)),
            Err(keyring::Error::NoEntry) => None,
            Err(e) => {
                warn!("Failed to read access token from keyring: {e}");
                None
            }
        }
    }

    /// Deletes the token for `base_url`. Deleting a missing entry is not an error.
    pub fn delete(&self, base_url: &str) -> Result<()> {
        let entry = Self::entry(base_url)?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(BridgeError::config(format!(
                "Failed to delete access token: {e}"
            ))),
        }
    }

    fn entry(base_url: &str) -> Result<Entry> {
        Entry::new(SERVICE_NAME, &Self::token_key(base_url))
            .map_err(|e| BridgeError::config(format!("Failed to access keyring: {e}")))
    }

    /// Generates the keyring key for a base URL's access token.
    pub fn token_key(base_url: &str) -> String {
        format!("token:{}", base_url.trim().trim_end_matches('/'))
    }
}

/// Masks a secret for display, showing only the last 4 characters.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 4 {
        "*".repeat(chars.len())
    } else {
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("****...{tail}")
    }
}
