//! Configuration management for text2data.
//!
//! Handles loading configuration from a TOML file and resolving the remote
//! service credentials from flags, environment, keyring, and file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};
use crate::remote::RemoteConfig;
use crate::secrets::Secret;

/// Environment variable overriding `[remote].base_url`.
pub const BASE_URL_ENV: &str = "TEXT2DATA_BASE_URL";

/// Environment variable overriding `[remote].access_token`.
pub const ACCESS_TOKEN_ENV: &str = "TEXT2DATA_ACCESS_TOKEN";

const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Remote analytics service.
    #[serde(default)]
    pub remote: RemoteSection,

    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

/// Remote service settings from the config file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RemoteSection {
    pub base_url: Option<String>,

    /// Access token (prefer the keyring or environment).
    pub access_token: Option<String>,
}

/// Timeouts in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_timeout")]
    pub connect_secs: u64,

    #[serde(default = "default_timeout")]
    pub query_secs: u64,

    #[serde(default = "default_timeout")]
    pub request_secs: u64,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: DEFAULT_TIMEOUT_SECS,
            query_secs: DEFAULT_TIMEOUT_SECS,
            request_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn query(&self) -> Duration {
        Duration::from_secs(self.query_secs)
    }

    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("connect_secs", self.connect_secs),
            ("query_secs", self.query_secs),
            ("request_secs", self.request_secs),
        ] {
            if value == 0 {
                return Err(BridgeError::config(format!(
                    "timeouts.{name} must be greater than zero"
                )));
            }
        }
        Ok(())
    }
}

/// Remote credentials given on the command line.
#[derive(Debug, Clone, Default)]
pub struct RemoteOverrides {
    pub base_url: Option<String>,
    pub access_token: Option<String>,
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("text2data")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file. A missing file yields defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| BridgeError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| {
            BridgeError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })?;
        config.timeouts.validate()?;
        Ok(config)
    }

    /// Resolves the remote service settings.
    ///
    /// Precedence: flags, then environment, then the stored token (token
    /// only), then the config file. Either field may come back empty; the
    /// caller decides whether that is fatal.
    pub fn resolve_remote(
        &self,
        overrides: &RemoteOverrides,
        env: impl Fn(&str) -> Option<String>,
        stored_token: impl FnOnce(&str) -> Option<Secret>,
    ) -> RemoteConfig {
        let non_blank = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        let base_url = non_blank(overrides.base_url.clone())
            .or_else(|| non_blank(env(BASE_URL_ENV)))
            .or_else(|| non_blank(self.remote.base_url.clone()))
            .unwrap_or_default();

        let access_token = non_blank(overrides.access_token.clone())
            .or_else(|| non_blank(env(ACCESS_TOKEN_ENV)))
            .map(Secret::new)
            .or_else(|| {
                if base_url.is_empty() {
                    None
                } else {
                    stored_token(&base_url).filter(|t| !t.is_empty())
                }
            })
            .or_else(|| non_blank(self.remote.access_token.clone()).map(Secret::new))
            .unwrap_or_default();

        RemoteConfig::new(base_url.trim(), access_token).with_timeout(self.timeouts.request())
    }
}
