//! Client Configuration
//!
//! Settings for a [`crate::ChatClient`]: credential, endpoint, user identity,
//! timeouts and connection-pool limits.
//!
//! # Layering
//!
//! Sources are applied in order, later ones winning:
//!
//! 1. Built-in defaults
//! 2. TOML file (`<config_dir>/lamapbx/config.toml` unless a path is given)
//! 3. Environment variables (`LAMAPBX_*`)
//! 4. Explicit [`ConfigOverrides`] (e.g. CLI flags)
//!
//! # Example file
//!
//! ```toml
//! api_key = "app-..."
//! base_url = "https://api.dify.ai/v1"
//! user = "front-desk"
//! read_timeout_ms = 20000
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default upstream endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.dify.ai/v1";

/// Default logical user identifier
pub const DEFAULT_USER: &str = "livekit-agent";

/// Default model label
pub const DEFAULT_MODEL: &str = "lamapbx";

/// Path of the chat endpoint, relative to the base URL
pub const CHAT_MESSAGES_PATH: &str = "/chat-messages";

/// Where configuration came from (for diagnostics)
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigSource {
    /// Built-in defaults only
    Defaults,
    /// Loaded from a TOML file
    File(PathBuf),
}

/// Configuration for one upstream connection
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Bearer credential for the upstream service
    pub api_key: Option<String>,

    /// Base endpoint, without trailing slash
    pub base_url: String,

    /// Logical user identifier sent with every request
    pub user: String,

    /// Model label reported by the client (not sent upstream)
    pub model: String,

    /// Maximum retries for an outer retry orchestrator
    ///
    /// The client never retries on its own.
    pub max_retries: u32,

    /// TCP/TLS connect timeout in milliseconds
    pub connect_timeout_ms: u64,

    /// Response read timeout in milliseconds
    pub read_timeout_ms: u64,

    /// Request write timeout in milliseconds
    pub write_timeout_ms: u64,

    /// Maximum wait for a free pooled connection in milliseconds
    pub pool_timeout_ms: u64,

    /// Upper bound on concurrent connections
    pub max_connections: usize,

    /// Idle connections kept alive per host
    pub max_keepalive_connections: usize,

    /// How long an idle connection stays in the pool, in milliseconds
    pub keepalive_expiry_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            user: DEFAULT_USER.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_retries: 3,
            connect_timeout_ms: 15_000,
            read_timeout_ms: 30_000,
            write_timeout_ms: 15_000,
            pool_timeout_ms: 5_000,
            max_connections: 10,
            max_keepalive_connections: 5,
            keepalive_expiry_ms: 30_000,
        }
    }
}

// The credential never reaches logs.
impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("user", &self.user)
            .field("model", &self.model)
            .field("max_retries", &self.max_retries)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("read_timeout_ms", &self.read_timeout_ms)
            .field("write_timeout_ms", &self.write_timeout_ms)
            .field("pool_timeout_ms", &self.pool_timeout_ms)
            .field("max_connections", &self.max_connections)
            .field("max_keepalive_connections", &self.max_keepalive_connections)
            .field("keepalive_expiry_ms", &self.keepalive_expiry_ms)
            .finish()
    }
}

impl ClientConfig {
    /// Create a configuration with the given credential and defaults elsewhere
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Default::default()
        }
    }

    /// Defaults overlaid with `LAMAPBX_*` environment variables
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Parse a TOML document
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the document is not valid.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })
    }

    /// Apply environment variables through a lookup function
    ///
    /// Environment variables:
    /// - `LAMAPBX_API_KEY` (or legacy `lamapbx_API_KEY`): credential
    /// - `LAMAPBX_BASE_URL`: base endpoint
    /// - `LAMAPBX_USER`: logical user identifier
    /// - `LAMAPBX_MODEL`: model label
    /// - `LAMAPBX_MAX_RETRIES`: retry budget for outer orchestration
    /// - `LAMAPBX_CONNECT_TIMEOUT`, `LAMAPBX_READ_TIMEOUT`,
    ///   `LAMAPBX_WRITE_TIMEOUT`, `LAMAPBX_POOL_TIMEOUT`: timeouts in ms
    ///
    /// Unparseable numbers are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("LAMAPBX_API_KEY").or_else(|| non_empty("lamapbx_API_KEY")) {
            self.api_key = Some(key);
        }
        if let Some(url) = non_empty("LAMAPBX_BASE_URL") {
            self.base_url = url;
        }
        if let Some(user) = non_empty("LAMAPBX_USER") {
            self.user = user;
        }
        if let Some(model) = non_empty("LAMAPBX_MODEL") {
            self.model = model;
        }
        if let Some(v) = non_empty("LAMAPBX_MAX_RETRIES").and_then(|v| v.parse().ok()) {
            self.max_retries = v;
        }
        if let Some(v) = non_empty("LAMAPBX_CONNECT_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.connect_timeout_ms = v;
        }
        if let Some(v) = non_empty("LAMAPBX_READ_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.read_timeout_ms = v;
        }
        if let Some(v) = non_empty("LAMAPBX_WRITE_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.write_timeout_ms = v;
        }
        if let Some(v) = non_empty("LAMAPBX_POOL_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.pool_timeout_ms = v;
        }
    }

    /// Apply explicit overrides
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref key) = overrides.api_key {
            self.api_key = Some(key.clone());
        }
        if let Some(ref url) = overrides.base_url {
            self.base_url.clone_from(url);
        }
        if let Some(ref user) = overrides.user {
            self.user.clone_from(user);
        }
        if let Some(retries) = overrides.max_retries {
            self.max_retries = retries;
        }
        if let Some(ms) = overrides.read_timeout_ms {
            self.read_timeout_ms = ms;
        }
    }

    /// Check that the configuration can drive a client
    ///
    /// # Errors
    ///
    /// - [`ConfigError::MissingApiKey`] when no non-empty credential is set
    /// - [`ConfigError::InvalidBaseUrl`] when the base URL is not http(s)
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => {}
            _ => return Err(ConfigError::MissingApiKey),
        }
        let url = self.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl(self.base_url.clone()));
        }
        Ok(())
    }

    /// Base URL with any trailing slashes removed
    #[must_use]
    pub fn normalized_base_url(&self) -> &str {
        self.base_url.trim().trim_end_matches('/')
    }

    /// Full URL of the chat endpoint
    #[must_use]
    pub fn chat_url(&self) -> String {
        format!("{}{CHAT_MESSAGES_PATH}", self.normalized_base_url())
    }

    /// Set the base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the logical user identifier
    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Set the read timeout
    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the connect timeout
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the write timeout
    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the outer retry budget
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Connect timeout
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Read timeout
    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Write timeout
    #[must_use]
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Pool acquisition timeout
    #[must_use]
    pub fn pool_timeout(&self) -> Duration {
        Duration::from_millis(self.pool_timeout_ms)
    }

    /// Keep-alive expiry for idle connections
    #[must_use]
    pub fn keepalive_expiry(&self) -> Duration {
        Duration::from_millis(self.keepalive_expiry_ms)
    }
}

/// Explicit overrides applied after file and environment
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Credential override
    pub api_key: Option<String>,
    /// Base URL override
    pub base_url: Option<String>,
    /// User identifier override
    pub user: Option<String>,
    /// Retry budget override
    pub max_retries: Option<u32>,
    /// Read timeout override in milliseconds
    pub read_timeout_ms: Option<u64>,
}

/// Default configuration file path
///
/// `<config_dir>/lamapbx/config.toml`, e.g. `~/.config/lamapbx/config.toml`.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("lamapbx").join("config.toml"))
}

/// Load configuration from a specific TOML file
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read and
/// [`ConfigError::Parse`] if it is not valid.
pub fn load_config_from_path(path: &Path) -> Result<ClientConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load configuration from all sources
///
/// Reads `path` if given, otherwise the default path when that file exists,
/// then applies the environment and `overrides`. The result is validated.
///
/// # Errors
///
/// Propagates file errors and [`ClientConfig::validate`] failures.
pub fn load_config(
    path: Option<&Path>,
    overrides: &ConfigOverrides,
) -> Result<(ClientConfig, ConfigSource), ConfigError> {
    load_config_with_env(path, overrides, |key| std::env::var(key).ok())
}

/// [`load_config`] with an explicit environment lookup
///
/// # Errors
///
/// Same as [`load_config`].
pub fn load_config_with_env<F>(
    path: Option<&Path>,
    overrides: &ConfigOverrides,
    lookup: F,
) -> Result<(ClientConfig, ConfigSource), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let (mut config, source) = match path {
        Some(path) => (load_config_from_path(path)?, ConfigSource::File(path.to_path_buf())),
        None => match default_config_path().filter(|p| p.exists()) {
            Some(path) => (load_config_from_path(&path)?, ConfigSource::File(path)),
            None => (ClientConfig::default(), ConfigSource::Defaults),
        },
    };

    config.apply_env(lookup);
    config.apply_overrides(overrides);
    config.validate()?;

    tracing::debug!(?source, base_url = %config.base_url, user = %config.user, "Configuration loaded");
    Ok((config, source))
}
