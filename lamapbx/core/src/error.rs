//! Error Types
//!
//! Two error families exist in this crate:
//!
//! - [`ConfigError`]: raised while building a client. Fatal, never retried.
//! - [`ApiError`]: the single runtime error surfaced by a chat stream. Every
//!   failure during a request (non-2xx status, transport failure, timeout,
//!   malformed body) is folded into it, and its `retryable` flag is the only
//!   signal an outer retry orchestrator needs.

use std::path::PathBuf;

use thiserror::Error;

/// HTTP statuses worth retrying. Everything else is treated as fatal.
pub const RETRYABLE_STATUS_CODES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Number of characters of an error body kept for diagnostics.
pub const ERROR_BODY_LIMIT: usize = 100;

/// Whether an upstream status code should be retried
#[must_use]
pub fn is_retryable_status(status: u16) -> bool {
    RETRYABLE_STATUS_CODES.contains(&status)
}

/// Shorten an error body for logs and error values.
///
/// Keeps the first [`ERROR_BODY_LIMIT`] characters and appends `...`.
/// An empty body yields `None`.
#[must_use]
pub fn truncate_body(body: &str) -> Option<String> {
    if body.is_empty() {
        return None;
    }
    let mut short: String = body.chars().take(ERROR_BODY_LIMIT).collect();
    short.push_str("...");
    Some(short)
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors raised while loading configuration or constructing a client
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No credential was supplied through config, file or environment
    #[error("lamapbx API key is required (set LAMAPBX_API_KEY)")]
    MissingApiKey,

    /// The API key cannot be sent in an HTTP header
    #[error("lamapbx API key contains characters not allowed in an HTTP header")]
    InvalidApiKey,

    /// The base URL is not an http(s) URL
    #[error("invalid base URL {0:?}: expected http:// or https://")]
    InvalidBaseUrl(String),

    /// A configuration file could not be read
    #[error("failed to read config file {path:?}: {source}")]
    Io {
        /// File that failed to load
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A configuration file is not valid TOML for [`crate::ClientConfig`]
    #[error("failed to parse config file {path:?}: {source}")]
    Parse {
        /// File that failed to parse
        path: PathBuf,
        /// Underlying TOML error
        #[source]
        source: toml::de::Error,
    },

    /// The HTTP client could not be built
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

// =============================================================================
// API Errors
// =============================================================================

/// Structured error for a failed upstream exchange
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ApiError {
    /// Human-readable description
    pub message: String,
    /// HTTP status, when the upstream service answered at all
    pub status: Option<u16>,
    /// Truncated error body (see [`truncate_body`])
    pub body: Option<String>,
    /// Whether an outer orchestrator may retry the request
    pub retryable: bool,
}

impl ApiError {
    /// Create an error with an explicit retry classification
    pub fn new(message: impl Into<String>, retryable: bool) -> Self {
        Self {
            message: message.into(),
            status: None,
            body: None,
            retryable,
        }
    }

    /// Error for a non-success HTTP status
    ///
    /// The body is truncated and the status classified against
    /// [`RETRYABLE_STATUS_CODES`].
    #[must_use]
    pub fn from_status(status: u16, body: &str) -> Self {
        Self {
            message: format!("lamapbx API returned status {status}"),
            status: Some(status),
            body: truncate_body(body),
            retryable: is_retryable_status(status),
        }
    }

    /// Connection or I/O failure while talking to the upstream service
    pub fn transport(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            body: Some(message.clone()),
            message,
            status: None,
            retryable: true,
        }
    }

    /// A connect, read, write or pool timeout expired
    #[must_use]
    pub fn timeout() -> Self {
        Self::new("request to lamapbx API timed out", true)
    }

    /// The success body could not be decoded
    pub fn decode(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            body: Some(message.clone()),
            message: format!("invalid lamapbx API response: {message}"),
            status: None,
            retryable: true,
        }
    }

    /// The owning client was closed before the request could run
    #[must_use]
    pub fn client_closed() -> Self {
        Self::new("lamapbx client is closed", false)
    }

    /// The transport refuses new requests
    #[must_use]
    pub fn transport_closed() -> Self {
        Self::new("lamapbx transport is closed", false)
    }

    /// A stream's background task failed outside the normal error path
    pub fn task_failed(message: impl Into<String>) -> Self {
        Self::new(message, true)
    }

    /// Whether an outer orchestrator may retry the request
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }
}
