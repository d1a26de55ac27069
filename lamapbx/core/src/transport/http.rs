//! Reqwest Transport
//!
//! Production [`HttpTransport`] backed by a pooled `reqwest::Client`.
//!
//! # Limits
//!
//! - Connect timeout: `connect_timeout_ms`
//! - Per-call timeout: `read_timeout_ms + write_timeout_ms`
//! - Keep-alive: `max_keepalive_connections` idle sockets per host, evicted
//!   after `keepalive_expiry_ms`
//! - Concurrency: at most `max_connections` calls in flight, waiting at most
//!   `pool_timeout_ms` for a slot

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use tokio::sync::Semaphore;
use tracing::debug;

use super::traits::{ChatRequest, HttpTransport, UpstreamResponse};
use crate::config::ClientConfig;
use crate::error::{ApiError, ConfigError};

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout()
        } else if err.is_decode() {
            Self::decode(err.to_string())
        } else {
            Self::transport(err.to_string())
        }
    }
}

/// HTTP transport over `reqwest`
pub struct ReqwestTransport {
    /// Pooled HTTP client with auth headers preset
    client: reqwest::Client,
    /// Slots limiting concurrent connections
    permits: Semaphore,
    /// Maximum wait for a slot
    pool_timeout: Duration,
    /// Set once `close` has run
    closed: AtomicBool,
}

impl ReqwestTransport {
    /// Build a transport from client configuration
    ///
    /// # Errors
    ///
    /// - [`ConfigError::MissingApiKey`] without a credential
    /// - [`ConfigError::InvalidApiKey`] if the key is not a valid header value
    /// - [`ConfigError::HttpClient`] if reqwest fails to initialize
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let mut auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| ConfigError::InvalidApiKey)?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(config.connect_timeout())
            .timeout(config.read_timeout() + config.write_timeout())
            .pool_max_idle_per_host(config.max_keepalive_connections)
            .pool_idle_timeout(config.keepalive_expiry())
            .build()?;

        Ok(Self {
            client,
            permits: Semaphore::new(config.max_connections.max(1)),
            pool_timeout: config.pool_timeout(),
            closed: AtomicBool::new(false),
        })
    }

    /// Whether `close` has run
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Free connection slots
    #[must_use]
    pub fn available_connections(&self) -> usize {
        self.permits.available_permits()
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    fn name(&self) -> &'static str {
        "reqwest"
    }

    async fn send(&self, request: &ChatRequest) -> Result<UpstreamResponse, ApiError> {
        let _permit = match tokio::time::timeout(self.pool_timeout, self.permits.acquire()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(ApiError::transport_closed()),
            Err(_) => return Err(ApiError::timeout()),
        };

        let response = self
            .client
            .post(&request.url)
            .json(&request.payload)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!(status, bytes = body.len(), "lamapbx response received");

        Ok(UpstreamResponse { status, body })
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.permits.close();
            debug!("lamapbx transport closed");
        }
    }
}
