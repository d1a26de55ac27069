//! Transport Traits and Wire Types
//!
//! The client never talks to the network directly. It prepares a
//! [`ChatRequest`] and hands it to an [`HttpTransport`], which returns the raw
//! status and body. Classification and decoding stay in the stream so every
//! transport behaves the same way.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::event::{ChatChunk, CompletionUsage};

/// How the upstream service should deliver its answer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    /// One complete response per request
    #[default]
    Blocking,
    /// Server-sent incremental chunks (not used by this client)
    Streaming,
}

/// JSON body of a `POST /chat-messages` call
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessagesPayload {
    /// App input variables (always empty)
    pub inputs: serde_json::Map<String, serde_json::Value>,
    /// The user's query text
    pub query: String,
    /// Delivery mode
    pub response_mode: ResponseMode,
    /// Continuity token, empty on the first turn
    pub conversation_id: String,
    /// Logical user identifier
    pub user: String,
}

/// A prepared but unsent upstream request
#[derive(Clone, Debug, PartialEq)]
pub struct ChatRequest {
    /// Absolute endpoint URL
    pub url: String,
    /// Request body
    pub payload: ChatMessagesPayload,
}

impl ChatRequest {
    /// Blocking-mode request with empty inputs
    pub fn blocking(
        url: impl Into<String>,
        query: impl Into<String>,
        conversation_id: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            payload: ChatMessagesPayload {
                inputs: serde_json::Map::new(),
                query: query.into(),
                response_mode: ResponseMode::Blocking,
                conversation_id: conversation_id.into(),
                user: user.into(),
            },
        }
    }

    /// The query text
    #[must_use]
    pub fn query(&self) -> &str {
        &self.payload.query
    }

    /// The continuity token attached to this request
    #[must_use]
    pub fn conversation_id(&self) -> &str {
        &self.payload.conversation_id
    }
}

/// Usage block nested under `metadata`
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ResponseMetadata {
    /// Token counters, when reported
    #[serde(default)]
    pub usage: Option<CompletionUsage>,
}

/// Success body of a blocking `chat-messages` call
///
/// Every field is optional; absent counters read as zero.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ChatMessagesResponse {
    /// Answer text
    #[serde(default)]
    pub answer: Option<String>,
    /// Continuity token assigned by the service
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// Response metadata
    #[serde(default)]
    pub metadata: Option<ResponseMetadata>,
}

impl ChatMessagesResponse {
    /// Usage counters, zero when absent
    #[must_use]
    pub fn usage(&self) -> CompletionUsage {
        self.metadata
            .as_ref()
            .and_then(|m| m.usage)
            .unwrap_or_default()
    }

    /// Convert into the stream's result event
    #[must_use]
    pub fn into_chunk(self) -> ChatChunk {
        let usage = self.usage();
        ChatChunk::assistant(self.answer.unwrap_or_default(), usage)
    }
}

/// Raw upstream reply
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpstreamResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body as text
    pub body: String,
}

impl UpstreamResponse {
    /// Create a response
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the call succeeded
    ///
    /// Only `200` carries an answer body; any other status, 2xx included,
    /// goes through error classification.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// Pluggable async HTTP client
///
/// Implementations send the request and read the whole body. Failures to
/// obtain a response at all (connect errors, timeouts) are reported as
/// [`ApiError`]s; every status is returned as an ordinary response.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Transport name for diagnostics
    fn name(&self) -> &str;

    /// Send a prepared request and read the full response
    async fn send(&self, request: &ChatRequest) -> Result<UpstreamResponse, ApiError>;

    /// Release pooled resources
    async fn close(&self) {}
}
