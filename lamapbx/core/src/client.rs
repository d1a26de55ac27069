//! Chat Client
//!
//! [`ChatClient`] owns everything shared between the turns of one upstream
//! connection: the transport, the continuity token, the debounce window, the
//! set of active streams and the request lock.
//!
//! # Guarantees
//!
//! - **Single flight**: streams of one client never have upstream calls in
//!   flight at the same time, regardless of conversation.
//! - **Continuity**: once the service assigns a conversation id, it is
//!   attached to every later request and only replaced by a different
//!   non-empty id.
//! - **Debounce**: an identical query issued within [`DEBOUNCE_INTERVAL`] of
//!   a previous one is answered by a synthetic empty stream instead of a
//!   network call. Matching is on raw query text only.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::chat::{ChatContext, ChatOptions};
use crate::config::ClientConfig;
use crate::error::{ApiError, ConfigError};
use crate::stream::{ChatStream, StreamControl, StreamId, StreamJob};
use crate::transport::{ChatRequest, HttpTransport, ReqwestTransport};

/// Window in which a repeated identical query is suppressed
pub const DEBOUNCE_INTERVAL: Duration = Duration::from_secs(1);

/// Shorten a continuity token for logs
fn short_id(id: &str) -> String {
    let prefix: String = id.chars().take(8).collect();
    format!("{prefix}...")
}

// ============================================================================
// Shared State
// ============================================================================

/// State shared by the client handles and their streams
pub(crate) struct ClientInner {
    config: ClientConfig,
    chat_url: String,
    transport: Arc<dyn HttpTransport>,
    /// Continuity token assigned by the upstream service
    conversation_id: RwLock<String>,
    /// Queries issued within the debounce window, oldest first
    recent_queries: Mutex<VecDeque<(String, Instant)>>,
    active: DashMap<StreamId, Arc<StreamControl>>,
    /// Held for the whole send/read/emit section of a call
    pub(crate) request_lock: tokio::sync::Mutex<()>,
    closed: AtomicBool,
    next_stream_id: AtomicU64,
}

impl ClientInner {
    pub(crate) fn transport(&self) -> &dyn HttpTransport {
        self.transport.as_ref()
    }

    /// Add a stream to the active set
    ///
    /// Returns `false` (and leaves the set untouched) when the client was
    /// closed concurrently; `close` sets the flag before taking its snapshot,
    /// so every stream is either seen by `close` or refused here.
    pub(crate) fn register(&self, control: Arc<StreamControl>) -> bool {
        let id = control.id();
        self.active.insert(id, control);
        if self.closed.load(Ordering::SeqCst) {
            self.active.remove(&id);
            return false;
        }
        true
    }

    pub(crate) fn deregister(&self, id: StreamId) {
        self.active.remove(&id);
    }

    /// Replace the continuity token with a different non-empty value
    pub(crate) fn update_conversation_id(&self, new_id: &str) {
        if new_id.is_empty() {
            return;
        }
        let mut current = self.conversation_id.write();
        if *current != new_id {
            debug!(
                old_id = %short_id(&current),
                new_id = %short_id(new_id),
                "Updating conversation ID"
            );
            *current = new_id.to_string();
        }
    }

    fn next_id(&self) -> StreamId {
        StreamId(self.next_stream_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Record `query` unless it repeats one inside the debounce window
    ///
    /// Trimming, matching and recording happen under one lock so concurrent
    /// callers cannot both pass as originals.
    fn debounce(&self, query: &str, now: Instant) -> bool {
        let mut recent = self.recent_queries.lock();
        recent.retain(|(_, at)| now.saturating_duration_since(*at) < DEBOUNCE_INTERVAL);

        let duplicate = recent.iter().any(|(q, _)| q == query);
        if !duplicate {
            recent.push_back((query.to_string(), now));
        }
        duplicate
    }
}

// ============================================================================
// Chat Client
// ============================================================================

/// Client for the lamapbx `chat-messages` API
///
/// Cheap to clone; clones share all state. [`ChatClient::chat`] must be
/// called from within a Tokio runtime because it spawns the stream's task.
#[derive(Clone)]
pub struct ChatClient {
    inner: Arc<ClientInner>,
}

impl ChatClient {
    /// Create a client with the default reqwest transport
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid (e.g. no API key) or the HTTP
    /// client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let transport = ReqwestTransport::new(&config)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Create a client from `LAMAPBX_*` environment variables
    ///
    /// # Errors
    ///
    /// Same as [`ChatClient::new`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::new(ClientConfig::from_env())
    }

    /// Create a client over a custom transport
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid.
    pub fn with_transport(
        config: ClientConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        debug!(
            transport = transport.name(),
            base_url = %config.normalized_base_url(),
            user = %config.user,
            "Creating lamapbx client"
        );

        Ok(Self {
            inner: Arc::new(ClientInner {
                chat_url: config.chat_url(),
                config,
                transport,
                conversation_id: RwLock::new(String::new()),
                recent_queries: Mutex::new(VecDeque::new()),
                active: DashMap::new(),
                request_lock: tokio::sync::Mutex::new(()),
                closed: AtomicBool::new(false),
                next_stream_id: AtomicU64::new(1),
            }),
        })
    }

    /// Start a chat turn
    ///
    /// Sends the most recent user message of `ctx` (or `"Hello"`). The
    /// returned stream runs immediately in the background. A query repeating
    /// one sent less than [`DEBOUNCE_INTERVAL`] ago yields a synthetic
    /// stream with an empty, zero-usage event and no network call.
    ///
    /// Tools and tool choice in `options` are ignored with a warning.
    #[must_use]
    pub fn chat(&self, ctx: &ChatContext, options: &ChatOptions) -> ChatStream {
        if options.requests_tools() {
            warn!(
                tools = options.tools.len(),
                "lamapbx API doesn't support tools - ignoring"
            );
        }

        let query = ctx.last_user_query();
        let id = self.inner.next_id();

        if self.is_closed() {
            debug!(stream = %id, "Chat requested on closed client");
            return ChatStream::start(&self.inner, id, StreamJob::Rejected(ApiError::client_closed()));
        }

        let conversation_id = self.conversation_id();
        let now = Instant::now();
        let duplicate = self.inner.debounce(&query, now);
        debug!(
            stream = %id,
            query = %query,
            conversation_id = %conversation_id,
            is_duplicate = duplicate,
            "Debounce check result"
        );

        if duplicate {
            debug!(query = %query, "Skipping duplicate request (debounced)");
            return ChatStream::start(&self.inner, id, StreamJob::Synthetic);
        }

        let request = ChatRequest::blocking(
            self.inner.chat_url.clone(),
            query,
            conversation_id,
            self.inner.config.user.clone(),
        );
        ChatStream::start(&self.inner, id, StreamJob::Request(request))
    }

    /// Close the client
    ///
    /// Idempotent. Cancels every active stream concurrently (individual
    /// failures are logged and swallowed), clears the active set and
    /// releases the transport.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let streams: Vec<Arc<StreamControl>> = self
            .inner
            .active
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        debug!(streams = streams.len(), "Closing lamapbx client");

        let results = futures::future::join_all(streams.iter().map(|s| s.shutdown())).await;
        for (control, result) in streams.iter().zip(results) {
            if let Err(e) = result {
                warn!(stream = %control.id(), error = %e, "Error during stream close");
            }
        }

        self.inner.active.clear();
        self.inner.transport.close().await;
    }

    /// Current continuity token (empty before the first answer)
    #[must_use]
    pub fn conversation_id(&self) -> String {
        self.inner.conversation_id.read().clone()
    }

    /// Number of registered, not yet closed streams
    #[must_use]
    pub fn active_streams(&self) -> usize {
        self.inner.active.len()
    }

    /// Whether [`ChatClient::close`] has been called
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Model label
    #[must_use]
    pub fn model(&self) -> &str {
        &self.inner.config.model
    }

    /// Logical user identifier
    #[must_use]
    pub fn user(&self) -> &str {
        &self.inner.config.user
    }

    /// Client configuration
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("transport", &self.inner.transport.name())
            .field("chat_url", &self.inner.chat_url)
            .field("active_streams", &self.active_streams())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
