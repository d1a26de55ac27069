//! Chat Streams
//!
//! A [`ChatStream`] is one request/response exchange. It is created by
//! [`crate::ChatClient::chat`], starts its background task immediately, emits
//! at most one result, and closes itself.
//!
//! # Lifecycle
//!
//! ```text
//! Pending ──> Running ──> Emitted ──> Closed
//!    │           │                      ▲
//!    └───────────┴──> Cancelled ────────┘
//! ```
//!
//! - Synthetic streams (debounced duplicates) emit an empty event without
//!   touching the network or the client's request lock.
//! - Real streams hold the client's request lock for the whole
//!   send/read/emit section, so a client never has two calls in flight.
//! - Closing is idempotent and runs exactly once, whether triggered by the
//!   task finishing, by [`ChatStream::aclose`], by dropping the stream, or by
//!   [`crate::ChatClient::close`].

use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::client::ClientInner;
use crate::error::ApiError;
use crate::event::ChatChunk;
use crate::transport::{ChatMessagesResponse, ChatRequest};

/// Item yielded by a [`ChatStream`]
pub type StreamItem = Result<ChatChunk, ApiError>;

/// Identifier of a stream within its client
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(pub u64);

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "stream-{}", self.0)
    }
}

/// Lifecycle state of a stream
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamState {
    /// Created, task not yet started
    Pending,
    /// Task is running (waiting for the lock, sending, or reading)
    Running,
    /// The result event (or error) was handed to the consumer
    Emitted,
    /// Cancellation requested, task unwinding
    Cancelled,
    /// Terminal state
    Closed,
}

impl StreamState {
    /// Whether the stream has reached its terminal state
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Whether the task may still be doing work
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }
}

/// What the background task should do
pub(crate) enum StreamJob {
    /// Send the prepared request
    Request(ChatRequest),
    /// Emit an empty event (debounced duplicate)
    Synthetic,
    /// Emit an error without running (client already closed)
    Rejected(ApiError),
}

impl StreamJob {
    fn is_network(&self) -> bool {
        matches!(self, Self::Request(_))
    }
}

// ============================================================================
// Stream Control (shared between stream, task and client)
// ============================================================================

/// Close bookkeeping shared by the stream handle, its task and the client
pub(crate) struct StreamControl {
    id: StreamId,
    client: Weak<ClientInner>,
    state: Mutex<StreamState>,
    closed: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl StreamControl {
    fn new(id: StreamId, client: Weak<ClientInner>) -> Self {
        Self {
            id,
            client,
            state: Mutex::new(StreamState::Pending),
            closed: AtomicBool::new(false),
            task: Mutex::new(None),
        }
    }

    pub(crate) fn id(&self) -> StreamId {
        self.id
    }

    fn state(&self) -> StreamState {
        *self.state.lock()
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Move forward unless a close already took over
    fn advance(&self, next: StreamState) {
        let mut state = self.state.lock();
        if !matches!(*state, StreamState::Cancelled | StreamState::Closed) {
            *state = next;
        }
    }

    /// Claim the close; only the first caller gets `true`
    fn claim_close(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    fn deregister(&self) {
        if let Some(client) = self.client.upgrade() {
            client.deregister(self.id);
        }
    }

    /// Close path taken by the task after its work is done
    fn finish(&self) {
        if self.claim_close() {
            *self.state.lock() = StreamState::Closed;
            self.deregister();
            debug!(stream = %self.id, "Stream closed");
        }
    }

    /// Cancel the task if needed and wait for it to unwind
    ///
    /// Returns an error only when the task had panicked.
    pub(crate) async fn shutdown(&self) -> Result<(), ApiError> {
        if !self.claim_close() {
            return Ok(());
        }

        let handle = self.task.lock().take();
        let mut outcome = Ok(());
        if let Some(handle) = handle {
            if !handle.is_finished() {
                self.mark_cancelled();
                handle.abort();
            }
            if let Err(err) = handle.await {
                if err.is_panic() {
                    outcome = Err(ApiError::task_failed(format!(
                        "{} task panicked",
                        self.id
                    )));
                }
            }
        }

        *self.state.lock() = StreamState::Closed;
        self.deregister();
        debug!(stream = %self.id, "Stream closed");
        outcome
    }

    /// Synchronous cancel used when the handle is dropped
    fn abort_now(&self) {
        if !self.claim_close() {
            return;
        }
        if let Some(handle) = self.task.lock().take() {
            if !handle.is_finished() {
                self.mark_cancelled();
                handle.abort();
            }
        }
        *self.state.lock() = StreamState::Closed;
        self.deregister();
    }

    fn mark_cancelled(&self) {
        let mut state = self.state.lock();
        if state.is_active() {
            *state = StreamState::Cancelled;
        }
    }
}

// ============================================================================
// Chat Stream
// ============================================================================

/// One cancellable request/response exchange
///
/// Yields at most one [`StreamItem`] and then ends. Implements
/// [`futures::Stream`]; [`ChatStream::next_event`] and
/// [`ChatStream::response`] are convenience wrappers.
///
/// Dropping a stream cancels its task.
pub struct ChatStream {
    control: Arc<StreamControl>,
    events: mpsc::Receiver<StreamItem>,
    synthetic: bool,
}

impl ChatStream {
    /// Create the stream and schedule its task
    ///
    /// Network streams are registered with the client before the task is
    /// spawned, so the task's own deregistration can never run first. If the
    /// client is closed by then, the stream only reports `client_closed`.
    pub(crate) fn start(client: &Arc<ClientInner>, id: StreamId, job: StreamJob) -> Self {
        let control = Arc::new(StreamControl::new(id, Arc::downgrade(client)));
        let (tx, events) = mpsc::channel(1);
        let synthetic = matches!(job, StreamJob::Synthetic);

        // A close landing between the caller's check and registration
        // turns the request into a rejection.
        let job = if job.is_network() && !client.register(Arc::clone(&control)) {
            StreamJob::Rejected(ApiError::client_closed())
        } else {
            job
        };

        let handle = tokio::spawn(drive(Arc::clone(&control), job, tx));
        *control.task.lock() = Some(handle);

        Self {
            control,
            events,
            synthetic,
        }
    }

    /// Stream identifier
    #[must_use]
    pub fn id(&self) -> StreamId {
        self.control.id
    }

    /// Whether this stream was synthesized for a debounced duplicate
    #[must_use]
    pub fn is_synthetic(&self) -> bool {
        self.synthetic
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> StreamState {
        self.control.state()
    }

    /// Whether the stream reached its terminal state
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.control.state().is_terminal()
    }

    /// Wait for the next item; `None` once the stream has ended
    pub async fn next_event(&mut self) -> Option<StreamItem> {
        self.events.recv().await
    }

    /// Wait for the single result
    ///
    /// # Errors
    ///
    /// Returns the stream's [`ApiError`], or a retryable error if the stream
    /// ended without emitting anything (e.g. it was cancelled).
    pub async fn response(mut self) -> Result<ChatChunk, ApiError> {
        match self.events.recv().await {
            Some(item) => item,
            None => Err(ApiError::new(
                format!("{} closed before a response was received", self.control.id),
                true,
            )),
        }
    }

    /// Close the stream, cancelling its task if still running
    ///
    /// Idempotent. Releases the client's request lock and the open response
    /// (both live inside the task) and removes the stream from the client.
    ///
    /// # Errors
    ///
    /// Returns an error only if the background task had panicked.
    pub async fn aclose(&self) -> Result<(), ApiError> {
        self.control.shutdown().await
    }

    #[cfg(test)]
    pub(crate) fn abandon_receiver(&mut self) {
        self.events.close();
    }
}

impl std::fmt::Debug for ChatStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatStream")
            .field("id", &self.control.id)
            .field("state", &self.state())
            .field("synthetic", &self.synthetic)
            .finish()
    }
}

impl futures::Stream for ChatStream {
    type Item = StreamItem;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().events.poll_recv(cx)
    }
}

impl Drop for ChatStream {
    fn drop(&mut self) {
        self.control.abort_now();
    }
}

// ============================================================================
// Background Task
// ============================================================================

async fn drive(control: Arc<StreamControl>, job: StreamJob, events: mpsc::Sender<StreamItem>) {
    control.advance(StreamState::Running);

    match job {
        StreamJob::Synthetic => deliver(&control, &events, Ok(ChatChunk::empty())).await,
        StreamJob::Rejected(err) => deliver(&control, &events, Err(err)).await,
        StreamJob::Request(request) => {
            let Some(client) = control.client.upgrade() else {
                deliver(&control, &events, Err(ApiError::client_closed())).await;
                control.finish();
                return;
            };

            let _serialized = client.request_lock.lock().await;
            if control.is_closed() {
                debug!(stream = %control.id, "Stream closed before its request was sent");
                return;
            }

            let result = match AssertUnwindSafe(exchange(&client, &request))
                .catch_unwind()
                .await
            {
                Ok(result) => result,
                Err(_) => Err(ApiError::task_failed(format!(
                    "{} request failed unexpectedly",
                    control.id
                ))),
            };
            if let Err(ref err) = result {
                error!(
                    stream = %control.id,
                    status = ?err.status,
                    body = ?err.body,
                    retryable = err.retryable,
                    error = %err,
                    "lamapbx API error"
                );
            }
            deliver(&control, &events, result).await;
        }
    }

    control.finish();
}

/// Send the request, classify the reply and record the continuity token
async fn exchange(client: &ClientInner, request: &ChatRequest) -> Result<ChatChunk, ApiError> {
    let response = client.transport().send(request).await?;

    if !response.is_success() {
        return Err(ApiError::from_status(response.status, &response.body));
    }

    let data: ChatMessagesResponse =
        serde_json::from_str(&response.body).map_err(|e| ApiError::decode(e.to_string()))?;

    if let Some(ref conversation_id) = data.conversation_id {
        client.update_conversation_id(conversation_id);
    }

    Ok(data.into_chunk())
}

async fn deliver(control: &StreamControl, events: &mpsc::Sender<StreamItem>, item: StreamItem) {
    if events.send(item).await.is_ok() {
        control.advance(StreamState::Emitted);
    } else {
        // Consumer went away; closing normally is all that is left to do.
        debug!(stream = %control.id, "Channel closed before response could be sent");
    }
}
