//! Test doubles shared by unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::error::ApiError;
use crate::transport::{ChatRequest, HttpTransport, UpstreamResponse};
use crate::{ChatClient, ClientConfig};

/// Scripted outcome of one call
#[derive(Clone, Debug)]
pub enum Reply {
    /// Status with JSON body
    Json(u16, serde_json::Value),
    /// Status with raw body
    Raw(u16, String),
    /// Transport-level failure
    Fail(ApiError),
    /// Never answers
    Hang,
    /// Panics inside the transport
    Panic,
}

/// Transport that answers from a script and records every call.
///
/// Unscripted calls echo the query back with no continuity token.
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<ChatRequest>>,
    spans: Mutex<Vec<(Instant, Instant)>>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    closes: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Self::with_delay(Duration::ZERO)
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            spans: Mutex::new(Vec::new()),
            delay,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
        })
    }

    pub fn push(&self, reply: Reply) {
        self.replies.lock().push_back(reply);
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn spans(&self) -> Vec<(Instant, Instant)> {
        self.spans.lock().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn send(&self, request: &ChatRequest) -> Result<UpstreamResponse, ApiError> {
        let start = Instant::now();
        self.requests.lock().push(request.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let reply = self.replies.lock().pop_front();
        let outcome = match reply {
            None => Ok(UpstreamResponse::new(
                200,
                serde_json::json!({ "answer": format!("echo: {}", request.query()) }).to_string(),
            )),
            Some(Reply::Json(status, body)) => Ok(UpstreamResponse::new(status, body.to_string())),
            Some(Reply::Raw(status, body)) => Ok(UpstreamResponse::new(status, body)),
            Some(Reply::Fail(err)) => Err(err),
            Some(Reply::Hang) => std::future::pending().await,
            Some(Reply::Panic) => panic!("scripted transport panic"),
        };

        self.spans.lock().push((start, Instant::now()));
        outcome
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Client wired to a scripted transport
pub fn scripted_client(transport: &Arc<ScriptedTransport>) -> ChatClient {
    let transport: Arc<dyn HttpTransport> = transport.clone();
    ChatClient::with_transport(
        ClientConfig::new("app-test").with_base_url("http://upstream.test/v1"),
        transport,
    )
    .expect("valid test config")
}
