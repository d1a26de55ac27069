//! lamapbx Core - Single-Flight Chat Client
//!
//! Adapter that turns a chat history into one blocking call to the lamapbx
//! `chat-messages` API and exposes the answer as a cancellable stream with a
//! single result event.
//!
//! # Architecture
//!
//! ```text
//!   caller
//!     │  chat(history, options)
//!     ▼
//! ┌────────────────────────────────────────────────────────────┐
//! │                       ChatClient                           │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────┐  │
//! │  │  Debounce    │  │ Continuity   │  │  Active streams  │  │
//! │  │  window (1s) │  │ token        │  │  (DashMap)       │  │
//! │  └──────────────┘  └──────────────┘  └──────────────────┘  │
//! │                    request lock (single flight)            │
//! └───────────────────────────┬────────────────────────────────┘
//!                             │ spawns
//!                             ▼
//!                  ChatStream (one task each)
//!                             │ HttpTransport::send
//!                             ▼
//!                   POST {base_url}/chat-messages
//! ```
//!
//! # Key Types
//!
//! - [`ChatClient`]: owns transport, conversation state and the request lock
//! - [`ChatStream`]: one exchange; yields at most one [`ChatChunk`]
//! - [`ApiError`]: runtime failure with a `retryable` flag
//! - [`ClientConfig`]: credential, endpoint, timeouts and pool limits
//!
//! # Quick Start
//!
//! ```ignore
//! use lamapbx_core::{ChatClient, ChatContext, ChatOptions, ClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = ChatClient::new(ClientConfig::new("app-..."))?;
//!
//!     let ctx = ChatContext::new().with_user("What are your opening hours?");
//!     let chunk = client.chat(&ctx, &ChatOptions::new()).response().await?;
//!     println!("{}", chunk.content);
//!
//!     client.close().await;
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`chat`]: chat history and per-call options
//! - [`client`]: the client and its shared state
//! - [`config`]: configuration loading (defaults, TOML, environment)
//! - [`error`]: configuration and API errors
//! - [`event`]: the result event
//! - [`retry`]: optional outer retry loop
//! - [`stream`]: stream lifecycle and background task
//! - [`transport`]: pluggable HTTP transport

#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod chat;
pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod retry;
pub mod stream;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-exports for convenience
pub use chat::{
    ChatContext, ChatMessage, ChatOptions, ChatRole, ConnectOptions, ToolDefinition,
    FALLBACK_QUERY,
};
pub use client::{ChatClient, DEBOUNCE_INTERVAL};
pub use config::{
    default_config_path, load_config, load_config_from_path, load_config_with_env, ClientConfig,
    ConfigOverrides, ConfigSource,
};
pub use error::{is_retryable_status, ApiError, ConfigError, RETRYABLE_STATUS_CODES};
pub use event::{ChatChunk, CompletionUsage};
pub use retry::complete_with_retry;
pub use stream::{ChatStream, StreamId, StreamItem, StreamState};
pub use transport::{ChatRequest, HttpTransport, ReqwestTransport, UpstreamResponse};
