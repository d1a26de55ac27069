//! Upstream Transport
//!
//! Abstracts the HTTP client that carries `chat-messages` calls, so the
//! client's locking and dedupe logic can be exercised against test doubles.
//!
//! # Available Transports
//!
//! - **Reqwest**: pooled HTTPS client (default)
//!
//! # Usage
//!
//! ```ignore
//! use lamapbx_core::transport::{ChatRequest, HttpTransport, ReqwestTransport};
//!
//! let transport = ReqwestTransport::new(&config)?;
//! let request = ChatRequest::blocking(config.chat_url(), "Hello", "", "agent");
//! let response = transport.send(&request).await?;
//! ```

mod http;
mod traits;

pub use http::ReqwestTransport;
pub use traits::{
    ChatMessagesPayload, ChatMessagesResponse, ChatRequest, HttpTransport, ResponseMetadata,
    ResponseMode, UpstreamResponse,
};
