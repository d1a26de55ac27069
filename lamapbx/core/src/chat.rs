//! Chat History and Request Options
//!
//! The caller hands the client a full chat history, but the upstream service
//! keeps its own conversation state (keyed by the continuity token). Only the
//! most recent user message is sent.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Query used when the history holds no usable user message
pub const FALLBACK_QUERY: &str = "Hello";

/// Author of a chat message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Instructions for the assistant
    System,
    /// End-user input
    User,
    /// Model output
    Assistant,
}

impl ChatRole {
    /// Wire name of the role
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for ChatRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message in a chat history
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who wrote the message
    pub role: ChatRole,
    /// Message text
    pub content: String,
}

impl ChatMessage {
    /// Create a message
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// User-authored message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    /// Assistant-authored message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }

    /// System message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(ChatRole::System, content)
    }
}

/// Ordered chat history
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatContext {
    /// Messages, oldest first
    pub items: Vec<ChatMessage>,
}

impl ChatContext {
    /// Empty history
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message
    pub fn push(&mut self, message: ChatMessage) {
        self.items.push(message);
    }

    /// Builder-style append
    #[must_use]
    pub fn with_message(mut self, message: ChatMessage) -> Self {
        self.items.push(message);
        self
    }

    /// Builder-style user message
    #[must_use]
    pub fn with_user(self, content: impl Into<String>) -> Self {
        self.with_message(ChatMessage::user(content))
    }

    /// Builder-style assistant message
    #[must_use]
    pub fn with_assistant(self, content: impl Into<String>) -> Self {
        self.with_message(ChatMessage::assistant(content))
    }

    /// Number of messages
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the history is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Text of the most recent user message
    ///
    /// Earlier user messages are never consulted: when the latest one is
    /// empty, or no user message exists, [`FALLBACK_QUERY`] is returned.
    #[must_use]
    pub fn last_user_query(&self) -> String {
        self.items
            .iter()
            .rev()
            .find(|m| m.role == ChatRole::User)
            .map(|m| m.content.as_str())
            .filter(|content| !content.is_empty())
            .unwrap_or(FALLBACK_QUERY)
            .to_string()
    }
}

/// Function-calling tool offered by the caller
///
/// The upstream service cannot call tools; definitions are accepted only so
/// callers written for tool-capable backends keep working.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name
    pub name: String,
    /// Tool description
    pub description: String,
    /// JSON schema of the parameters
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    /// Tool with no parameters
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: serde_json::json!({ "type": "object", "properties": {} }),
        }
    }
}

/// Retry and timeout options for outer orchestration
///
/// The client itself does not enforce these; see [`crate::retry`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Retries after the first attempt
    pub max_retry: u32,
    /// Pause between attempts
    pub retry_interval: Duration,
    /// Bound on a single attempt
    pub timeout: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            max_retry: 3,
            retry_interval: Duration::from_secs(2),
            timeout: Duration::from_secs(10),
        }
    }
}

impl ConnectOptions {
    /// Set the retry count
    #[must_use]
    pub fn with_max_retry(mut self, max_retry: u32) -> Self {
        self.max_retry = max_retry;
        self
    }

    /// Set the pause between attempts
    #[must_use]
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Set the per-attempt bound
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Per-call options for [`crate::ChatClient::chat`]
#[derive(Clone, Debug, Default)]
pub struct ChatOptions {
    /// Tools offered for function calling (ignored)
    pub tools: Vec<ToolDefinition>,
    /// Tool choice hint (ignored)
    pub tool_choice: Option<String>,
    /// Sampling temperature (not forwarded)
    pub temperature: Option<f32>,
    /// Retry/timeout options for outer orchestration
    pub conn_options: ConnectOptions,
}

impl ChatOptions {
    /// Default options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer tools
    #[must_use]
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    /// Set the tool choice hint
    #[must_use]
    pub fn with_tool_choice(mut self, choice: impl Into<String>) -> Self {
        self.tool_choice = Some(choice.into());
        self
    }

    /// Set the sampling temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature.clamp(0.0, 2.0));
        self
    }

    /// Set connection options
    #[must_use]
    pub fn with_conn_options(mut self, conn_options: ConnectOptions) -> Self {
        self.conn_options = conn_options;
        self
    }

    /// Whether any function-calling parameter was supplied
    #[must_use]
    pub fn requests_tools(&self) -> bool {
        !self.tools.is_empty() || self.tool_choice.is_some()
    }
}
