//! Result Events
//!
//! The upstream service answers with a single blocking response, so a stream
//! emits at most one [`ChatChunk`] carrying the whole answer.

use serde::{Deserialize, Serialize};

use crate::chat::ChatRole;

/// Token accounting reported by the upstream service
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionUsage {
    /// Tokens generated for the answer
    pub completion_tokens: u64,
    /// Tokens consumed by the prompt
    pub prompt_tokens: u64,
    /// Sum reported by the service
    pub total_tokens: u64,
}

impl CompletionUsage {
    /// Usage with explicit counters
    #[must_use]
    pub fn new(completion_tokens: u64, prompt_tokens: u64, total_tokens: u64) -> Self {
        Self {
            completion_tokens,
            prompt_tokens,
            total_tokens,
        }
    }

    /// Whether every counter is zero
    #[must_use]
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

/// The single result event of a stream
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatChunk {
    /// Opaque unique token
    pub id: String,
    /// Answer text
    pub content: String,
    /// Always [`ChatRole::Assistant`]
    pub role: ChatRole,
    /// Token counters
    pub usage: CompletionUsage,
}

impl ChatChunk {
    /// Assistant event with a fresh id
    pub fn assistant(content: impl Into<String>, usage: CompletionUsage) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content: content.into(),
            role: ChatRole::Assistant,
            usage,
        }
    }

    /// Empty event emitted by synthetic (debounced) streams
    #[must_use]
    pub fn empty() -> Self {
        Self::assistant(String::new(), CompletionUsage::default())
    }

    /// Whether this event carries no answer and no usage
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.usage.is_zero()
    }
}
