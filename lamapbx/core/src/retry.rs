//! Retry Orchestration
//!
//! The client classifies failures but never retries. This helper is the
//! outer loop: it re-issues a chat turn on retryable errors, following the
//! caller's [`ConnectOptions`].
//!
//! A retry re-sends the same query, so `retry_interval` should exceed
//! [`crate::DEBOUNCE_INTERVAL`]; otherwise the retry is debounced into an
//! empty answer. The default interval (2 s) already does.

use tracing::{debug, warn};

use crate::chat::{ChatContext, ChatOptions};
use crate::client::ChatClient;
use crate::error::ApiError;
use crate::event::ChatChunk;

/// Run one chat turn, retrying retryable failures
///
/// Each attempt is bounded by `options.conn_options.timeout`; an expired
/// attempt counts as a retryable timeout. At most
/// `options.conn_options.max_retry` retries follow the first attempt.
///
/// # Errors
///
/// Returns the first fatal error, or the last retryable one once the retry
/// budget is spent.
pub async fn complete_with_retry(
    client: &ChatClient,
    ctx: &ChatContext,
    options: &ChatOptions,
) -> Result<ChatChunk, ApiError> {
    let conn = options.conn_options;
    let mut attempt: u32 = 0;

    loop {
        let stream = client.chat(ctx, options);
        let outcome = match tokio::time::timeout(conn.timeout, stream.response()).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::timeout()),
        };

        match outcome {
            Ok(chunk) => return Ok(chunk),
            Err(err) if err.retryable && attempt < conn.max_retry => {
                attempt += 1;
                warn!(
                    attempt,
                    max_retry = conn.max_retry,
                    error = %err,
                    "Retryable lamapbx failure, retrying"
                );
                tokio::time::sleep(conn.retry_interval).await;
            }
            Err(err) => {
                debug!(attempt, retryable = err.retryable, "Giving up on lamapbx request");
                return Err(err);
            }
        }
    }
}
