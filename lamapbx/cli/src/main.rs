//! lamapbx Chat CLI
//!
//! Command-line front end for `lamapbx-core`.
//!
//! # Usage
//!
//! ```bash
//! # One turn
//! LAMAPBX_API_KEY=app-... lamapbx-chat "What are your opening hours?"
//!
//! # Interactive: one turn per stdin line, history kept across turns
//! lamapbx-chat --config ./lamapbx.toml
//!
//! # With verbose logging
//! RUST_LOG=lamapbx_core=debug lamapbx-chat "hi"
//! ```
//!
//! # Environment Variables
//!
//! - `LAMAPBX_CONFIG`: Configuration file path
//! - `LAMAPBX_API_KEY`, `LAMAPBX_BASE_URL`, `LAMAPBX_USER`, ...: see
//!   `lamapbx_core::config`
//! - `RUST_LOG`: Log level (trace, debug, info, warn, error)

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use lamapbx_core::{
    complete_with_retry, load_config, ChatChunk, ChatClient, ChatContext, ChatMessage,
    ChatOptions, ConfigOverrides, ConnectOptions,
};

/// Chat with a lamapbx app from the terminal
#[derive(Parser, Debug)]
#[command(name = "lamapbx-chat", version, about)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, env = "LAMAPBX_CONFIG")]
    config: Option<PathBuf>,

    /// API key (overrides file and environment)
    #[arg(long)]
    api_key: Option<String>,

    /// Base URL of the lamapbx API
    #[arg(long)]
    base_url: Option<String>,

    /// Logical user identifier
    #[arg(long)]
    user: Option<String>,

    /// Retry budget for retryable failures
    #[arg(long)]
    max_retries: Option<u32>,

    /// Retry retryable failures instead of reporting them
    #[arg(long)]
    retry: bool,

    /// Query to send; reads turns from stdin when omitted
    query: Vec<String>,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            api_key: self.api_key.clone(),
            base_url: self.base_url.clone(),
            user: self.user.clone(),
            max_retries: self.max_retries,
            read_timeout_ms: None,
        }
    }
}

/// Run one turn and append the answer to the history
async fn turn(
    client: &ChatClient,
    history: &mut ChatContext,
    text: &str,
    retry: bool,
) -> Result<ChatChunk> {
    history.push(ChatMessage::user(text));

    let options = ChatOptions::new().with_conn_options(
        ConnectOptions::default().with_max_retry(client.config().max_retries),
    );
    let result = if retry {
        complete_with_retry(client, history, &options).await
    } else {
        client.chat(history, &options).response().await
    };
    let chunk = result.context("chat turn failed")?;

    if chunk.is_empty() {
        info!(query = %text, "Duplicate query suppressed");
    } else {
        history.push(ChatMessage::assistant(chunk.content.clone()));
    }
    Ok(chunk)
}

fn print_chunk(chunk: &ChatChunk) {
    println!("{}", chunk.content);
    println!(
        "usage: completion={} prompt={} total={}",
        chunk.usage.completion_tokens, chunk.usage.prompt_tokens, chunk.usage.total_tokens
    );
}

async fn interactive(client: &ChatClient, retry: bool) -> Result<()> {
    let mut history = ChatContext::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                let text = line.trim();
                if text.is_empty() {
                    continue;
                }
                match turn(client, &mut history, text, retry).await {
                    Ok(chunk) => print_chunk(&chunk),
                    Err(e) => error!(error = %format!("{e:#}"), "Turn failed"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }
    Ok(())
}

/// Filter used when `RUST_LOG` is unset or invalid
const DEFAULT_LOG_FILTER: &str = "lamapbx_chat=info,lamapbx_core=info";

/// `RUST_LOG` wins as a whole; the defaults apply only without it
fn log_filter(rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let (config, source) =
        load_config(cli.config.as_deref(), &cli.overrides()).context("failed to load configuration")?;
    info!(?source, base_url = %config.base_url, user = %config.user, "Configuration loaded");

    let client = ChatClient::new(config).context("failed to create lamapbx client")?;

    let result = if cli.query.is_empty() {
        interactive(&client, cli.retry).await
    } else {
        let mut history = ChatContext::new();
        turn(&client, &mut history, &cli.query.join(" "), cli.retry)
            .await
            .map(|chunk| print_chunk(&chunk))
    };

    let conversation_id = client.conversation_id();
    if !conversation_id.is_empty() {
        info!(conversation_id = %conversation_id, "Conversation");
    }
    client.close().await;
    result
}
