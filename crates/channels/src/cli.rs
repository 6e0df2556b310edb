//! CLI channel: interactive terminal-based chat.
//!
//! Reads lines from stdin and publishes them as inbound messages for chat
//! `direct`; replies are printed to stdout.

use std::sync::Arc;

use async_trait::async_trait;
use nanoclaw_core::bus::{InboundMessage, MessageBus, OutboundMessage};
use nanoclaw_core::channel::Channel;
use nanoclaw_core::error::ChannelError;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub const CLI_CHANNEL: &str = "cli";
pub const CLI_CHAT_ID: &str = "direct";
pub const CLI_SENDER: &str = "user";

/// Whether a line asks to leave the chat.
pub fn is_exit_command(line: &str) -> bool {
    matches!(line, "exit" | "quit" | "/exit" | "/quit" | ":q")
}

/// Publish every non-empty line of `reader` until EOF or an exit command.
/// Returns the number of messages published.
pub async fn relay_lines<R>(reader: R, bus: &MessageBus) -> Result<usize, ChannelError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut published = 0;

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| ChannelError::ConnectionLost(e.to_string()))?
    {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if is_exit_command(line) {
            break;
        }

        let msg = InboundMessage::new(CLI_CHANNEL, CLI_SENDER, CLI_CHAT_ID, line);
        if bus.publish_inbound(msg).is_err() {
            break;
        }
        published += 1;
    }

    Ok(published)
}

/// Interactive CLI channel for terminal-based chat.
#[derive(Default)]
pub struct CliChannel {
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl CliChannel {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        CLI_CHANNEL
    }

    async fn start(&self, bus: Arc<MessageBus>) -> Result<(), ChannelError> {
        let handle = tokio::spawn(async move {
            match relay_lines(BufReader::new(io::stdin()), &bus).await {
                Ok(count) => debug!(messages = count, "CLI input closed"),
                Err(e) => warn!(error = %e, "CLI input failed"),
            }
        });

        if let Some(previous) = self.reader.lock().await.replace(handle) {
            previous.abort();
        }
        Ok(())
    }

    async fn send(&self, message: &OutboundMessage) -> Result<(), ChannelError> {
        println!("\n{}\n", message.content);
        Ok(())
    }

    async fn stop(&self) -> Result<(), ChannelError> {
        if let Some(handle) = self.reader.lock().await.take() {
            handle.abort();
        }
        Ok(())
    }
}
