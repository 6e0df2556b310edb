//! Channel trait: the abstraction over chat platforms.
//!
//! A Channel connects NanoClaw to a messaging surface (CLI, Telegram,
//! WhatsApp bridge, ...). Inbound traffic is published onto the
//! [`MessageBus`]; outbound replies are handed to `send()` by the channel
//! manager, which drains the bus's outbound queue.

use std::sync::Arc;

use async_trait::async_trait;

use crate::bus::{MessageBus, OutboundMessage};
use crate::error::ChannelError;

/// The core Channel trait.
///
/// Adapters normalize platform events into `InboundMessage`s, including the
/// `is_group` / `mentioned_bot` / `reply_to_bot` metadata the policy engine
/// needs for group reply gating.
#[async_trait]
pub trait Channel: Send + Sync {
    /// The channel name used in message routing (e.g., "cli", "telegram").
    fn name(&self) -> &str;

    /// Start receiving. Implementations spawn their own reader task and
    /// return once it is running.
    async fn start(&self, bus: Arc<MessageBus>) -> std::result::Result<(), ChannelError>;

    /// Deliver one outbound message.
    async fn send(&self, message: &OutboundMessage) -> std::result::Result<(), ChannelError>;

    /// Stop receiving and release resources.
    async fn stop(&self) -> std::result::Result<(), ChannelError> {
        Ok(())
    }

    /// Whether the channel is ready to deliver.
    async fn health_check(&self) -> bool {
        true
    }
}
