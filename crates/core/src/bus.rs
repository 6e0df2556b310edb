//! Message bus: the in-process hand-off between channels and the agent.
//!
//! Channel adapters publish [`InboundMessage`]s; a single consumer (the agent
//! loop) pulls them one at a time. Replies travel the other way through the
//! outbound queue, which the channel manager drains and routes to whichever
//! adapter owns the reply's channel.
//!
//! Both queues are unbounded FIFO `tokio::sync::mpsc` channels: producers never
//! wait, and nothing survives a process restart.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, mpsc};

use crate::error::BusError;

/// Pseudo-channel used for messages originating inside the runtime
/// (background task announcements and the like).
pub const SYSTEM_CHANNEL: &str = "system";

/// Separator between sender aliases in [`InboundMessage::sender_id`].
pub const SENDER_ALIAS_DELIMITER: char = '|';

/// Metadata keys channel adapters may attach to an inbound message.
pub mod meta {
    pub const IS_GROUP: &str = "is_group";
    pub const MENTIONED_BOT: &str = "mentioned_bot";
    pub const REPLY_TO_BOT: &str = "reply_to_bot";
}

/// A message received from a channel, waiting to be processed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Channel name (e.g. "telegram", "cli", "system")
    pub channel: String,

    /// Sender identifier. May carry several aliases separated by `|`.
    pub sender_id: String,

    /// Chat / conversation identifier within the channel
    pub chat_id: String,

    /// The text content
    pub content: String,

    /// Media references (paths or URLs)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub media: Vec<String>,

    /// Platform metadata (group membership, mention flags, ...)
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,

    /// When the adapter received the message
    pub timestamp: DateTime<Utc>,
}

impl InboundMessage {
    pub fn new(
        channel: impl Into<String>,
        sender_id: impl Into<String>,
        chat_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            sender_id: sender_id.into(),
            chat_id: chat_id.into(),
            content: content.into(),
            media: Vec::new(),
            metadata: serde_json::Map::new(),
            timestamp: Utc::now(),
        }
    }

    /// Attach media references.
    pub fn with_media(mut self, media: Vec<String>) -> Self {
        self.media = media;
        self
    }

    /// Attach one metadata entry.
    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// The session this message belongs to: `"<channel>:<chat_id>"`.
    pub fn session_key(&self) -> String {
        format!("{}:{}", self.channel, self.chat_id)
    }

    /// Whether the message was produced inside the runtime rather than by a user.
    pub fn is_system(&self) -> bool {
        self.channel == SYSTEM_CHANNEL
    }

    /// Read a boolean metadata flag. `None` means the adapter did not supply it.
    pub fn metadata_flag(&self, key: &str) -> Option<bool> {
        self.metadata.get(key).map(|v| match v {
            serde_json::Value::Bool(b) => *b,
            serde_json::Value::String(s) => matches!(s.as_str(), "true" | "1" | "yes"),
            serde_json::Value::Number(n) => n.as_i64().is_some_and(|n| n != 0),
            _ => false,
        })
    }

    /// A short content preview for log lines.
    pub fn preview(&self, max_chars: usize) -> String {
        preview(&self.content, max_chars)
    }
}

/// A reply on its way back to a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub channel: String,
    pub chat_id: String,
    pub content: String,
}

impl OutboundMessage {
    pub fn new(
        channel: impl Into<String>,
        chat_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            chat_id: chat_id.into(),
            content: content.into(),
        }
    }
}

/// Outcome of waiting on a bus queue.
#[derive(Debug)]
pub enum Received<T> {
    /// A message arrived.
    Message(T),
    /// The wait elapsed with nothing to read. Not an error.
    Timeout,
    /// The bus was closed and drained.
    Closed,
}

struct Queue<T> {
    tx: mpsc::UnboundedSender<T>,
    rx: Mutex<mpsc::UnboundedReceiver<T>>,
    pending: AtomicUsize,
}

impl<T> Queue<T> {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
            pending: AtomicUsize::new(0),
        }
    }

    fn publish(&self, item: T) -> Result<(), BusError> {
        // Counted before sending so a racing consumer never underflows.
        self.pending.fetch_add(1, Ordering::SeqCst);
        self.tx.send(item).map_err(|_| {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            BusError::Closed
        })
    }

    async fn consume(&self, timeout: Duration) -> Received<T> {
        let mut rx = self.rx.lock().await;
        match tokio::time::timeout(timeout, rx.recv()).await {
            Ok(Some(item)) => {
                self.pending.fetch_sub(1, Ordering::SeqCst);
                Received::Message(item)
            }
            Ok(None) => Received::Closed,
            Err(_) => Received::Timeout,
        }
    }

    async fn close(&self) {
        self.rx.lock().await.close();
    }

    fn len(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}

/// The two-queue message bus shared by channels and the agent loop.
pub struct MessageBus {
    inbound: Queue<InboundMessage>,
    outbound: Queue<OutboundMessage>,
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBus {
    pub fn new() -> Self {
        Self {
            inbound: Queue::new(),
            outbound: Queue::new(),
        }
    }

    /// Enqueue a message for the agent. Never waits.
    pub fn publish_inbound(&self, msg: InboundMessage) -> Result<(), BusError> {
        self.inbound.publish(msg)
    }

    /// Wait up to `timeout` for the next inbound message.
    pub async fn consume_inbound(&self, timeout: Duration) -> Received<InboundMessage> {
        self.inbound.consume(timeout).await
    }

    /// Enqueue a reply for the channel that owns `msg.channel`.
    pub fn publish_outbound(&self, msg: OutboundMessage) -> Result<(), BusError> {
        self.outbound.publish(msg)
    }

    /// Wait up to `timeout` for the next outbound message.
    pub async fn consume_outbound(&self, timeout: Duration) -> Received<OutboundMessage> {
        self.outbound.consume(timeout).await
    }

    /// Stop accepting messages. Already-queued messages can still be consumed.
    pub async fn close(&self) {
        self.inbound.close().await;
        self.outbound.close().await;
    }

    /// Number of inbound messages waiting to be processed.
    pub fn inbound_len(&self) -> usize {
        self.inbound.len()
    }

    /// Number of outbound messages waiting to be delivered.
    pub fn outbound_len(&self) -> usize {
        self.outbound.len()
    }
}

/// Truncate `text` to `max_chars` characters, appending "..." when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{cut}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHORT: Duration = Duration::from_millis(20);

    #[test]
    fn session_key_joins_channel_and_chat() {
        let msg = InboundMessage::new("telegram", "42", "555", "hi");
        assert_eq!(msg.session_key(), "telegram:555");
        assert!(!msg.is_system());
    }

    #[test]
    fn metadata_flag_distinguishes_missing_from_false() {
        let msg = InboundMessage::new("whatsapp", "a", "g1", "hi")
            .with_metadata(meta::IS_GROUP, true)
            .with_metadata(meta::MENTIONED_BOT, false);
        assert_eq!(msg.metadata_flag(meta::IS_GROUP), Some(true));
        assert_eq!(msg.metadata_flag(meta::MENTIONED_BOT), Some(false));
        assert_eq!(msg.metadata_flag(meta::REPLY_TO_BOT), None);
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        assert_eq!(preview("héllo wörld", 5), "héllo...");
        assert_eq!(preview("short", 80), "short");
    }

    #[tokio::test]
    async fn inbound_is_fifo() {
        let bus = MessageBus::new();
        for i in 0..3 {
            bus.publish_inbound(InboundMessage::new("cli", "u", "c", format!("m{i}")))
                .unwrap();
        }
        assert_eq!(bus.inbound_len(), 3);

        for i in 0..3 {
            match bus.consume_inbound(SHORT).await {
                Received::Message(msg) => assert_eq!(msg.content, format!("m{i}")),
                other => panic!("expected message, got {other:?}"),
            }
        }
        assert_eq!(bus.inbound_len(), 0);
    }

    #[tokio::test]
    async fn consume_times_out_without_error() {
        let bus = MessageBus::new();
        assert!(matches!(bus.consume_inbound(SHORT).await, Received::Timeout));
    }

    #[tokio::test]
    async fn consumer_wakes_when_message_arrives() {
        let bus = std::sync::Arc::new(MessageBus::new());
        let producer = bus.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            producer
                .publish_inbound(InboundMessage::new("cli", "u", "c", "late"))
                .unwrap();
        });

        match bus.consume_inbound(Duration::from_secs(2)).await {
            Received::Message(msg) => assert_eq!(msg.content, "late"),
            other => panic!("expected message, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn closed_bus_rejects_publish_and_drains() {
        let bus = MessageBus::new();
        bus.publish_outbound(OutboundMessage::new("cli", "direct", "queued"))
            .unwrap();
        bus.close().await;

        assert!(bus
            .publish_outbound(OutboundMessage::new("cli", "direct", "late"))
            .is_err());
        assert!(matches!(
            bus.consume_outbound(SHORT).await,
            Received::Message(_)
        ));
        assert!(matches!(bus.consume_outbound(SHORT).await, Received::Closed));
    }
}
