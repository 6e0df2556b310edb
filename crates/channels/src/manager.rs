//! Channel manager: owns every active channel adapter.
//!
//! Adapters publish inbound traffic straight onto the bus; the manager
//! drains the bus's outbound queue and hands each reply to the adapter that
//! owns its channel.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use nanoclaw_core::bus::{MessageBus, OutboundMessage, Received};
use nanoclaw_core::channel::Channel;
use nanoclaw_core::error::ChannelError;
use tracing::{debug, error, info, warn};

/// Central registry holding all enabled channel instances.
pub struct ChannelManager {
    channels: HashMap<String, Arc<dyn Channel>>,
    running: AtomicBool,
}

impl Default for ChannelManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelManager {
    pub fn new() -> Self {
        Self {
            channels: HashMap::new(),
            running: AtomicBool::new(false),
        }
    }

    /// Register a channel adapter. Replaces any adapter with the same name.
    pub fn register(&mut self, channel: Arc<dyn Channel>) {
        let name = channel.name().to_string();
        info!(channel = %name, "Registered channel");
        self.channels.insert(name, channel);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Channel>> {
        self.channels.get(name)
    }

    /// Registered channel names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.channels.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Start every adapter against `bus`.
    pub async fn start_all(&self, bus: Arc<MessageBus>) -> Result<(), ChannelError> {
        for name in self.names() {
            if let Some(channel) = self.channels.get(&name) {
                channel.start(bus.clone()).await?;
                info!(channel = %name, "Started channel");
            }
        }
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Deliver one outbound message to the adapter owning its channel.
    pub async fn dispatch(&self, message: &OutboundMessage) -> Result<(), ChannelError> {
        let Some(channel) = self.channels.get(&message.channel) else {
            warn!(channel = %message.channel, chat = %message.chat_id, "Unknown channel, dropping outbound message");
            return Err(ChannelError::NotConfigured(format!(
                "Channel '{}' not found",
                message.channel
            )));
        };

        channel.send(message).await.inspect_err(|e| {
            error!(channel = %message.channel, chat = %message.chat_id, error = %e, "Outbound delivery failed");
        })
    }

    /// Drain the outbound queue until [`stop_all`](Self::stop_all) is called or
    /// the bus closes. Delivery failures are logged and skipped.
    pub async fn run_dispatcher(&self, bus: Arc<MessageBus>, poll_interval: Duration) {
        self.running.store(true, Ordering::SeqCst);
        info!("Outbound dispatcher started");

        while self.running.load(Ordering::SeqCst) {
            match bus.consume_outbound(poll_interval).await {
                Received::Message(msg) => {
                    debug!(channel = %msg.channel, chat = %msg.chat_id, "Dispatching outbound message");
                    let _ = self.dispatch(&msg).await;
                }
                Received::Timeout => continue,
                Received::Closed => break,
            }
        }

        info!("Outbound dispatcher stopped");
    }

    /// Stop the dispatcher and every adapter.
    pub async fn stop_all(&self) {
        self.running.store(false, Ordering::SeqCst);
        for name in self.names() {
            if let Some(channel) = self.channels.get(&name)
                && let Err(e) = channel.stop().await
            {
                warn!(channel = %name, error = %e, "Failed to stop channel");
            }
        }
    }

    /// Run health checks on all channels.
    pub async fn health_check_all(&self) -> HashMap<String, bool> {
        let mut results = HashMap::new();
        for (name, channel) in &self.channels {
            results.insert(name.clone(), channel.health_check().await);
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    struct RecordingChannel {
        name: String,
        started: AtomicBool,
        stopped: AtomicBool,
        sent: Mutex<Vec<OutboundMessage>>,
    }

    impl RecordingChannel {
        fn new(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.into(),
                started: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
                sent: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Channel for RecordingChannel {
        fn name(&self) -> &str {
            &self.name
        }

        async fn start(&self, _bus: Arc<MessageBus>) -> Result<(), ChannelError> {
            self.started.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn send(&self, message: &OutboundMessage) -> Result<(), ChannelError> {
            self.sent.lock().await.push(message.clone());
            Ok(())
        }

        async fn stop(&self) -> Result<(), ChannelError> {
            self.stopped.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn health_check(&self) -> bool {
            self.started.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn register_and_list_sorted() {
        let mut mgr = ChannelManager::new();
        assert!(mgr.is_empty());
        mgr.register(RecordingChannel::new("telegram"));
        mgr.register(RecordingChannel::new("cli"));

        assert_eq!(mgr.len(), 2);
        assert_eq!(mgr.names(), vec!["cli", "telegram"]);
        assert!(mgr.get("telegram").is_some());
        assert!(mgr.get("slack").is_none());
    }

    #[tokio::test]
    async fn start_and_stop_reach_every_channel() {
        let ch = RecordingChannel::new("test");
        let mut mgr = ChannelManager::new();
        mgr.register(ch.clone());

        assert_eq!(mgr.health_check_all().await.get("test"), Some(&false));
        mgr.start_all(Arc::new(MessageBus::new())).await.unwrap();
        assert!(ch.started.load(Ordering::SeqCst));
        assert_eq!(mgr.health_check_all().await.get("test"), Some(&true));

        mgr.stop_all().await;
        assert!(ch.stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn dispatch_routes_by_channel_name() {
        let telegram = RecordingChannel::new("telegram");
        let cli = RecordingChannel::new("cli");
        let mut mgr = ChannelManager::new();
        mgr.register(telegram.clone());
        mgr.register(cli.clone());

        mgr.dispatch(&OutboundMessage::new("telegram", "555", "hi"))
            .await
            .unwrap();

        assert_eq!(telegram.sent.lock().await.len(), 1);
        assert!(cli.sent.lock().await.is_empty());
        assert!(
            mgr.dispatch(&OutboundMessage::new("slack", "1", "x"))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn dispatcher_drains_queue_until_stopped() {
        let cli = RecordingChannel::new("cli");
        let mut mgr = ChannelManager::new();
        mgr.register(cli.clone());
        let mgr = Arc::new(mgr);
        let bus = Arc::new(MessageBus::new());

        bus.publish_outbound(OutboundMessage::new("cli", "direct", "one"))
            .unwrap();
        bus.publish_outbound(OutboundMessage::new("nowhere", "x", "lost"))
            .unwrap();
        bus.publish_outbound(OutboundMessage::new("cli", "direct", "two"))
            .unwrap();

        let runner = {
            let mgr = mgr.clone();
            let bus = bus.clone();
            tokio::spawn(async move { mgr.run_dispatcher(bus, Duration::from_millis(10)).await })
        };

        for _ in 0..100 {
            if cli.sent.lock().await.len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        mgr.stop_all().await;
        runner.await.unwrap();

        let sent = cli.sent.lock().await;
        let contents: Vec<&str> = sent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two"]);
    }
}
