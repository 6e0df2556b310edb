//! Message tool: lets the agent send a message proactively.
//!
//! Without an explicit target the message goes to the conversation the
//! current turn came from.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use nanoclaw_core::bus::{MessageBus, OutboundMessage};
use nanoclaw_core::error::ToolError;
use nanoclaw_core::tool::{Tool, ToolContext, ToolResult};
use tracing::debug;

pub struct MessageTool {
    bus: Arc<MessageBus>,
    context: Mutex<Option<ToolContext>>,
}

impl MessageTool {
    pub fn new(bus: Arc<MessageBus>) -> Self {
        Self {
            bus,
            context: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Tool for MessageTool {
    fn name(&self) -> &str {
        "message"
    }

    fn description(&self) -> &str {
        "Send a message to the user. Defaults to the current conversation; \
         channel and chat_id may name another one."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "content": {
                    "type": "string",
                    "description": "The message content to send"
                },
                "channel": {
                    "type": "string",
                    "description": "Optional target channel (telegram, cli, ...)"
                },
                "chat_id": {
                    "type": "string",
                    "description": "Optional target chat ID"
                }
            },
            "required": ["content"]
        })
    }

    fn set_context(&self, context: &ToolContext) {
        *self
            .context
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(context.clone());
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let content = arguments["content"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'content' argument".into()))?;

        let current = self
            .context
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();

        let channel = arguments["channel"]
            .as_str()
            .map(str::to_string)
            .or_else(|| current.as_ref().map(|c| c.channel.clone()));
        let chat_id = arguments["chat_id"]
            .as_str()
            .map(str::to_string)
            .or_else(|| current.as_ref().map(|c| c.chat_id.clone()));

        let (Some(channel), Some(chat_id)) = (channel, chat_id) else {
            return Ok(ToolResult::error("No target channel/chat specified"));
        };

        self.bus
            .publish_outbound(OutboundMessage::new(&channel, &chat_id, content))
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "message".into(),
                reason: e.to_string(),
            })?;

        debug!(channel = %channel, chat = %chat_id, "Proactive message queued");
        Ok(ToolResult::ok(format!("Message sent to {channel}:{chat_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nanoclaw_core::bus::Received;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn sends_to_current_conversation() {
        let bus = Arc::new(MessageBus::new());
        let tool = MessageTool::new(bus.clone());
        tool.set_context(&ToolContext::new("telegram", "555"));

        let result = tool.execute(json!({"content": "done!"})).await.unwrap();
        assert_eq!(result.output, "Message sent to telegram:555");

        match bus.consume_outbound(Duration::from_millis(50)).await {
            Received::Message(msg) => {
                assert_eq!(msg.channel, "telegram");
                assert_eq!(msg.chat_id, "555");
                assert_eq!(msg.content, "done!");
            }
            _ => panic!("expected an outbound message"),
        }
    }

    #[tokio::test]
    async fn explicit_target_wins() {
        let bus = Arc::new(MessageBus::new());
        let tool = MessageTool::new(bus.clone());
        tool.set_context(&ToolContext::new("telegram", "555"));

        tool.execute(json!({"content": "hi", "channel": "discord", "chat_id": "42"}))
            .await
            .unwrap();
        match bus.consume_outbound(Duration::from_millis(50)).await {
            Received::Message(msg) => assert_eq!(msg.channel, "discord"),
            _ => panic!("expected an outbound message"),
        }
    }

    #[tokio::test]
    async fn no_context_no_target_is_soft_error() {
        let tool = MessageTool::new(Arc::new(MessageBus::new()));
        let result = tool.execute(json!({"content": "hello"})).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.output, "Error: No target channel/chat specified");
    }
}
