//! Context assembly: the message list sent to the provider.
//!
//! Layout of one turn:
//!
//! | # | Entry | Source |
//! |---|-------|--------|
//! | 1 | System | identity + persona + session info |
//! | 2 | History | session entries, oldest first |
//! | 3 | User | the current message (with media) |
//! | 4+ | Assistant / Tool | appended per iteration |

use chrono::Utc;
use nanoclaw_core::identity::Identity;
use nanoclaw_core::message::{Message, MessageToolCall};

/// Builds provider context from the agent identity.
#[derive(Debug, Clone, Default)]
pub struct ContextBuilder {
    identity: Identity,
}

impl ContextBuilder {
    pub fn new(identity: Identity) -> Self {
        Self { identity }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// The system prompt for one turn.
    pub fn system_prompt(&self, persona: Option<&str>, channel: &str, chat_id: &str) -> String {
        let mut prompt = self.identity.system_prompt.trim_end().to_string();

        if let Some(persona) = persona.map(str::trim).filter(|p| !p.is_empty()) {
            prompt.push_str("\n\n## Persona\n");
            prompt.push_str(persona);
        }

        prompt.push_str(&format!(
            "\n\n## Current Session\nChannel: {channel}\nChat ID: {chat_id}\nTime: {}",
            Utc::now().format("%Y-%m-%d %H:%M UTC")
        ));
        prompt
    }

    /// System entry, then `history`, then the current user message.
    pub fn build_messages(
        &self,
        history: Vec<Message>,
        current_message: &str,
        persona: Option<&str>,
        media: &[String],
        channel: &str,
        chat_id: &str,
    ) -> Vec<Message> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(self.system_prompt(persona, channel, chat_id)));
        messages.extend(history);

        let mut user = Message::user(current_message);
        if !media.is_empty() {
            user = user.with_media(media.to_vec());
        }
        messages.push(user);
        messages
    }

    /// Append the assistant turn that requested `tool_calls`.
    pub fn add_assistant_message(
        messages: &mut Vec<Message>,
        content: &str,
        tool_calls: Vec<MessageToolCall>,
    ) {
        messages.push(Message::assistant_with_tool_calls(content, tool_calls));
    }

    /// Append the result of one tool call.
    pub fn add_tool_result(
        messages: &mut Vec<Message>,
        tool_call_id: &str,
        tool_name: &str,
        result: &str,
    ) {
        messages.push(Message::tool_result(tool_call_id, tool_name, result));
    }
}
