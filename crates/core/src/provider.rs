//! Provider trait: the abstraction over LLM backends.
//!
//! A Provider knows how to send a conversation (plus the tool schemas the
//! model may call) to an LLM and get a complete response back.
//!
//! Implementations: OpenAI-compatible endpoints (OpenRouter, OpenAI, Ollama,
//! vLLM, ...), and scripted mocks in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::Message;
use crate::tool::ToolCall;

/// Configuration for a provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "anthropic/claude-sonnet-4", "gpt-4o")
    pub model: String,

    /// The conversation messages
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Tools the model may call on this turn (already filtered by policy)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

impl ProviderRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: default_temperature(),
            max_tokens: None,
            tools: Vec::new(),
        }
    }
}

fn default_temperature() -> f32 {
    0.7
}

/// A tool definition sent to the LLM so it knows what tools it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// A complete response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated assistant message (text and/or tool-call intents)
    pub message: Message,

    /// Token usage statistics
    pub usage: Option<Usage>,

    /// Which model actually responded (may differ from requested)
    pub model: String,

    /// Why generation stopped ("stop", "tool_calls", "length", ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

impl ProviderResponse {
    /// The final text of the response.
    pub fn content(&self) -> &str {
        &self.message.content
    }

    /// Whether the model asked for at least one tool call.
    pub fn has_tool_calls(&self) -> bool {
        !self.message.tool_calls.is_empty()
    }

    /// Tool-call intents in the order the model issued them, with their
    /// argument strings parsed into JSON values.
    ///
    /// Arguments that are empty or not valid JSON become an empty object so
    /// the tool itself reports what is missing.
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.message
            .tool_calls
            .iter()
            .map(|tc| ToolCall {
                id: tc.id.clone(),
                name: tc.name.clone(),
                arguments: serde_json::from_str(&tc.arguments)
                    .ok()
                    .filter(serde_json::Value::is_object)
                    .unwrap_or_else(|| serde_json::json!({})),
            })
            .collect()
    }
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The core Provider trait.
///
/// The agent loop calls `complete()` without knowing which backend is being
/// used. Errors are not retried by the loop; they end the current turn.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openrouter").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError>;

    /// The model used when the caller does not name one.
    fn default_model(&self) -> Option<&str> {
        None
    }

    /// Health check: can we reach the provider?
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageToolCall;

    fn response_with_calls(calls: Vec<MessageToolCall>) -> ProviderResponse {
        ProviderResponse {
            message: Message::assistant_with_tool_calls("", calls),
            usage: None,
            model: "test".into(),
            finish_reason: Some("tool_calls".into()),
        }
    }

    #[test]
    fn provider_request_defaults() {
        let req = ProviderRequest::new("gpt-4o", vec![]);
        assert!((req.temperature - 0.7).abs() < f32::EPSILON);
        assert!(req.tools.is_empty());
        assert!(req.max_tokens.is_none());
    }

    #[test]
    fn text_response_has_no_tool_calls() {
        let resp = ProviderResponse {
            message: Message::assistant("done"),
            usage: None,
            model: "test".into(),
            finish_reason: Some("stop".into()),
        };
        assert!(!resp.has_tool_calls());
        assert!(resp.tool_calls().is_empty());
        assert_eq!(resp.content(), "done");
    }

    #[test]
    fn tool_calls_parse_arguments_in_order() {
        let resp = response_with_calls(vec![
            MessageToolCall {
                id: "a".into(),
                name: "read_file".into(),
                arguments: r#"{"path":"x.txt"}"#.into(),
            },
            MessageToolCall {
                id: "b".into(),
                name: "exec".into(),
                arguments: "not json".into(),
            },
        ]);

        let calls = resp.tool_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].id, "a");
        assert_eq!(calls[0].arguments["path"], "x.txt");
        assert_eq!(calls[1].id, "b");
        assert_eq!(calls[1].arguments, serde_json::json!({}));
    }

    #[test]
    fn tool_definition_serialization() {
        let tool = ToolDefinition {
            name: "exec".into(),
            description: "Execute a shell command".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "command": { "type": "string", "description": "The command to run" }
                },
                "required": ["command"]
            }),
        };
        let json = serde_json::to_string(&tool).unwrap();
        assert!(json.contains("exec"));
        assert!(json.contains("command"));
    }
}
