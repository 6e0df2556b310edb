//! # NanoClaw Core
//!
//! Domain types, traits, and error definitions for the NanoClaw agent runtime.
//! This crate defines the contracts every other crate implements against:
//! the message bus, the provider, tool, channel and session traits.
//!
//! ## Design Philosophy
//!
//! Every collaborator of the agent loop is a trait here. Implementations live
//! in their respective crates, so tests can swap in scripted providers and
//! recording tools without touching the loop.

pub mod bus;
pub mod channel;
pub mod error;
pub mod identity;
pub mod message;
pub mod provider;
pub mod session;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use bus::{InboundMessage, MessageBus, OutboundMessage, Received};
pub use channel::Channel;
pub use error::{Error, Result};
pub use identity::{ContextPaths, Identity};
pub use message::{Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use session::{HistoryEntry, Session, SessionStore};
pub use tool::{Tool, ToolCall, ToolContext, ToolRegistry, ToolResult};
