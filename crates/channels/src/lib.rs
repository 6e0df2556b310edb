//! Chat channel implementations for NanoClaw.
//!
//! Each channel connects to a chat surface and relays messages to/from
//! the agent through the message bus.
//!
//! Available channels:
//! - **CLI**: Interactive terminal chat (stdin/stdout)
//! - **Manager**: Owns the adapters and routes outbound replies

pub mod cli;
pub mod manager;

pub use cli::CliChannel;
pub use manager::ChannelManager;
