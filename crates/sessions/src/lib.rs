//! Session storage for NanoClaw.
//!
//! Provides:
//! - **InMemorySessionStore**: process-lifetime storage (tests, ephemeral runs)
//! - **FileSessionStore**: one JSONL file per conversation under
//!   `~/.nanoclaw/sessions/`

pub mod file;
pub mod in_memory;

pub use file::FileSessionStore;
pub use in_memory::InMemorySessionStore;
