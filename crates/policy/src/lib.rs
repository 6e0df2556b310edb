//! Policy engine for NanoClaw: who may talk to the agent, when it answers,
//! which tools it may use, and which persona it wears.
//!
//! Provides:
//! - **Schema**: the `policy.json` document
//! - **Engine**: pure evaluation of an actor against the document
//! - **Loader**: reading, writing, and bootstrapping the document

pub mod engine;
pub mod error;
pub mod loader;
pub mod matcher;
pub mod schema;

pub use engine::{ActorContext, PolicyDecision, PolicyEngine, ReplyVerdict, sender_aliases};
pub use error::PolicyError;
pub use loader::{ensure_policy_file, get_policy_path, load_policy, save_policy};
pub use schema::{Access, PolicyConfig, PolicyDefaults, PolicyRule, ReplyMode, RuleMatch, Scope};
