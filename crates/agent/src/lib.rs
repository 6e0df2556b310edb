//! The NanoClaw agent loop.
//!
//! Each inbound message goes through:
//!
//! 1. **Policy**: access, reply rule, tool allowlist, persona
//! 2. **Fast path**: plain current-weather questions answered directly
//! 3. **Context**: system prompt + session history + the message
//! 4. **Provider/tool cycle**: tool calls run (or are refused) and their
//!    results fed back, until a text reply or the iteration cap
//! 5. **Reply**: saved to the session and published on the bus

pub mod context;
pub mod fast_path;
pub mod loop_runner;
pub mod policy_state;

pub use context::ContextBuilder;
pub use fast_path::{WeatherFastPath, extract_location, is_current_weather_query};
pub use loop_runner::{AgentLoop, CAP_FALLBACK, SYSTEM_FALLBACK, parse_origin};
pub use policy_state::{CounterSnapshot, PolicyCounters, PolicyState, SessionLocks};
