//! Built-in tool implementations for NanoClaw.
//!
//! Tools give the agent the ability to interact with the world:
//! read and write files, run shell commands, fetch and search the web,
//! message users, check the weather, and read host metrics.

pub mod exec;
pub mod filesystem;
pub mod host_stats;
pub mod message;
pub mod weather;
pub mod web;

use std::sync::Arc;
use std::time::Duration;

use nanoclaw_config::AppConfig;
use nanoclaw_core::bus::MessageBus;
use nanoclaw_core::tool::ToolRegistry;

pub use exec::ExecTool;
pub use filesystem::{
    EditFileTool, ListDirTool, PathGuard, PathValidationError, ReadFileTool, WriteFileTool,
};
pub use host_stats::{HostStats, HostStatsTool};
pub use message::MessageTool;
pub use weather::{WeatherSource, WeatherTool, WttrClient, format_report, usable_report};
pub use web::{WebFetchTool, WebSearchTool};

/// The weather backend named by config (wttr.in unless overridden).
pub fn weather_source(config: &AppConfig) -> Arc<dyn WeatherSource> {
    let base = config
        .tools
        .weather_base_url
        .as_deref()
        .unwrap_or(weather::DEFAULT_WTTR_URL);
    Arc::new(WttrClient::new(base))
}

/// Create the registry of built-in tools.
///
/// With `agent.restrict_to_workspace` the file tools and the `exec` working
/// directory are confined to the workspace; `exec` always starts there.
pub fn default_registry(
    config: &AppConfig,
    bus: Arc<MessageBus>,
    weather: Arc<dyn WeatherSource>,
) -> ToolRegistry {
    let workspace = config.workspace_dir();
    let guard = if config.agent.restrict_to_workspace {
        PathGuard::restricted_to(&workspace)
    } else {
        PathGuard::unrestricted()
    };

    let mut registry = ToolRegistry::new();
    registry.register(Box::new(ReadFileTool::new(guard.clone())));
    registry.register(Box::new(WriteFileTool::new(guard.clone())));
    registry.register(Box::new(EditFileTool::new(guard.clone())));
    registry.register(Box::new(ListDirTool::new(guard.clone())));

    let mut exec = ExecTool::new(
        config.tools.exec.allowed_commands.clone(),
        Duration::from_secs(config.tools.exec.timeout_secs),
    )
    .with_working_dir(workspace);
    if config.agent.restrict_to_workspace {
        exec = exec.with_path_guard(guard);
    }
    registry.register(Box::new(exec));
    registry.register(Box::new(WebFetchTool::new()));
    registry.register(Box::new(WebSearchTool::new(
        config.tools.brave_api_key.clone(),
    )));
    registry.register(Box::new(MessageTool::new(bus)));
    registry.register(Box::new(WeatherTool::new(weather)));
    registry.register(Box::new(HostStatsTool));
    registry
}
