//! Wiring shared by the commands that run the agent.

use std::collections::BTreeSet;
use std::sync::Arc;

use nanoclaw_agent::AgentLoop;
use nanoclaw_config::AppConfig;
use nanoclaw_core::bus::MessageBus;
use nanoclaw_core::identity::{ContextPaths, Identity};
use nanoclaw_core::session::SessionStore;
use nanoclaw_core::tool::ToolRegistry;
use nanoclaw_policy::{PolicyEngine, ensure_policy_file};
use nanoclaw_sessions::{FileSessionStore, InMemorySessionStore};
use tracing::info;

type BoxError = Box<dyn std::error::Error>;

/// Everything a running agent needs, built from config.
pub struct Runtime {
    pub config: AppConfig,
    pub bus: Arc<MessageBus>,
    pub agent: Arc<AgentLoop>,
}

/// Load config and the policy file, then assemble the agent.
pub fn build() -> Result<Runtime, BoxError> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    config.warn_legacy_allowed_users();

    if !config.has_api_key() && config.providers.values().all(|p| p.api_key.is_none()) {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    OPENROUTER_API_KEY   (recommended)");
        eprintln!("    OPENAI_API_KEY       (for OpenAI direct)");
        eprintln!("    NANOCLAW_API_KEY     (generic)");
        eprintln!();
        eprintln!("  Or add it to {}", AppConfig::config_path().display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let router = nanoclaw_providers::build_from_config(&config);
    let provider = router
        .default_provider()
        .ok_or("No default provider configured")?;

    let bus = Arc::new(MessageBus::new());
    let weather = nanoclaw_tools::weather_source(&config);
    let tools = Arc::new(nanoclaw_tools::default_registry(
        &config,
        bus.clone(),
        weather.clone(),
    ));
    let sessions = session_store(&config);

    let identity = Identity::load(&ContextPaths {
        workspace_dir: Some(config.workspace_dir()),
        system_prompt_override: config.identity.system_prompt_override.clone(),
    });

    let mut agent = AgentLoop::from_config(&config, bus.clone(), provider, tools, sessions)
        .with_identity(identity);

    if config.agent.fast_path {
        agent = agent.with_fast_path(weather);
    }
    if let Some(engine) = load_policy(&config)? {
        agent = agent.with_policy(engine);
    }

    Ok(Runtime {
        config,
        bus,
        agent: Arc::new(agent),
    })
}

/// The policy engine, or `None` when `policy.enabled = false`. A missing
/// policy file is created with defaults first.
pub fn load_policy(config: &AppConfig) -> Result<Option<Arc<PolicyEngine>>, BoxError> {
    if !config.policy.enabled {
        info!("Policy disabled; every message is accepted and answered");
        return Ok(None);
    }
    let path = config.policy_path();
    ensure_policy_file(&path)?;
    let engine = PolicyEngine::from_file(&path)?;
    info!(
        path = %path.display(),
        rules = engine.rule_count(),
        "Policy loaded"
    );
    Ok(Some(Arc::new(engine)))
}

pub fn session_store(config: &AppConfig) -> Arc<dyn SessionStore> {
    match config.sessions.backend.as_str() {
        "memory" => Arc::new(InMemorySessionStore::new()),
        _ => Arc::new(FileSessionStore::new(config.sessions_dir())),
    }
}

/// Names of the built-in tools `config` would register.
pub fn tool_names(config: &AppConfig) -> BTreeSet<String> {
    let registry: ToolRegistry = nanoclaw_tools::default_registry(
        config,
        Arc::new(MessageBus::new()),
        nanoclaw_tools::weather_source(config),
    );
    registry.names().into_iter().map(str::to_string).collect()
}
