//! `nanoclaw status`: Show system status.

use nanoclaw_config::AppConfig;
use nanoclaw_policy::PolicyEngine;

use crate::runtime;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let policy_path = config.policy_path();

    println!("NanoClaw Status");
    println!("===============");
    println!("  Config:       {}", AppConfig::config_path().display());
    println!("  Workspace:    {}", config.workspace_dir().display());
    println!("  Provider:     {}", config.default_provider);
    println!("  Model:        {}", config.default_model);
    println!("  API key:      {}", if config.has_api_key() { "set" } else { "missing" });
    println!("  Sessions:     {} ({})", config.sessions.backend, config.sessions_dir().display());
    println!("  Fast path:    {}", if config.agent.fast_path { "enabled" } else { "disabled" });
    println!("  Tools:        {}", runtime::tool_names(&config).into_iter().collect::<Vec<_>>().join(", "));
    println!("  Policy file:  {}", policy_path.display());

    if !config.policy.enabled {
        println!("  Policy:       disabled");
    } else if !policy_path.exists() {
        println!("  Policy:       defaults (no file; run `nanoclaw policy init`)");
    } else {
        match PolicyEngine::from_file(&policy_path) {
            Ok(engine) => println!("  Policy:       {} rule(s)", engine.rule_count()),
            Err(e) => println!("  Policy:       ❌ {e}"),
        }
    }

    let legacy = config.warn_legacy_allowed_users();
    if !legacy.is_empty() {
        println!("\n  ⚠️  allowed_users is ignored for: {}", legacy.join(", "));
    }

    if AppConfig::config_path().exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file — run `nanoclaw onboard` first");
    }

    Ok(())
}
