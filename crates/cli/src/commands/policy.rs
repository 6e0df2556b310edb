//! `nanoclaw policy`: Policy file management.

use nanoclaw_config::AppConfig;
use nanoclaw_policy::{PolicyEngine, ensure_policy_file};

use crate::runtime;

fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}

/// Print the effective policy (defaults when the file is missing).
pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let engine = PolicyEngine::from_file(&config.policy_path())?;
    println!("{}", serde_json::to_string_pretty(engine.config())?);
    Ok(())
}

pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let path = load_config()?.policy_path();
    if ensure_policy_file(&path)? {
        println!("✅ Created {}", path.display());
    } else {
        println!("  Policy already exists: {}", path.display());
    }
    Ok(())
}

/// Parse the policy and report tool names no built-in tool provides.
pub async fn check() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let path = config.policy_path();

    println!("Checking {}", path.display());
    let engine = PolicyEngine::from_file(&path).inspect_err(|e| println!("   ❌ {e}"))?;
    println!("   ✅ Parsed: {} rule(s)", engine.rule_count());

    let unknown = engine.validate(&runtime::tool_names(&config));
    if unknown.is_empty() {
        println!("   ✅ All referenced tools exist");
    } else {
        for name in &unknown {
            println!("   ⚠️  Unknown tool: {name}");
        }
    }
    Ok(())
}
