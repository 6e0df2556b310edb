//! `nanoclaw onboard`: First-time setup.

use nanoclaw_config::AppConfig;
use nanoclaw_policy::ensure_policy_file;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = AppConfig::config_path();

    println!("NanoClaw — First-Time Setup");
    println!("===========================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("✅ Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    let config = if config_path.exists() {
        println!("  Config already exists: {}", config_path.display());
        AppConfig::load_from(&config_path)?
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("✅ Created config.toml at: {}", config_path.display());
        AppConfig::default()
    };

    let workspace_dir = config.workspace_dir();
    if !workspace_dir.exists() {
        std::fs::create_dir_all(&workspace_dir)?;
        println!("✅ Created workspace directory: {}", workspace_dir.display());
    }

    let identity_path = workspace_dir.join("IDENTITY.md");
    if !identity_path.exists() {
        std::fs::write(
            &identity_path,
            concat!(
                "# Identity\n\n",
                "You are NanoClaw, a helpful assistant reachable over chat.\n",
                "Keep replies short and suited to a chat window.\n",
            ),
        )?;
        println!("✅ Created IDENTITY.md");
    }

    let policy_path = config.policy_path();
    if ensure_policy_file(&policy_path)? {
        println!("✅ Created policy.json at: {}", policy_path.display());
    } else {
        println!("  Policy already exists: {}", policy_path.display());
    }

    let personas_dir = policy_path
        .parent()
        .map(|dir| dir.join("personas"))
        .unwrap_or_else(|| config_dir.join("personas"));
    std::fs::create_dir_all(&personas_dir)?;

    println!("\nNext steps:");
    println!("   1. Add your API key to {}", config_path.display());
    println!("   2. Adjust who may talk to the agent in {}", policy_path.display());
    println!("   3. Run: nanoclaw agent\n");

    Ok(())
}
