//! Reading and writing `policy.json`.

use std::path::{Path, PathBuf};

use nanoclaw_config::AppConfig;
use tracing::info;

use crate::error::PolicyError;
use crate::schema::PolicyConfig;

/// The default policy location, `~/.nanoclaw/policy.json`.
pub fn get_policy_path() -> PathBuf {
    AppConfig::config_dir().join("policy.json")
}

/// Load the policy at `path`. A missing file yields the default policy.
pub fn load_policy(path: &Path) -> Result<PolicyConfig, PolicyError> {
    if !path.exists() {
        info!(path = %path.display(), "No policy file found, using default policy");
        return Ok(PolicyConfig::default());
    }

    let content = std::fs::read_to_string(path).map_err(|e| PolicyError::Read {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    serde_json::from_str(&content).map_err(|e| PolicyError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Write `policy` to `path` as pretty JSON, creating parent directories.
pub fn save_policy(policy: &PolicyConfig, path: &Path) -> Result<(), PolicyError> {
    let write_err = |e: std::io::Error| PolicyError::Write {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }

    let json = serde_json::to_string_pretty(policy).map_err(|e| PolicyError::Write {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    std::fs::write(path, json + "\n").map_err(write_err)
}

/// Create the default policy file at `path` unless one exists.
/// Returns `true` when a file was written.
pub fn ensure_policy_file(path: &Path) -> Result<bool, PolicyError> {
    if path.exists() {
        return Ok(false);
    }
    save_policy(&PolicyConfig::default(), path)?;
    info!(path = %path.display(), "Created default policy file");
    Ok(true)
}
