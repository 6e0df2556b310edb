//! Configuration loading, validation, and management for NanoClaw.
//!
//! Loads configuration from `~/.nanoclaw/config.toml` with environment
//! variable overrides. Validates all settings at startup.
//!
//! Who may talk to the agent, when it replies, and which tools it may use are
//! not configured here: that lives in the policy document (`policy.json`,
//! see `nanoclaw-policy`).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// The root configuration structure.
///
/// Maps directly to `~/.nanoclaw/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Agent loop settings
    #[serde(default)]
    pub agent: AgentSettings,

    /// Policy document location
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Session storage
    #[serde(default)]
    pub sessions: SessionsConfig,

    /// Built-in tool settings
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Channel configurations
    #[serde(default)]
    pub channels_config: HashMap<String, ChannelConfig>,

    /// Identity configuration
    #[serde(default)]
    pub identity: IdentityConfig,
}

fn default_provider() -> String {
    "openrouter".into()
}
fn default_model() -> String {
    "anthropic/claude-sonnet-4".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_true() -> bool {
    true
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("agent", &self.agent)
            .field("policy", &self.policy)
            .field("sessions", &self.sessions)
            .field("tools", &self.tools)
            .field("providers", &self.providers)
            .field("channels_config", &self.channels_config)
            .field("identity", &self.identity)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

impl std::fmt::Debug for ToolsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolsConfig")
            .field("exec", &self.exec)
            .field("brave_api_key", &redact(&self.brave_api_key))
            .field("weather_base_url", &self.weather_base_url)
            .finish()
    }
}

/// Settings for the orchestration loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Upper bound on provider calls per turn
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// How long one bus poll waits before re-checking the stop flag
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Answer simple "weather now" questions without the model
    #[serde(default = "default_true")]
    pub fast_path: bool,

    /// Agent workspace (identity files, default exec directory)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,

    /// Confine file and exec tools to the workspace
    #[serde(default)]
    pub restrict_to_workspace: bool,

    /// How many past session entries are replayed into the context
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_max_iterations() -> usize {
    20
}
fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_history_limit() -> usize {
    50
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            poll_interval_ms: default_poll_interval_ms(),
            fast_path: true,
            workspace: None,
            restrict_to_workspace: false,
            history_limit: default_history_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// When false, every sender is accepted and answered with every tool
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Policy document path (default `~/.nanoclaw/policy.json`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// "file" or "memory"
    #[serde(default = "default_sessions_backend")]
    pub backend: String,

    /// Session directory (default `~/.nanoclaw/sessions`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

fn default_sessions_backend() -> String {
    "file".into()
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            backend: default_sessions_backend(),
            dir: None,
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub exec: ExecToolConfig,

    /// Brave Search API key for `web_search`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brave_api_key: Option<String>,

    /// Override the wttr.in endpoint (used by tests and mirrors)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather_base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecToolConfig {
    #[serde(default = "default_exec_timeout")]
    pub timeout_secs: u64,

    /// If non-empty, only these base commands may run
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_commands: Vec<String>,
}

fn default_exec_timeout() -> u64 {
    60
}

impl Default for ExecToolConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_exec_timeout(),
            allowed_commands: Vec::new(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Deprecated. Sender gating moved to policy.json; this is ignored.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_users: Vec<String>,

    /// Channel-specific settings (varies by platform)
    #[serde(flatten)]
    pub settings: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Override the system prompt entirely (skips workspace files)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_override: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.nanoclaw/config.toml).
    ///
    /// Also checks environment variables for API keys:
    /// - `NANOCLAW_API_KEY` (highest priority)
    /// - `OPENROUTER_API_KEY`
    /// - `OPENAI_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::config_path())?;

        if config.api_key.is_none() {
            config.api_key = std::env::var("NANOCLAW_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENROUTER_API_KEY").ok())
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(provider) = std::env::var("NANOCLAW_PROVIDER") {
            config.default_provider = provider;
        }

        if let Ok(model) = std::env::var("NANOCLAW_MODEL") {
            config.default_model = model;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".nanoclaw")
    }

    /// Get the configuration file path.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// The agent workspace: `agent.workspace` or `~/.nanoclaw/workspace`.
    pub fn workspace_dir(&self) -> PathBuf {
        self.agent
            .workspace
            .as_deref()
            .map(expand_tilde)
            .unwrap_or_else(|| Self::config_dir().join("workspace"))
    }

    /// The policy document: `policy.path` or `~/.nanoclaw/policy.json`.
    pub fn policy_path(&self) -> PathBuf {
        self.policy
            .path
            .as_deref()
            .map(expand_tilde)
            .unwrap_or_else(|| Self::config_dir().join("policy.json"))
    }

    /// The session directory: `sessions.dir` or `~/.nanoclaw/sessions`.
    pub fn sessions_dir(&self) -> PathBuf {
        self.sessions
            .dir
            .as_deref()
            .map(expand_tilde)
            .unwrap_or_else(|| Self::config_dir().join("sessions"))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be at least 1".into(),
            ));
        }

        if self.agent.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "agent.poll_interval_ms must be > 0".into(),
            ));
        }

        if !matches!(self.sessions.backend.as_str(), "file" | "memory") {
            return Err(ConfigError::ValidationError(format!(
                "sessions.backend must be \"file\" or \"memory\", got \"{}\"",
                self.sessions.backend
            )));
        }

        Ok(())
    }

    /// Log a deprecation warning for every channel still carrying
    /// `allowed_users`. Returns the offending channel names.
    pub fn warn_legacy_allowed_users(&self) -> Vec<String> {
        let mut legacy: Vec<String> = self
            .channels_config
            .iter()
            .filter(|(_, ch)| !ch.allowed_users.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        legacy.sort();

        for name in &legacy {
            warn!(
                channel = %name,
                policy = %self.policy_path().display(),
                "channels_config.{name}.allowed_users is deprecated and ignored; \
                 move sender rules to the policy file"
            );
        }
        legacy
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            agent: AgentSettings::default(),
            policy: PolicyConfig::default(),
            sessions: SessionsConfig::default(),
            tools: ToolsConfig::default(),
            providers: HashMap::new(),
            channels_config: HashMap::new(),
            identity: IdentityConfig::default(),
        }
    }
}

/// Expand a leading `~` to the home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        return dirs_home();
    }
    match path.strip_prefix("~/") {
        Some(rest) => dirs_home().join(rest),
        None => PathBuf::from(path),
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
