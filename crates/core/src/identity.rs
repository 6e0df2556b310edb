//! Identity: the base system prompt.
//!
//! The prompt is assembled from optional markdown files in the agent
//! workspace (`~/.nanoclaw/workspace/` by default), in this order:
//!
//! 1. `IDENTITY.md`: who the agent is
//! 2. `SOUL.md`: personality and tone
//! 3. `USER.md`: facts about the user
//! 4. `AGENTS.md`: operating instructions
//! 5. `TOOLS.md`: notes on tool usage
//!
//! Missing or blank files are skipped. With no files at all a built-in prompt
//! is used. Policy personas are layered on top of this by the agent's context
//! builder, not here.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Workspace bootstrap files, in prompt order, with their section tags.
pub const BOOTSTRAP_FILES: &[(&str, &str)] = &[
    ("IDENTITY.md", "identity"),
    ("SOUL.md", "personality"),
    ("USER.md", "user_context"),
    ("AGENTS.md", "instructions"),
    ("TOOLS.md", "tool_notes"),
];

const DEFAULT_NAME: &str = "NanoClaw";

/// The agent's identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    /// The agent's name
    pub name: String,

    /// System prompt built from workspace files
    pub system_prompt: String,

    /// Which files were loaded (for diagnostics)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub loaded_files: Vec<String>,
}

/// Where to look for identity files.
#[derive(Debug, Clone, Default)]
pub struct ContextPaths {
    /// Agent workspace holding the bootstrap files
    pub workspace_dir: Option<PathBuf>,

    /// Prompt override from config (skips file loading)
    pub system_prompt_override: Option<String>,
}

impl Identity {
    /// The identity used when no workspace files exist.
    pub fn default_identity() -> Self {
        Self {
            name: DEFAULT_NAME.into(),
            system_prompt: concat!(
                "You are NanoClaw, a helpful AI assistant reachable over chat. ",
                "You have tools for files, shell commands, the web, and sending messages. ",
                "Use them when they help; answer directly when they don't. ",
                "Keep replies short and suited to a chat window.",
            )
            .into(),
            loaded_files: Vec::new(),
        }
    }

    /// Assemble the identity from `paths`.
    pub fn load(paths: &ContextPaths) -> Self {
        if let Some(prompt) = &paths.system_prompt_override {
            debug!("Using configured system prompt override");
            return Self {
                system_prompt: prompt.clone(),
                loaded_files: vec!["<override>".into()],
                ..Self::default_identity()
            };
        }

        let Some(dir) = &paths.workspace_dir else {
            return Self::default_identity();
        };

        let mut prompt = String::new();
        let mut loaded_files = Vec::new();
        let mut name = None;

        for (file, tag) in BOOTSTRAP_FILES {
            let Some(content) = read_non_empty(&dir.join(file)) else {
                continue;
            };
            if *file == "IDENTITY.md" {
                name = extract_name(&content);
            }
            if !prompt.is_empty() {
                prompt.push('\n');
            }
            prompt.push_str(&format!("<{tag}>\n{}\n</{tag}>\n", content.trim()));
            loaded_files.push(dir.join(file).display().to_string());
        }

        if loaded_files.is_empty() {
            debug!(dir = %dir.display(), "No workspace identity files, using built-in prompt");
            return Self::default_identity();
        }

        debug!(
            files_loaded = loaded_files.len(),
            prompt_len = prompt.len(),
            "Identity loaded from workspace"
        );

        Self {
            name: name.unwrap_or_else(|| DEFAULT_NAME.into()),
            system_prompt: prompt,
            loaded_files,
        }
    }

    /// Rough token estimate (4 chars ≈ 1 token).
    pub fn estimated_tokens(&self) -> usize {
        self.system_prompt.len() / 4
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self::default_identity()
    }
}

fn read_non_empty(path: &Path) -> Option<String> {
    std::fs::read_to_string(path)
        .ok()
        .filter(|content| !content.trim().is_empty())
}

/// Pull the agent name out of IDENTITY.md: "You are <Name>" or the first H1.
fn extract_name(content: &str) -> Option<String> {
    if let Some(pos) = content.find("You are ") {
        let name: String = content[pos + 8..]
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
            .collect();
        if !name.is_empty() {
            return Some(name);
        }
    }

    content
        .lines()
        .filter_map(|line| line.trim().strip_prefix("# "))
        .map(str::trim)
        .find(|heading| !heading.is_empty() && *heading != "Identity")
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn no_workspace_uses_builtin_prompt() {
        let id = Identity::load(&ContextPaths::default());
        assert_eq!(id.name, "NanoClaw");
        assert!(id.loaded_files.is_empty());
        assert!(!id.system_prompt.is_empty());
    }

    #[test]
    fn override_skips_files() {
        let id = Identity::load(&ContextPaths {
            system_prompt_override: Some("Custom prompt".into()),
            ..Default::default()
        });
        assert_eq!(id.system_prompt, "Custom prompt");
    }

    #[test]
    fn loads_files_in_bootstrap_order() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("AGENTS.md"), "Answer in English.").unwrap();
        fs::write(tmp.path().join("IDENTITY.md"), "You are Pico, a home assistant.").unwrap();
        fs::write(tmp.path().join("SOUL.md"), "   ").unwrap();

        let id = Identity::load(&ContextPaths {
            workspace_dir: Some(tmp.path().to_path_buf()),
            ..Default::default()
        });

        assert_eq!(id.name, "Pico");
        assert_eq!(id.loaded_files.len(), 2);
        let identity_at = id.system_prompt.find("<identity>").unwrap();
        let instructions_at = id.system_prompt.find("<instructions>").unwrap();
        assert!(identity_at < instructions_at);
        assert!(!id.system_prompt.contains("<personality>"));
    }

    #[test]
    fn missing_workspace_falls_back() {
        let id = Identity::load(&ContextPaths {
            workspace_dir: Some(PathBuf::from("/nonexistent/nanoclaw/workspace")),
            ..Default::default()
        });
        assert!(id.loaded_files.is_empty());
        assert_eq!(id.name, "NanoClaw");
    }

    #[test]
    fn extract_name_patterns() {
        assert_eq!(extract_name("You are Jarvis, an AI butler."), Some("Jarvis".into()));
        assert_eq!(extract_name("# Identity\n\n# CodeBot\n"), Some("CodeBot".into()));
        assert_eq!(extract_name("no name here"), None);
    }
}
