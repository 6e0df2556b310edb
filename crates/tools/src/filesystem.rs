//! File tools: `read_file`, `write_file`, `edit_file`, `list_dir`.
//!
//! Every path goes through [`PathGuard`] first. With a workspace restriction
//! configured, paths resolving outside it are refused; sensitive locations
//! (`~/.ssh`, `/etc/shadow`, ...) are always refused.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use nanoclaw_config::expand_tilde;
use nanoclaw_core::error::ToolError;
use nanoclaw_core::tool::{Tool, ToolResult};
use tracing::debug;

/// Prefixes no file tool may touch.
pub const DEFAULT_FORBIDDEN_PATHS: &[&str] = &[
    "~/.ssh",
    "~/.gnupg",
    "~/.aws",
    "/etc/shadow",
    "/etc/sudoers",
];

/// Error returned when path validation fails.
#[derive(Debug, thiserror::Error)]
pub enum PathValidationError {
    #[error("Path '{path}' is outside allowed directory {root}")]
    OutsideAllowedDir { path: String, root: String },

    #[error("Path '{path}' matches forbidden pattern '{pattern}'")]
    ForbiddenPath { path: String, pattern: String },

    #[error("Path traversal detected in '{path}'")]
    PathTraversal { path: String },

    #[error("Failed to resolve path '{path}': {reason}")]
    ResolveFailed { path: String, reason: String },
}

/// Resolves tool-supplied paths and enforces the sandbox.
#[derive(Debug, Clone)]
pub struct PathGuard {
    allowed_dir: Option<PathBuf>,
    forbidden_paths: Vec<String>,
}

impl Default for PathGuard {
    fn default() -> Self {
        Self::unrestricted()
    }
}

impl PathGuard {
    /// Any path except the forbidden defaults.
    pub fn unrestricted() -> Self {
        Self {
            allowed_dir: None,
            forbidden_paths: DEFAULT_FORBIDDEN_PATHS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Only paths under `dir`. Relative paths resolve against it.
    pub fn restricted_to(dir: impl Into<PathBuf>) -> Self {
        Self {
            allowed_dir: Some(dir.into()),
            ..Self::unrestricted()
        }
    }

    pub fn allowed_dir(&self) -> Option<&Path> {
        self.allowed_dir.as_deref()
    }

    /// Validate `path` and return its resolved absolute form.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, PathValidationError> {
        let normalized = path.replace('\\', "/");
        if normalized.contains("../") || normalized.contains("/..") || normalized == ".." {
            return Err(PathValidationError::PathTraversal { path: path.into() });
        }

        let expanded = expand_tilde(path);
        let absolute = if expanded.is_absolute() {
            expanded
        } else if let Some(dir) = &self.allowed_dir {
            dir.join(expanded)
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(&expanded))
                .unwrap_or(expanded)
        };

        let resolved = resolve_lenient(&absolute).map_err(|reason| {
            PathValidationError::ResolveFailed {
                path: path.into(),
                reason,
            }
        })?;

        for pattern in &self.forbidden_paths {
            if resolved.starts_with(expand_tilde(pattern)) {
                return Err(PathValidationError::ForbiddenPath {
                    path: path.into(),
                    pattern: pattern.clone(),
                });
            }
        }

        if let Some(dir) = &self.allowed_dir {
            let root = resolve_lenient(dir).unwrap_or_else(|_| dir.clone());
            if !resolved.starts_with(&root) {
                return Err(PathValidationError::OutsideAllowedDir {
                    path: path.into(),
                    root: root.display().to_string(),
                });
            }
        }

        Ok(resolved)
    }

    fn check(&self, tool_name: &str, path: &str) -> Result<PathBuf, ToolError> {
        self.resolve(path).map_err(|e| ToolError::PermissionDenied {
            tool_name: tool_name.into(),
            reason: e.to_string(),
        })
    }
}

/// Canonicalize the longest existing ancestor of `path` and re-append the
/// components that do not exist yet (files about to be written).
fn resolve_lenient(path: &Path) -> Result<PathBuf, String> {
    let mut existing = path;
    let mut missing = Vec::new();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return Ok(path.to_path_buf()),
        }
    }

    let mut resolved = existing.canonicalize().map_err(|e| e.to_string())?;
    for name in missing.iter().rev() {
        resolved.push(name);
    }
    Ok(resolved)
}

fn required_str<'a>(arguments: &'a serde_json::Value, key: &str) -> Result<&'a str, ToolError> {
    arguments[key]
        .as_str()
        .ok_or_else(|| ToolError::InvalidArguments(format!("Missing '{key}' argument")))
}

pub struct ReadFileTool {
    guard: PathGuard,
}

impl ReadFileTool {
    pub fn new(guard: PathGuard) -> Self {
        Self { guard }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file at the given path."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The file path to read"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let path = required_str(&arguments, "path")?;
        let resolved = self.guard.check(self.name(), path)?;

        if !resolved.exists() {
            return Ok(ToolResult::error(format!("File not found: {path}")));
        }
        if !resolved.is_file() {
            return Ok(ToolResult::error(format!("Not a file: {path}")));
        }

        match tokio::fs::read_to_string(&resolved).await {
            Ok(content) => Ok(ToolResult::ok(content)),
            Err(e) => Err(ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: format!("Failed to read '{path}': {e}"),
            }),
        }
    }
}

pub struct WriteFileTool {
    guard: PathGuard,
}

impl WriteFileTool {
    pub fn new(guard: PathGuard) -> Self {
        Self { guard }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file at the given path. Creates parent directories if needed."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The file path to write to"
                },
                "content": {
                    "type": "string",
                    "description": "The content to write"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let path = required_str(&arguments, "path")?;
        let content = required_str(&arguments, "content")?;
        let resolved = self.guard.check(self.name(), path)?;

        let write_err = |e: std::io::Error| ToolError::ExecutionFailed {
            tool_name: "write_file".into(),
            reason: format!("Failed to write '{path}': {e}"),
        };

        if let Some(parent) = resolved.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
        tokio::fs::write(&resolved, content)
            .await
            .map_err(write_err)?;

        debug!(path = %resolved.display(), bytes = content.len(), "File written");
        Ok(ToolResult::ok(format!(
            "Successfully wrote {} bytes to {path}",
            content.len()
        )))
    }
}

/// Replace one exact occurrence of `old_text` in a file.
pub struct EditFileTool {
    guard: PathGuard,
}

impl EditFileTool {
    pub fn new(guard: PathGuard) -> Self {
        Self { guard }
    }
}

#[async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        "Edit a file by replacing old_text with new_text. old_text must appear exactly once in the file."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The file path to edit"
                },
                "old_text": {
                    "type": "string",
                    "description": "The exact text to find and replace"
                },
                "new_text": {
                    "type": "string",
                    "description": "The text to replace it with"
                }
            },
            "required": ["path", "old_text", "new_text"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let path = required_str(&arguments, "path")?;
        let old_text = required_str(&arguments, "old_text")?;
        let new_text = required_str(&arguments, "new_text")?;
        let resolved = self.guard.check(self.name(), path)?;

        if old_text.is_empty() {
            return Err(ToolError::InvalidArguments("'old_text' must not be empty".into()));
        }
        if !resolved.is_file() {
            return Ok(ToolResult::error(format!("File not found: {path}")));
        }

        let io_err = |e: std::io::Error| ToolError::ExecutionFailed {
            tool_name: "edit_file".into(),
            reason: format!("Failed to edit '{path}': {e}"),
        };

        let content = tokio::fs::read_to_string(&resolved).await.map_err(io_err)?;
        match content.matches(old_text).count() {
            0 => {
                return Ok(ToolResult::error(format!(
                    "old_text not found in {path}. Make sure it matches exactly."
                )));
            }
            1 => {}
            n => {
                return Ok(ToolResult::error(format!(
                    "old_text appears {n} times in {path}. Provide more context to make it unique."
                )));
            }
        }

        let updated = content.replacen(old_text, new_text, 1);
        tokio::fs::write(&resolved, updated).await.map_err(io_err)?;

        debug!(path = %resolved.display(), "File edited");
        Ok(ToolResult::ok(format!("Successfully edited {path}")))
    }
}

pub struct ListDirTool {
    guard: PathGuard,
}

impl ListDirTool {
    pub fn new(guard: PathGuard) -> Self {
        Self { guard }
    }
}

#[async_trait]
impl Tool for ListDirTool {
    fn name(&self) -> &str {
        "list_dir"
    }

    fn description(&self) -> &str {
        "List the contents of a directory."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The directory path to list"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let path = required_str(&arguments, "path")?;
        let resolved = self.guard.check(self.name(), path)?;

        if !resolved.exists() {
            return Ok(ToolResult::error(format!("Directory not found: {path}")));
        }
        if !resolved.is_dir() {
            return Ok(ToolResult::error(format!("Not a directory: {path}")));
        }

        let list_err = |e: std::io::Error| ToolError::ExecutionFailed {
            tool_name: "list_dir".into(),
            reason: format!("Failed to list '{path}': {e}"),
        };

        let mut entries = Vec::new();
        let mut read_dir = tokio::fs::read_dir(&resolved).await.map_err(list_err)?;
        while let Some(entry) = read_dir.next_entry().await.map_err(list_err)? {
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            let name = entry.file_name().to_string_lossy().into_owned();
            entries.push((name, is_dir));
        }

        if entries.is_empty() {
            return Ok(ToolResult::ok(format!("Directory {path} is empty")));
        }

        entries.sort();
        let lines: Vec<String> = entries
            .into_iter()
            .map(|(name, is_dir)| {
                if is_dir {
                    format!("[dir]  {name}/")
                } else {
                    format!("[file] {name}")
                }
            })
            .collect();
        Ok(ToolResult::ok(lines.join("\n")))
    }
}
