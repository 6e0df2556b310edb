//! Exec tool: run shell commands.
//!
//! Supports command allowlisting, a working directory, timeout, and output
//! truncation. With an allowlist, commands that chain or substitute other
//! commands are refused. The current conversation is exported to the child process as
//! `NANOCLAW_CHANNEL`, `NANOCLAW_CHAT_ID` and `NANOCLAW_SESSION`.

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use nanoclaw_core::error::ToolError;
use nanoclaw_core::tool::{Tool, ToolContext, ToolResult};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::filesystem::PathGuard;

const MAX_OUTPUT_CHARS: usize = 10_000;

/// Fragments that are refused even when no allowlist is configured.
const DENIED_FRAGMENTS: &[&str] = &[
    "rm -rf /",
    "mkfs",
    "dd if=",
    ":(){",
    "shutdown",
    "reboot",
    "poweroff",
];

/// Shell syntax that would run a second command past the allowlist check.
const CHAINING_FRAGMENTS: &[&str] = &[";", "&", "|", "`", "$(", "\n", ">", "<"];

/// Execute shell commands with safety constraints.
pub struct ExecTool {
    /// If non-empty, only these commands are allowed.
    allowed_commands: Vec<String>,
    timeout: Duration,
    working_dir: Option<PathBuf>,
    /// When set, a `working_dir` argument must pass this guard.
    guard: Option<PathGuard>,
    context: Mutex<Option<ToolContext>>,
}

impl ExecTool {
    pub fn new(allowed_commands: Vec<String>, timeout: Duration) -> Self {
        Self {
            allowed_commands,
            timeout,
            working_dir: None,
            guard: None,
            context: Mutex::new(None),
        }
    }

    /// Run commands from `dir` when it exists.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Validate the model-supplied `working_dir` against `guard`.
    pub fn with_path_guard(mut self, guard: PathGuard) -> Self {
        self.guard = Some(guard);
        self
    }

    fn is_command_allowed(&self, command: &str) -> bool {
        let lowered = command.to_lowercase();
        if DENIED_FRAGMENTS.iter().any(|f| lowered.contains(f)) {
            return false;
        }
        if self.allowed_commands.is_empty() {
            return true;
        }
        if CHAINING_FRAGMENTS.iter().any(|f| command.contains(f)) {
            return false;
        }

        let base_cmd = command.split_whitespace().next().unwrap_or("").trim();
        self.allowed_commands.iter().any(|a| a == base_cmd)
    }

    fn resolve_working_dir(
        &self,
        requested: Option<&str>,
    ) -> Result<Option<PathBuf>, ToolError> {
        let Some(requested) = requested else {
            return Ok(self.working_dir.clone());
        };
        match &self.guard {
            Some(guard) => guard
                .resolve(requested)
                .map(Some)
                .map_err(|e| ToolError::PermissionDenied {
                    tool_name: "exec".into(),
                    reason: e.to_string(),
                }),
            None => Ok(Some(PathBuf::from(requested))),
        }
    }

    fn current_context(&self) -> Option<ToolContext> {
        self.context
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

fn truncate_output(text: String) -> String {
    let total = text.chars().count();
    if total <= MAX_OUTPUT_CHARS {
        return text;
    }
    let kept: String = text.chars().take(MAX_OUTPUT_CHARS).collect();
    format!(
        "{kept}\n... (truncated, {} more chars)",
        total - MAX_OUTPUT_CHARS
    )
}

#[async_trait]
impl Tool for ExecTool {
    fn name(&self) -> &str {
        "exec"
    }

    fn description(&self) -> &str {
        "Execute a shell command and return its output. Use with caution."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                },
                "working_dir": {
                    "type": "string",
                    "description": "Optional working directory for the command"
                }
            },
            "required": ["command"]
        })
    }

    fn set_context(&self, context: &ToolContext) {
        *self
            .context
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(context.clone());
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let command = arguments["command"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'command' argument".into()))?;

        if !self.is_command_allowed(command) {
            return Err(ToolError::PermissionDenied {
                tool_name: "exec".into(),
                reason: format!(
                    "Command '{}' is not allowed",
                    command.split_whitespace().next().unwrap_or("")
                ),
            });
        }

        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", command]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", command]);
            c
        };
        cmd.kill_on_drop(true);

        let dir = self
            .resolve_working_dir(arguments["working_dir"].as_str())?
            .filter(|d| d.is_dir())
            .or_else(|| self.working_dir.clone().filter(|d| d.is_dir()));
        if let Some(dir) = dir {
            cmd.current_dir(dir);
        }

        if let Some(ctx) = self.current_context() {
            cmd.env("NANOCLAW_CHANNEL", &ctx.channel)
                .env("NANOCLAW_CHAT_ID", &ctx.chat_id)
                .env("NANOCLAW_SESSION", &ctx.session_key);
        }

        debug!(command = %command, "Executing shell command");

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(result) => result.map_err(|e| ToolError::ExecutionFailed {
                tool_name: "exec".into(),
                reason: e.to_string(),
            })?,
            Err(_) => {
                warn!(command = %command, timeout_secs = self.timeout.as_secs(), "Command timed out");
                return Err(ToolError::Timeout {
                    tool_name: "exec".into(),
                    timeout_secs: self.timeout.as_secs(),
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let success = output.status.success();

        let text = if success {
            if stderr.trim().is_empty() {
                stdout
            } else {
                format!("{stdout}\n[stderr]: {stderr}")
            }
        } else {
            let code = output.status.code().unwrap_or(-1);
            warn!(command = %command, exit_code = code, "Command failed");
            format!("[exit code: {code}]\n{stdout}\n{stderr}")
        };

        let text = text.trim();
        let text = if text.is_empty() {
            "(no output)".to_string()
        } else {
            truncate_output(text.to_string())
        };

        Ok(ToolResult {
            success,
            output: text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool(allowed: &[&str]) -> ExecTool {
        ExecTool::new(
            allowed.iter().map(|s| s.to_string()).collect(),
            Duration::from_secs(5),
        )
    }

    #[test]
    fn allowlist_check() {
        let tool = tool(&["ls", "cat", "git"]);
        assert!(tool.is_command_allowed("ls -la"));
        assert!(tool.is_command_allowed("git status"));
        assert!(!tool.is_command_allowed("curl example.com"));
    }

    #[test]
    fn allowlist_refuses_chained_commands() {
        let tool = tool(&["echo", "ls"]);
        assert!(tool.is_command_allowed("echo hi"));
        for command in [
            "echo hi; uname",
            "echo hi && uname",
            "echo hi || uname",
            "ls | sh",
            "echo `uname`",
            "echo $(uname)",
            "echo hi &",
            "echo hi > /tmp/out",
            "echo hi\nuname",
        ] {
            assert!(!tool.is_command_allowed(command), "{command}");
        }
    }

    #[test]
    fn pipes_are_fine_without_allowlist() {
        assert!(tool(&[]).is_command_allowed("ls | wc -l"));
    }

    #[test]
    fn denied_fragments_apply_without_allowlist() {
        let tool = tool(&[]);
        assert!(tool.is_command_allowed("echo anything"));
        assert!(!tool.is_command_allowed("sudo rm -rf / --no-preserve-root"));
        assert!(!tool.is_command_allowed("mkfs.ext4 /dev/sda1"));
    }

    #[test]
    fn long_output_is_truncated() {
        let long = "x".repeat(MAX_OUTPUT_CHARS + 25);
        let out = truncate_output(long);
        assert!(out.ends_with("(truncated, 25 more chars)"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn execute_echo() {
        let result = tool(&[])
            .execute(json!({"command": "echo hello"}))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.output, "hello");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_reports_code() {
        let result = tool(&[])
            .execute(json!({"command": "echo oops >&2; exit 3"}))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.output.starts_with("[exit code: 3]"));
        assert!(result.output.contains("oops"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn context_is_exported_to_child() {
        let tool = tool(&[]);
        tool.set_context(&ToolContext::new("telegram", "555"));
        let result = tool
            .execute(json!({"command": "echo $NANOCLAW_SESSION"}))
            .await
            .unwrap();
        assert_eq!(result.output, "telegram:555");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_in_working_dir() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("marker.txt"), "").unwrap();
        let tool = tool(&[]).with_working_dir(tmp.path());
        let result = tool.execute(json!({"command": "ls"})).await.unwrap();
        assert!(result.output.contains("marker.txt"));
    }

    #[tokio::test]
    async fn chained_command_is_denied_with_allowlist() {
        let err = tool(&["echo"])
            .execute(json!({"command": "echo hi; uname"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::PermissionDenied { .. }));
    }

    #[tokio::test]
    async fn working_dir_outside_guard_is_denied() {
        let tmp = tempfile::tempdir().unwrap();
        let tool = tool(&[])
            .with_working_dir(tmp.path())
            .with_path_guard(PathGuard::restricted_to(tmp.path()));
        let err = tool
            .execute(json!({"command": "ls", "working_dir": "/"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::PermissionDenied { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn working_dir_inside_guard_is_used() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("sub")).unwrap();
        std::fs::write(tmp.path().join("sub").join("inner.txt"), "").unwrap();
        let tool = tool(&[])
            .with_working_dir(tmp.path())
            .with_path_guard(PathGuard::restricted_to(tmp.path()));
        let result = tool
            .execute(json!({"command": "ls", "working_dir": "sub"}))
            .await
            .unwrap();
        assert!(result.output.contains("inner.txt"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_command_times_out() {
        let tool = ExecTool::new(vec![], Duration::from_millis(100));
        let err = tool
            .execute(json!({"command": "sleep 5"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Timeout { .. }));
    }

    #[tokio::test]
    async fn blocked_command_is_denied() {
        let err = tool(&["ls"])
            .execute(json!({"command": "whoami"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::PermissionDenied { .. }));
    }
}
