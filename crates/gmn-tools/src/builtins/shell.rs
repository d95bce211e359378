//! shell tool

use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;

use gmn_protocol::JsonMap;

use crate::output::{truncate_output, MAX_TOOL_OUTPUT};
use crate::traits::require_str;
use crate::{ConfirmationCategory, Tool, ToolError};

const DEFAULT_TIMEOUT_SECS: u64 = 60;
const MAX_TIMEOUT_SECS: u64 = 300;

/// Platform default shell for command execution
pub fn default_shell() -> String {
    if cfg!(windows) {
        "powershell".to_string()
    } else {
        "bash".to_string()
    }
}

pub struct ShellTool {
    root_dir: PathBuf,
    shell_path: String,
}

impl ShellTool {
    pub fn new(root_dir: impl Into<PathBuf>, shell_path: Option<String>) -> Self {
        Self {
            root_dir: root_dir.into(),
            shell_path: shell_path.unwrap_or_else(default_shell),
        }
    }

    fn timeout_secs(args: &JsonMap) -> u64 {
        let requested = args
            .get("timeout")
            .and_then(Value::as_f64)
            .map(|t| t as i64)
            .unwrap_or(DEFAULT_TIMEOUT_SECS as i64);
        if requested <= 0 {
            DEFAULT_TIMEOUT_SECS
        } else {
            (requested as u64).min(MAX_TIMEOUT_SECS)
        }
    }

    fn build_command(&self, command: &str) -> Command {
        let mut cmd = Command::new(&self.shell_path);
        if self.shell_path.contains("powershell") {
            cmd.args(["-NoProfile", "-NonInteractive", "-Command", command]);
        } else {
            cmd.args(["-c", command]);
        }
        cmd.current_dir(&self.root_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "shell"
    }

    fn display_name(&self) -> &str {
        "Shell"
    }

    fn description(&self) -> &str {
        "Execute a shell command and return its output. Use this for running system commands, scripts, or CLI tools. Be cautious with destructive commands."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                },
                "timeout": {
                    "type": "integer",
                    "description": "Timeout in seconds (default: 60, max: 300)"
                }
            },
            "required": ["command"]
        })
    }

    fn requires_confirmation(&self) -> bool {
        true
    }

    fn confirmation_category(&self) -> ConfirmationCategory {
        ConfirmationCategory::Shell
    }

    async fn execute(&self, args: &JsonMap) -> Result<JsonMap, ToolError> {
        let command = require_str(args, "command")?;
        if command.trim().is_empty() {
            return Err(ToolError::InvalidArgs(
                "command is required and cannot be empty".to_string(),
            ));
        }

        let timeout_secs = Self::timeout_secs(args);
        let mut cmd = self.build_command(command);

        let start = Instant::now();
        let outcome = tokio::time::timeout(Duration::from_secs(timeout_secs), cmd.output()).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let mut result = JsonMap::new();
        result.insert("command".to_string(), json!(command));
        result.insert("duration_ms".to_string(), json!(duration_ms));

        match outcome {
            Err(_) => {
                result.insert(
                    "error".to_string(),
                    json!(format!("command timed out after {timeout_secs} seconds")),
                );
                result.insert("exit_code".to_string(), json!(-1));
            }
            Ok(Err(e)) => {
                result.insert("error".to_string(), json!(e.to_string()));
                result.insert("exit_code".to_string(), json!(-1));
            }
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);
                result.insert(
                    "stdout".to_string(),
                    json!(truncate_output(&stdout, MAX_TOOL_OUTPUT)),
                );
                result.insert(
                    "stderr".to_string(),
                    json!(truncate_output(&stderr, MAX_TOOL_OUTPUT)),
                );
                result.insert(
                    "exit_code".to_string(),
                    json!(output.status.code().unwrap_or(-1)),
                );
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(value: Value) -> JsonMap {
        value.as_object().unwrap().clone()
    }

    fn tool() -> ShellTool {
        ShellTool::new(std::env::temp_dir(), None)
    }

    #[test]
    fn timeout_is_clamped() {
        assert_eq!(ShellTool::timeout_secs(&args(json!({}))), 60);
        assert_eq!(ShellTool::timeout_secs(&args(json!({"timeout": 10}))), 10);
        assert_eq!(ShellTool::timeout_secs(&args(json!({"timeout": 9999}))), 300);
        assert_eq!(ShellTool::timeout_secs(&args(json!({"timeout": -5}))), 60);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let result = tool()
            .execute(&args(json!({"command": "echo hello"})))
            .await
            .unwrap();

        assert_eq!(result["stdout"].as_str().unwrap().trim(), "hello");
        assert_eq!(result["exit_code"], 0);
        assert!(result["duration_ms"].as_u64().is_some());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_is_not_an_error() {
        let result = tool()
            .execute(&args(json!({"command": "exit 3"})))
            .await
            .unwrap();

        assert_eq!(result["exit_code"], 3);
        assert!(result.get("error").is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_reports_error_map() {
        let result = tool()
            .execute(&args(json!({"command": "sleep 5", "timeout": 1})))
            .await
            .unwrap();

        assert_eq!(
            result["error"].as_str().unwrap(),
            "command timed out after 1 seconds"
        );
        assert_eq!(result["exit_code"], -1);
    }

    #[tokio::test]
    async fn empty_command_is_invalid() {
        let result = tool().execute(&args(json!({"command": "   "}))).await;
        assert!(matches!(result, Err(ToolError::InvalidArgs(_))));
    }
}
