//! Command execution tool: shell_exec

use super::{optional_u64, require_str, resolve_path};
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use toolgate_application::{Tool, ToolExecutionError};
use toolgate_domain::{ToolDefinition, ToolKind, ToolOutput, ToolParameter, single_line};
use tracing::debug;

/// Tool name constant
pub const SHELL_EXEC: &str = "shell_exec";

/// Other names the shell tool answers to
pub const SHELL_EXEC_ALIASES: &[&str] = &["ShellTool", "run_shell_command"];

/// Maximum output size (1 MB)
const MAX_OUTPUT_SIZE: usize = 1024 * 1024;

/// Runs a command through `sh -c` (or `cmd /C` on Windows).
pub struct ShellTool {
    definition: ToolDefinition,
    working_dir: PathBuf,
    timeout: Duration,
}

impl ShellTool {
    pub fn new(working_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            definition: shell_exec_definition(),
            working_dir: working_dir.into(),
            timeout,
        }
    }
}

/// Get the tool definition for shell_exec
pub fn shell_exec_definition() -> ToolDefinition {
    ToolDefinition::new(
        SHELL_EXEC,
        "Execute a shell command and return its output. Use with caution.",
        ToolKind::Execute,
    )
    .with_parameter(
        ToolParameter::new("command", "The command to execute", true).with_type("string"),
    )
    .with_parameter(
        ToolParameter::new("working_dir", "Working directory for the command", false)
            .with_type("path"),
    )
    .with_parameter(
        ToolParameter::new(
            "timeout_secs",
            "Timeout in seconds, capped at the configured limit",
            false,
        )
        .with_type("integer"),
    )
}

#[async_trait]
impl Tool for ShellTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    fn aliases(&self) -> &[&'static str] {
        SHELL_EXEC_ALIASES
    }

    async fn execute(
        &self,
        args: Value,
        cancel: CancellationToken,
    ) -> Result<ToolOutput, ToolExecutionError> {
        let command_str = require_str(&args, "command")?;

        let dir = match args.get("working_dir").and_then(Value::as_str) {
            Some(dir) => resolve_path(&self.working_dir, dir),
            None => self.working_dir.clone(),
        };
        if !dir.is_dir() {
            return Err(ToolExecutionError::failed(format!(
                "Working directory does not exist: {}",
                dir.display()
            )));
        }

        // Callers may shorten the configured timeout, never extend it
        let timeout = optional_u64(&args, "timeout_secs")
            .map(|secs| Duration::from_secs(secs).min(self.timeout))
            .unwrap_or(self.timeout);

        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", command_str]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", command_str]);
            c
        };
        cmd.current_dir(&dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("shell_exec: `{}` in {}", single_line(command_str), dir.display());
        let child = cmd.spawn()?;

        // Dropping the wait future drops the child, which kills it
        let output = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ToolExecutionError::Cancelled),
            result = tokio::time::timeout(timeout, child.wait_with_output()) => match result {
                Ok(output) => output?,
                Err(_) => return Err(ToolExecutionError::Timeout(timeout.as_secs())),
            },
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        let mut result = String::new();
        if !output.status.success() {
            match output.status.code() {
                Some(code) => result.push_str(&format!("Command exited with code {}\n", code)),
                None => result.push_str("Command terminated by signal\n"),
            }
        }
        result.push_str(&stdout);
        if !stderr.is_empty() {
            if !result.is_empty() && !result.ends_with('\n') {
                result.push('\n');
            }
            result.push_str("--- stderr ---\n");
            result.push_str(&stderr);
        }

        let bytes = result.len();
        let display = match output.status.code() {
            Some(code) => format!("exit code {}, {} bytes", code, bytes),
            None => format!("terminated, {} bytes", bytes),
        };

        Ok(ToolOutput::text(truncate_output(result)).with_display(display))
    }
}

fn truncate_output(mut output: String) -> String {
    if output.len() <= MAX_OUTPUT_SIZE {
        return output;
    }
    let mut end = MAX_OUTPUT_SIZE;
    while !output.is_char_boundary(end) {
        end -= 1;
    }
    output.truncate(end);
    output.push_str("\n... (output truncated)");
    output
}
