//! File operation tools: read_file, write_file

use super::{optional_u64, require_str, resolve_path};
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use tokio::fs;
use tokio_util::sync::CancellationToken;
use toolgate_application::{Tool, ToolExecutionError};
use toolgate_domain::{ToolDefinition, ToolKind, ToolOutput, ToolParameter};

/// Tool name constants
pub const READ_FILE: &str = "read_file";
pub const WRITE_FILE: &str = "write_file";

/// Maximum file size to read (10 MB)
const MAX_READ_SIZE: u64 = 10 * 1024 * 1024;

/// Reads a UTF-8 file, optionally a window of its lines.
pub struct ReadFileTool {
    definition: ToolDefinition,
    working_dir: PathBuf,
}

impl ReadFileTool {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            definition: read_file_definition(),
            working_dir: working_dir.into(),
        }
    }
}

/// Writes a file, replacing any existing content.
pub struct WriteFileTool {
    definition: ToolDefinition,
    working_dir: PathBuf,
}

impl WriteFileTool {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            definition: write_file_definition(),
            working_dir: working_dir.into(),
        }
    }
}

/// Get the tool definition for read_file
pub fn read_file_definition() -> ToolDefinition {
    ToolDefinition::new(
        READ_FILE,
        "Read the contents of a file at the specified path",
        ToolKind::ReadOnly,
    )
    .with_parameter(ToolParameter::new("path", "Path to the file to read", true).with_type("path"))
    .with_parameter(
        ToolParameter::new(
            "offset",
            "Line number to start reading from (0-indexed)",
            false,
        )
        .with_type("integer"),
    )
    .with_parameter(
        ToolParameter::new("limit", "Maximum number of lines to read", false).with_type("integer"),
    )
}

/// Get the tool definition for write_file
pub fn write_file_definition() -> ToolDefinition {
    ToolDefinition::new(
        WRITE_FILE,
        "Write content to a file at the specified path. Creates the file if it doesn't exist, or overwrites if it does.",
        ToolKind::Mutating,
    )
    .with_parameter(ToolParameter::new("path", "Path to the file to write", true).with_type("path"))
    .with_parameter(ToolParameter::new("content", "Content to write to the file", true).with_type("string"))
    .with_parameter(
        ToolParameter::new("create_dirs", "Create missing parent directories (default: true)", false)
            .with_type("boolean"),
    )
}

#[async_trait]
impl Tool for ReadFileTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    fn aliases(&self) -> &[&'static str] {
        &["ReadFileTool"]
    }

    async fn execute(
        &self,
        args: Value,
        _cancel: CancellationToken,
    ) -> Result<ToolOutput, ToolExecutionError> {
        let path_str = require_str(&args, "path")?;
        let path = resolve_path(&self.working_dir, path_str);

        let metadata = fs::metadata(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                ToolExecutionError::failed(format!("File not found: {}", path_str))
            }
            _ => ToolExecutionError::Io(e),
        })?;
        if !metadata.is_file() {
            return Err(ToolExecutionError::failed(format!(
                "'{}' is not a file",
                path_str
            )));
        }
        if metadata.len() > MAX_READ_SIZE {
            return Err(ToolExecutionError::failed(format!(
                "File too large ({} bytes). Maximum size is {} bytes",
                metadata.len(),
                MAX_READ_SIZE
            )));
        }

        let content = fs::read_to_string(&path).await?;

        let offset = optional_u64(&args, "offset").unwrap_or(0) as usize;
        let limit = optional_u64(&args, "limit").map(|l| l as usize);

        let output = if offset > 0 || limit.is_some() {
            content
                .lines()
                .skip(offset)
                .take(limit.unwrap_or(usize::MAX))
                .collect::<Vec<_>>()
                .join("\n")
        } else {
            content
        };

        let display = format!("{} bytes from {}", output.len(), path_str);
        Ok(ToolOutput::text(output).with_display(display))
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    fn aliases(&self) -> &[&'static str] {
        &["WriteFileTool"]
    }

    async fn execute(
        &self,
        args: Value,
        _cancel: CancellationToken,
    ) -> Result<ToolOutput, ToolExecutionError> {
        let path_str = require_str(&args, "path")?;
        let content = require_str(&args, "content")?;
        let path = resolve_path(&self.working_dir, path_str);

        let create_dirs = args
            .get("create_dirs")
            .and_then(Value::as_bool)
            .unwrap_or(true);

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            if !create_dirs {
                return Err(ToolExecutionError::failed(format!(
                    "Parent directory does not exist: {}",
                    parent.display()
                )));
            }
            fs::create_dir_all(parent).await?;
        }

        fs::write(&path, content).await?;

        let message = format!("Wrote {} bytes to {}", content.len(), path_str);
        Ok(ToolOutput::text(message.clone()).with_display(message))
    }
}
