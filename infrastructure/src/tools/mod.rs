//! Built-in tool implementations
//!
//! Concrete [`Tool`] adapters for the local file system and shell:
//!
//! | Tool | Aliases | Kind |
//! |------|---------|------|
//! | `shell_exec` | `ShellTool`, `run_shell_command` | execute |
//! | `read_file` | `ReadFileTool` | read-only |
//! | `write_file` | `WriteFileTool` | mutating |
//!
//! Relative paths are resolved against the configured working directory.

pub mod command;
pub mod file;

pub use command::ShellTool;
pub use file::{ReadFileTool, WriteFileTool};

use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use toolgate_application::{RegistryError, Tool, ToolExecutionError, ToolRegistry};

/// Create a registry holding every built-in tool.
pub fn default_registry(
    working_dir: impl Into<PathBuf>,
    shell_timeout: Duration,
) -> Result<ToolRegistry, RegistryError> {
    let working_dir = working_dir.into();
    let tools: [Arc<dyn Tool>; 3] = [
        Arc::new(ShellTool::new(working_dir.clone(), shell_timeout)),
        Arc::new(ReadFileTool::new(working_dir.clone())),
        Arc::new(WriteFileTool::new(working_dir)),
    ];

    let mut registry = ToolRegistry::new();
    for tool in tools {
        registry.register(tool)?;
    }
    Ok(registry)
}

fn require_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, ToolExecutionError> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolExecutionError::failed(format!("Missing string argument '{}'", key)))
}

fn optional_u64(args: &Value, key: &str) -> Option<u64> {
    args.get(key).and_then(Value::as_u64)
}

fn resolve_path(base: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_registry_resolves_aliases() {
        let registry = default_registry("/tmp", Duration::from_secs(5)).unwrap();
        assert_eq!(registry.len(), 3);
        for (name, canonical) in [
            ("shell_exec", "shell_exec"),
            ("ShellTool", "shell_exec"),
            ("run_shell_command", "shell_exec"),
            ("ReadFileTool", "read_file"),
            ("WriteFileTool", "write_file"),
        ] {
            assert_eq!(registry.resolve(name).unwrap().canonical, canonical);
        }
        assert!(registry.resolve("glob").is_none());
    }

    #[test]
    fn test_description_carries_aliases() {
        let registry = default_registry("/tmp", Duration::from_secs(5)).unwrap();
        let description = registry.describe("shell_exec", json!({"command": "ls"}));
        let names: Vec<&str> = description.names().collect();
        assert!(names.contains(&"ShellTool"));
        assert!(names.contains(&"run_shell_command"));
    }

    #[test]
    fn test_builtin_validation() {
        let registry = default_registry("/tmp", Duration::from_secs(5)).unwrap();
        let shell = registry.resolve("shell_exec").unwrap().tool;
        assert!(shell.validate(&json!({"command": "ls"})).is_ok());
        assert!(shell.validate(&json!({})).is_err());
        assert!(shell.validate(&json!({"command": 3})).is_err());
    }

    #[test]
    fn test_resolve_path() {
        assert_eq!(resolve_path(Path::new("/base"), "a/b"), PathBuf::from("/base/a/b"));
        assert_eq!(resolve_path(Path::new("/base"), "/abs"), PathBuf::from("/abs"));
    }
}
