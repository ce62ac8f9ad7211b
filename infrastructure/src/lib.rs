//! Infrastructure layer for toolgate
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer: configuration file loading, the JSONL audit
//! log and the built-in tools.

pub mod config;
pub mod logging;
pub mod tools;

// Re-export commonly used types
pub use config::{
    ConfigLoader, ConfigValidationError, DEFAULT_SHELL_TIMEOUT_SECS, FileConfig,
    FileLoggingConfig, FilePolicyConfig, FilePolicyRule, FileSchedulerConfig, FileToolsConfig,
};
pub use logging::JsonlAuditLogger;
pub use tools::{ReadFileTool, ShellTool, WriteFileTool, default_registry};
