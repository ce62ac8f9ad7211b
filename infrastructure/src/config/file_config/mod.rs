//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and use domain types where appropriate.

mod logging;
mod policy;
mod scheduler;
mod tools;

pub use logging::FileLoggingConfig;
pub use policy::{FilePolicyConfig, FilePolicyRule};
pub use scheduler::FileSchedulerConfig;
pub use tools::{DEFAULT_SHELL_TIMEOUT_SECS, FileToolsConfig};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use toolgate_domain::DomainError;

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigValidationError {
    #[error("scheduler.confirmation_timeout_ms cannot be 0")]
    ZeroConfirmationTimeout,

    #[error("scheduler.max_concurrent_executions cannot be 0")]
    ZeroConcurrency,

    #[error("tools.shell_timeout_secs cannot be 0")]
    ZeroShellTimeout,

    #[error("{field}: tool name cannot be empty")]
    EmptyToolName { field: String },

    #[error("{field}: {source}")]
    InvalidRule {
        field: String,
        #[source]
        source: DomainError,
    },
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Policy rules and mode
    pub policy: FilePolicyConfig,
    /// Scheduler knobs
    pub scheduler: FileSchedulerConfig,
    /// Audit log settings
    pub logging: FileLoggingConfig,
    /// Built-in tool settings
    pub tools: FileToolsConfig,
}

impl FileConfig {
    /// Validate the entire configuration, returning all detected issues.
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut issues = Vec::new();

        if self.scheduler.confirmation_timeout_ms == Some(0) {
            issues.push(ConfigValidationError::ZeroConfirmationTimeout);
        }
        if self.scheduler.max_concurrent_executions == Some(0) {
            issues.push(ConfigValidationError::ZeroConcurrency);
        }
        if self.tools.shell_timeout_secs == 0 {
            issues.push(ConfigValidationError::ZeroShellTimeout);
        }

        issues.extend(self.policy.validate());
        issues
    }
}
