//! Tools configuration from TOML (`[tools]` section)
//!
//! ```toml
//! [tools]
//! working_dir = "."
//! shell_timeout_secs = 60
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default per-call timeout for `shell_exec`.
pub const DEFAULT_SHELL_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileToolsConfig {
    /// Directory tools resolve relative paths against (default: cwd)
    pub working_dir: Option<PathBuf>,
    pub shell_timeout_secs: u64,
}

impl Default for FileToolsConfig {
    fn default() -> Self {
        Self {
            working_dir: None,
            shell_timeout_secs: DEFAULT_SHELL_TIMEOUT_SECS,
        }
    }
}
