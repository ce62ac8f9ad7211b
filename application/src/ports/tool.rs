//! Tool port
//!
//! Defines the interface every executable tool implements. Concrete tools
//! (shell, file read/write) live in the infrastructure layer; the scheduler
//! only ever sees `Arc<dyn Tool>`.

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use toolgate_domain::{DefaultToolValidator, ToolDefinition, ToolOutput, ToolValidator};

/// Error raised by [`Tool::execute`].
#[derive(Debug, thiserror::Error)]
pub enum ToolExecutionError {
    /// The tool observed its cancellation token and stopped.
    #[error("Execution cancelled")]
    Cancelled,

    #[error("Timed out after {0}s")]
    Timeout(u64),

    #[error("{0}")]
    Failed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ToolExecutionError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Port for an executable tool.
///
/// # Contract
///
/// - `validate` is cheap and side-effect free. The scheduler calls it before
///   policy evaluation and again on any argument override a confirmer
///   supplies.
/// - `execute` receives a cancellation token and should return promptly once
///   it fires. The scheduler also drops the future on cancellation, so a
///   tool must not rely on running to completion.
#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> &ToolDefinition;

    fn name(&self) -> &str {
        &self.definition().name
    }

    /// Additional names the model may use for this tool.
    fn aliases(&self) -> &[&'static str] {
        &[]
    }

    /// Check arguments against the tool's declared parameters.
    fn validate(&self, args: &Value) -> Result<(), String> {
        DefaultToolValidator.validate(args, self.definition())
    }

    async fn execute(
        &self,
        args: Value,
        cancel: CancellationToken,
    ) -> Result<ToolOutput, ToolExecutionError>;
}
