//! Inbound tool-call requests emitted by the model.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Unique identifier of a tool call within a model turn.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(String);

impl CallId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<T: Into<String>> From<T> for CallId {
    fn from(s: T) -> Self {
        Self::new(s)
    }
}

/// A model's request to invoke a named tool with arguments.
///
/// Immutable once created. The scheduler owns it until the call reaches a
/// terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub call_id: CallId,
    /// Tool name as emitted by the model (canonical name or alias)
    pub name: String,
    /// Opaque structured arguments
    #[serde(default)]
    pub args: Value,
    /// Whether a user, not the model, originated this call
    #[serde(default)]
    pub is_client_initiated: bool,
    #[serde(default)]
    pub prompt_id: String,
}

impl ToolCallRequest {
    pub fn new(call_id: impl Into<CallId>, name: impl Into<String>, args: Value) -> Self {
        Self {
            call_id: call_id.into(),
            name: name.into(),
            args,
            is_client_initiated: false,
            prompt_id: String::new(),
        }
    }

    pub fn with_prompt_id(mut self, prompt_id: impl Into<String>) -> Self {
        self.prompt_id = prompt_id.into();
        self
    }

    pub fn client_initiated(mut self) -> Self {
        self.is_client_initiated = true;
        self
    }
}
