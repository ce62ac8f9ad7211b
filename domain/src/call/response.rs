//! Tool-call responses — the output side of the pipeline.
//!
//! Every [`ToolCallRequest`](super::request::ToolCallRequest) produces exactly
//! one [`ToolCallResponse`]. Failures carry a [`ToolErrorKind`] so the model
//! loop can tell a governance refusal from a runtime failure:
//!
//! | Kind | Executed? | Model should |
//! |------|-----------|--------------|
//! | `invalid-arguments` | No | Fix the arguments and retry |
//! | `tool-not-found` | No | Pick a registered tool |
//! | `policy-denied` | No | Explain, or choose another action |
//! | `user-rejected` | No | Explain, or choose another action |
//! | `aborted` | Maybe | Stop; the turn was cancelled |
//! | `execution-failed` | Yes | Inspect the error before retrying |

use super::request::{CallId, ToolCallRequest};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// A unit of content returned by a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    Json { value: Value },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn json(value: Value) -> Self {
        ContentPart::Json { value }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentPart::Text { text } => Some(text),
            ContentPart::Json { .. } => None,
        }
    }
}

/// Successful output of a tool's `execute`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub parts: Vec<ContentPart>,
    /// Short human-readable summary for the terminal
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            parts: vec![ContentPart::text(text)],
            display: None,
        }
    }

    pub fn with_part(mut self, part: ContentPart) -> Self {
        self.parts.push(part);
        self
    }

    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }
}

/// Discriminates why a tool call did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolErrorKind {
    InvalidArguments,
    ToolNotFound,
    PolicyDenied,
    UserRejected,
    Aborted,
    ExecutionFailed,
}

impl ToolErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolErrorKind::InvalidArguments => "invalid-arguments",
            ToolErrorKind::ToolNotFound => "tool-not-found",
            ToolErrorKind::PolicyDenied => "policy-denied",
            ToolErrorKind::UserRejected => "user-rejected",
            ToolErrorKind::Aborted => "aborted",
            ToolErrorKind::ExecutionFailed => "execution-failed",
        }
    }

    /// Refusals by policy or by the user, as opposed to failures.
    pub fn is_refusal(&self) -> bool {
        matches!(self, ToolErrorKind::PolicyDenied | ToolErrorKind::UserRejected)
    }

    /// Caller mistakes the model can correct by re-issuing the call.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ToolErrorKind::InvalidArguments | ToolErrorKind::ToolNotFound
        )
    }
}

impl std::fmt::Display for ToolErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured failure attached to a [`ToolCallResponse`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallError {
    pub kind: ToolErrorKind,
    pub message: String,
}

impl ToolCallError {
    pub fn new(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::InvalidArguments, message)
    }

    pub fn tool_not_found(name: &str) -> Self {
        Self::new(
            ToolErrorKind::ToolNotFound,
            format!("Tool '{}' is not registered", name),
        )
    }

    pub fn policy_denied(name: &str) -> Self {
        Self::new(
            ToolErrorKind::PolicyDenied,
            format!("Tool call '{}' was denied by policy", name),
        )
    }

    pub fn user_rejected(name: &str) -> Self {
        Self::new(
            ToolErrorKind::UserRejected,
            format!("Tool call '{}' was rejected by the user", name),
        )
    }

    pub fn aborted(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Aborted, message)
    }

    pub fn execution_failed(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::ExecutionFailed, message)
    }
}

impl std::fmt::Display for ToolCallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl std::error::Error for ToolCallError {}

/// How a response should be presented to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Success,
    /// Refused by policy or by the user
    Rejected,
    Error,
}

/// Outcome of one tool call, reported back to the model loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResponse {
    pub call_id: CallId,
    pub tool_name: String,
    #[serde(default)]
    pub result_parts: Vec<ContentPart>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolCallError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_result: Option<String>,
    #[serde(default)]
    pub is_client_initiated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl ToolCallResponse {
    pub fn success(request: &ToolCallRequest, output: ToolOutput) -> Self {
        Self {
            call_id: request.call_id.clone(),
            tool_name: request.name.clone(),
            result_parts: output.parts,
            error: None,
            display_result: output.display,
            is_client_initiated: request.is_client_initiated,
            duration_ms: None,
        }
    }

    pub fn failure(request: &ToolCallRequest, error: ToolCallError) -> Self {
        Self {
            call_id: request.call_id.clone(),
            tool_name: request.name.clone(),
            result_parts: Vec::new(),
            display_result: Some(error.message.clone()),
            error: Some(error),
            is_client_initiated: request.is_client_initiated,
            duration_ms: None,
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn error_kind(&self) -> Option<ToolErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }

    pub fn status(&self) -> ResponseStatus {
        match &self.error {
            None => ResponseStatus::Success,
            Some(e) if e.kind.is_refusal() => ResponseStatus::Rejected,
            Some(_) => ResponseStatus::Error,
        }
    }

    /// Concatenate all text parts.
    pub fn text(&self) -> String {
        self.result_parts
            .iter()
            .filter_map(|p| p.as_text())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Render the function-response payload handed back to the model.
    pub fn to_model_payload(&self) -> Value {
        match &self.error {
            None => json!({
                "call_id": self.call_id,
                "name": self.tool_name,
                "status": self.status(),
                "output": self.result_parts,
            }),
            Some(error) => json!({
                "call_id": self.call_id,
                "name": self.tool_name,
                "status": self.status(),
                "error": {
                    "kind": error.kind,
                    "message": error.message,
                    "retryable": error.kind.is_retryable(),
                },
            }),
        }
    }
}
