//! Messages exchanged on the tool-governance message bus.
//!
//! Every message carries its discriminating [`MessageType`]. Serialized
//! messages use an explicit `type` tag, so a payload without one cannot be
//! decoded into a [`BusMessage`] at all.

use crate::call::request::CallId;
use crate::call::response::ToolCallError;
use crate::policy::description::ToolCallDescription;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier pairing a confirmation request with its response.
///
/// Generated per confirmation round-trip and distinct from the call id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<T: Into<String>> From<T> for CorrelationId {
    fn from(s: T) -> Self {
        Self::new(s)
    }
}

/// Discriminant of a [`BusMessage`], used as the subscription key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageType {
    ToolConfirmationRequest,
    ToolConfirmationResponse,
    ToolConfirmationCancelled,
    ToolPolicyRejection,
    ToolExecutionSucceeded,
    ToolExecutionFailed,
    BusError,
}

impl MessageType {
    pub const ALL: [MessageType; 7] = [
        MessageType::ToolConfirmationRequest,
        MessageType::ToolConfirmationResponse,
        MessageType::ToolConfirmationCancelled,
        MessageType::ToolPolicyRejection,
        MessageType::ToolExecutionSucceeded,
        MessageType::ToolExecutionFailed,
        MessageType::BusError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::ToolConfirmationRequest => "tool-confirmation-request",
            MessageType::ToolConfirmationResponse => "tool-confirmation-response",
            MessageType::ToolConfirmationCancelled => "tool-confirmation-cancelled",
            MessageType::ToolPolicyRejection => "tool-policy-rejection",
            MessageType::ToolExecutionSucceeded => "tool-execution-succeeded",
            MessageType::ToolExecutionFailed => "tool-execution-failed",
            MessageType::BusError => "bus-error",
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A call asking to be confirmed before it runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationRequest {
    pub correlation_id: CorrelationId,
    pub call_id: CallId,
    pub tool_call: ToolCallDescription,
}

impl ConfirmationRequest {
    pub fn new(
        correlation_id: impl Into<CorrelationId>,
        call_id: impl Into<CallId>,
        tool_call: ToolCallDescription,
    ) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            call_id: call_id.into(),
            tool_call,
        }
    }
}

/// Who answered a confirmation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationSource {
    /// The policy engine decided without asking anyone
    Policy,
    /// A confirmation channel (human, auto-approve flag, test harness)
    #[default]
    Channel,
}

/// Answer to a [`ConfirmationRequest`] with the same correlation id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationResponse {
    pub correlation_id: CorrelationId,
    pub confirmed: bool,
    /// Replacement arguments approved by the confirmer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_args_override: Option<Value>,
    #[serde(default)]
    pub source: ConfirmationSource,
}

impl ConfirmationResponse {
    pub fn confirmed(correlation_id: impl Into<CorrelationId>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            confirmed: true,
            approved_args_override: None,
            source: ConfirmationSource::Channel,
        }
    }

    pub fn rejected(correlation_id: impl Into<CorrelationId>) -> Self {
        Self {
            confirmed: false,
            ..Self::confirmed(correlation_id)
        }
    }

    pub fn with_args_override(mut self, args: Value) -> Self {
        self.approved_args_override = Some(args);
        self
    }

    pub fn with_source(mut self, source: ConfirmationSource) -> Self {
        self.source = source;
        self
    }

    pub fn is_policy_decision(&self) -> bool {
        self.source == ConfirmationSource::Policy
    }
}

/// The waiter for a forwarded confirmation request gave up (timeout,
/// cancellation). Whoever is answering it can stop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationCancellation {
    pub correlation_id: CorrelationId,
}

/// Informational notice that policy refused a call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRejection {
    pub correlation_id: CorrelationId,
    pub call_id: CallId,
    pub tool_name: String,
    /// The rule that denied the call, or `None` when the default applied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
}

/// Outcome of an executed call, for loggers and telemetry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub call_id: CallId,
    pub tool_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolCallError>,
}

/// A message the bus could not dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusErrorEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_type: Option<MessageType>,
    pub error: String,
}

/// A message on the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum BusMessage {
    ToolConfirmationRequest(ConfirmationRequest),
    ToolConfirmationResponse(ConfirmationResponse),
    ToolConfirmationCancelled(ConfirmationCancellation),
    ToolPolicyRejection(PolicyRejection),
    ToolExecutionSucceeded(ExecutionReport),
    ToolExecutionFailed(ExecutionReport),
    BusError(BusErrorEvent),
}

impl BusMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            BusMessage::ToolConfirmationRequest(_) => MessageType::ToolConfirmationRequest,
            BusMessage::ToolConfirmationResponse(_) => MessageType::ToolConfirmationResponse,
            BusMessage::ToolConfirmationCancelled(_) => MessageType::ToolConfirmationCancelled,
            BusMessage::ToolPolicyRejection(_) => MessageType::ToolPolicyRejection,
            BusMessage::ToolExecutionSucceeded(_) => MessageType::ToolExecutionSucceeded,
            BusMessage::ToolExecutionFailed(_) => MessageType::ToolExecutionFailed,
            BusMessage::BusError(_) => MessageType::BusError,
        }
    }

    /// Correlation id for confirmation traffic.
    pub fn correlation_id(&self) -> Option<&CorrelationId> {
        match self {
            BusMessage::ToolConfirmationRequest(r) => Some(&r.correlation_id),
            BusMessage::ToolConfirmationResponse(r) => Some(&r.correlation_id),
            BusMessage::ToolConfirmationCancelled(c) => Some(&c.correlation_id),
            BusMessage::ToolPolicyRejection(r) => Some(&r.correlation_id),
            _ => None,
        }
    }
}
