//! Tool-call lifecycle state machine.
//!
//! Every call the scheduler accepts is tracked by a [`ToolCallRecord`] whose
//! [`ToolCallState`] only ever moves forward:
//!
//! ```text
//! Validating ──> Scheduled ──> AwaitingConfirmation ──> Executing ──> Success
//!     │              │                 │                    └──────> Error
//!     │              │                 ├──> Cancelled
//!     │              │                 └──> Error      (invalid args override)
//!     │              ├──> Executing
//!     │              └──> Cancelled
//!     ├──> Error
//!     └──> Cancelled
//! ```
//!
//! `Success`, `Error` and `Cancelled` are terminal. Once a record is terminal
//! every further transition is rejected, so the first terminal transition
//! wins.

use crate::bus::message::CorrelationId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::request::CallId;

/// Lifecycle state of one tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ToolCallState {
    Validating,
    Scheduled,
    /// Parked until the confirmation with this correlation id is answered.
    AwaitingConfirmation { correlation_id: CorrelationId },
    Executing,
    Success,
    Error,
    Cancelled,
}

impl ToolCallState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validating => "validating",
            Self::Scheduled => "scheduled",
            Self::AwaitingConfirmation { .. } => "awaiting_confirmation",
            Self::Executing => "executing",
            Self::Success => "success",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error | Self::Cancelled)
    }

    /// Whether the machine permits moving from `self` to `next`.
    pub fn can_transition_to(&self, next: &ToolCallState) -> bool {
        use ToolCallState::*;
        matches!(
            (self, next),
            (Validating, Scheduled | Error | Cancelled)
                | (Scheduled, AwaitingConfirmation { .. } | Executing | Cancelled)
                | (AwaitingConfirmation { .. }, Executing | Cancelled | Error)
                | (Executing, Success | Error)
        )
    }
}

impl std::fmt::Display for ToolCallState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected state transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid transition for call {call_id}: {from} -> {to}")]
pub struct InvalidTransition {
    pub call_id: CallId,
    pub from: &'static str,
    pub to: &'static str,
}

/// Lifecycle record of a single call, owned by the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub call_id: CallId,
    /// Canonical tool name once resolved, otherwise the requested name
    pub tool_name: String,
    pub state: ToolCallState,
    pub created_at: u64,
    /// Set when the call enters `Executing`
    pub started_at: Option<u64>,
    /// Set when the call reaches a terminal state
    pub finished_at: Option<u64>,
}

impl ToolCallRecord {
    /// Create a record in the `Validating` state.
    pub fn new(call_id: CallId, tool_name: impl Into<String>) -> Self {
        Self {
            call_id,
            tool_name: tool_name.into(),
            state: ToolCallState::Validating,
            created_at: current_timestamp(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Move to `next`, or fail without changing anything.
    pub fn transition(&mut self, next: ToolCallState) -> Result<(), InvalidTransition> {
        if !self.state.can_transition_to(&next) {
            return Err(InvalidTransition {
                call_id: self.call_id.clone(),
                from: self.state.as_str(),
                to: next.as_str(),
            });
        }
        let now = current_timestamp();
        if next == ToolCallState::Executing {
            self.started_at = Some(now);
        }
        if next.is_terminal() {
            self.finished_at = Some(now);
        }
        self.state = next;
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Milliseconds from creation to the terminal transition.
    pub fn duration_ms(&self) -> Option<u64> {
        self.finished_at
            .map(|finished| finished.saturating_sub(self.created_at))
    }
}

/// Get current timestamp in milliseconds.
fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
