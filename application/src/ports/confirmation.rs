//! Confirmation handler port.
//!
//! A confirmation handler answers calls the policy engine could not decide
//! on its own (`AskUser`). The [`ConfirmationChannel`] adapter attaches a
//! handler to the message bus; the handler itself never touches the bus.
//!
//! # Built-in Implementations
//!
//! - [`AutoApproveConfirmation`] - approves every request
//! - [`AutoRejectConfirmation`] - rejects every request
//!
//! For interactive use, see `InteractiveConfirmation` in the presentation
//! layer.
//!
//! [`ConfirmationChannel`]: crate::bus::ConfirmationChannel

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use toolgate_domain::{ConfirmationRequest, ConfirmationResponse, CorrelationId};

/// Failure while asking for confirmation (not a rejection).
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfirmationError {
    #[error("Confirmation cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    IoError(String),
}

/// What the confirmer decided.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmationOutcome {
    Approve,
    /// Approve, but run with these arguments instead.
    ApproveWithArgs(Value),
    Reject,
}

impl ConfirmationOutcome {
    pub fn is_approved(&self) -> bool {
        !matches!(self, ConfirmationOutcome::Reject)
    }

    /// Build the bus response for the request with `correlation_id`.
    pub fn into_response(self, correlation_id: CorrelationId) -> ConfirmationResponse {
        match self {
            ConfirmationOutcome::Approve => ConfirmationResponse::confirmed(correlation_id),
            ConfirmationOutcome::ApproveWithArgs(args) => {
                ConfirmationResponse::confirmed(correlation_id).with_args_override(args)
            }
            ConfirmationOutcome::Reject => ConfirmationResponse::rejected(correlation_id),
        }
    }
}

/// Port for answering confirmation requests.
#[async_trait]
pub trait ConfirmationHandler: Send + Sync {
    /// Decide on one request.
    ///
    /// `cancel` fires when the waiting call stops waiting (timeout, call or
    /// batch cancellation); the handler should then return
    /// [`ConfirmationError::Cancelled`] promptly. Errors are treated as a
    /// rejection by the channel adapter.
    async fn confirm(
        &self,
        request: &ConfirmationRequest,
        cancel: CancellationToken,
    ) -> Result<ConfirmationOutcome, ConfirmationError>;
}

/// Approves everything. Used by `--auto-approve`.
pub struct AutoApproveConfirmation;

#[async_trait]
impl ConfirmationHandler for AutoApproveConfirmation {
    async fn confirm(
        &self,
        _request: &ConfirmationRequest,
        _cancel: CancellationToken,
    ) -> Result<ConfirmationOutcome, ConfirmationError> {
        Ok(ConfirmationOutcome::Approve)
    }
}

/// Rejects everything.
pub struct AutoRejectConfirmation;

#[async_trait]
impl ConfirmationHandler for AutoRejectConfirmation {
    async fn confirm(
        &self,
        _request: &ConfirmationRequest,
        _cancel: CancellationToken,
    ) -> Result<ConfirmationOutcome, ConfirmationError> {
        Ok(ConfirmationOutcome::Reject)
    }
}
