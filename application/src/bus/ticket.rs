//! Pending confirmation handle.

use std::sync::Arc;

use tokio::sync::oneshot;
use toolgate_domain::{ConfirmationResponse, CorrelationId};

use super::message_bus::{BusError, MessageBus};

/// The waiting side of one confirmation round-trip.
///
/// Created by [`MessageBus::request_confirmation`]. When dropped, the
/// correlation id is deregistered from the bus, so responses arriving
/// later are discarded instead of waking a call that already moved on.
pub struct ConfirmationTicket {
    correlation_id: CorrelationId,
    rx: oneshot::Receiver<ConfirmationResponse>,
    bus: Arc<MessageBus>,
}

impl std::fmt::Debug for ConfirmationTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfirmationTicket")
            .field("correlation_id", &self.correlation_id)
            .finish_non_exhaustive()
    }
}

impl ConfirmationTicket {
    pub(crate) fn new(
        correlation_id: CorrelationId,
        rx: oneshot::Receiver<ConfirmationResponse>,
        bus: Arc<MessageBus>,
    ) -> Self {
        Self {
            correlation_id,
            rx,
            bus,
        }
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    /// The response, if one has already arrived.
    ///
    /// Policy decisions (`Allow` / `Deny`) are answered before
    /// `request_confirmation` returns, so they are always available here.
    pub fn try_response(&mut self) -> Option<ConfirmationResponse> {
        self.rx.try_recv().ok()
    }

    /// Wait for the response.
    ///
    /// Call at most once, and not after `try_response` returned a value.
    pub async fn response(&mut self) -> Result<ConfirmationResponse, BusError> {
        (&mut self.rx)
            .await
            .map_err(|_| BusError::ResponseDropped(self.correlation_id.clone()))
    }
}

impl Drop for ConfirmationTicket {
    fn drop(&mut self) {
        self.bus.cancel_confirmation(&self.correlation_id);
    }
}
