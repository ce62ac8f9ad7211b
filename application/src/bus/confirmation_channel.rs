//! Confirmation channel — attaches a [`ConfirmationHandler`] to the bus.
//!
//! The channel subscribes to forwarded confirmation requests (those the
//! policy engine resolved to `AskUser`), asks the handler in a spawned task
//! and publishes exactly one response per correlation id. Handler errors
//! are published as rejections so the waiting call is never left parked.
//!
//! Each request is answered under its own [`CancellationToken`], cancelled
//! when the bus reports that the waiter gave up. Nothing is published for a
//! cancelled request.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use toolgate_domain::{
    BusMessage, ConfirmationRequest, ConfirmationResponse, CorrelationId, MessageType,
};

use super::message_bus::{MessageBus, SubscriptionId};
use crate::ports::confirmation::{ConfirmationError, ConfirmationHandler};

type InFlight = Arc<Mutex<HashMap<CorrelationId, CancellationToken>>>;

/// An attached confirmation handler. Detaches when dropped.
pub struct ConfirmationChannel {
    bus: Arc<MessageBus>,
    subscriptions: Vec<(MessageType, SubscriptionId)>,
}

impl ConfirmationChannel {
    /// Subscribe `handler` to confirmation requests on `bus`.
    ///
    /// Requests are answered on the current Tokio runtime.
    pub fn attach(bus: Arc<MessageBus>, handler: Arc<dyn ConfirmationHandler>) -> Self {
        let in_flight: InFlight = Arc::default();

        let weak: Weak<MessageBus> = Arc::downgrade(&bus);
        let answering = Arc::clone(&in_flight);
        let requests = bus.subscribe(MessageType::ToolConfirmationRequest, move |msg| {
            let BusMessage::ToolConfirmationRequest(request) = msg else {
                return;
            };
            match Handle::try_current() {
                Ok(runtime) => {
                    let cancel = CancellationToken::new();
                    answering
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .insert(request.correlation_id.clone(), cancel.clone());
                    runtime.spawn(answer(
                        Arc::clone(&handler),
                        request.clone(),
                        cancel,
                        Arc::clone(&answering),
                        Weak::clone(&weak),
                    ));
                }
                Err(_) => warn!(
                    "Confirmation request {} arrived outside a Tokio runtime; not answered",
                    request.correlation_id
                ),
            }
        });

        let cancellations = bus.subscribe(MessageType::ToolConfirmationCancelled, move |msg| {
            let BusMessage::ToolConfirmationCancelled(cancellation) = msg else {
                return;
            };
            let token = in_flight
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&cancellation.correlation_id);
            if let Some(token) = token {
                debug!("Withdrawing confirmation {}", cancellation.correlation_id);
                token.cancel();
            }
        });

        Self {
            bus,
            subscriptions: vec![
                (MessageType::ToolConfirmationRequest, requests),
                (MessageType::ToolConfirmationCancelled, cancellations),
            ],
        }
    }

    /// Stop answering new requests. Requests already being answered still
    /// get their response.
    pub fn detach(mut self) {
        self.unsubscribe();
    }

    fn unsubscribe(&mut self) {
        for (ty, id) in self.subscriptions.drain(..) {
            self.bus.unsubscribe(ty, id);
        }
    }
}

impl Drop for ConfirmationChannel {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

async fn answer(
    handler: Arc<dyn ConfirmationHandler>,
    request: ConfirmationRequest,
    cancel: CancellationToken,
    in_flight: InFlight,
    bus: Weak<MessageBus>,
) {
    let correlation_id = request.correlation_id.clone();
    let result = handler.confirm(&request, cancel.clone()).await;
    in_flight
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .remove(&correlation_id);

    if cancel.is_cancelled() {
        debug!("Confirmation {} was withdrawn; not answering", correlation_id);
        return;
    }

    let response = match result {
        Ok(outcome) => outcome.into_response(correlation_id),
        Err(ConfirmationError::Cancelled) => {
            debug!("Confirmation {} cancelled by handler", correlation_id);
            ConfirmationResponse::rejected(correlation_id)
        }
        Err(e) => {
            warn!(
                "Confirmation for {} failed, treating as rejected: {}",
                request.tool_call.name, e
            );
            ConfirmationResponse::rejected(correlation_id)
        }
    };

    let Some(bus) = bus.upgrade() else {
        debug!("Bus dropped before confirmation {} was answered", request.correlation_id);
        return;
    };
    if let Err(e) = bus.publish(BusMessage::ToolConfirmationResponse(response)) {
        warn!("Failed to publish confirmation response: {}", e);
    }
}
