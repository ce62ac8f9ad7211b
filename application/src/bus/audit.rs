//! Audit trail — forwards every bus message to an [`AuditLogger`].

use std::sync::Arc;

use toolgate_domain::{BusMessage, MessageType};
use tracing::warn;

use super::message_bus::{MessageBus, SubscriptionId};
use crate::ports::audit_logger::{AuditEvent, AuditLogger};

/// Subscription of an audit logger to all message types.
/// Unsubscribes when dropped.
pub struct AuditTrail {
    bus: Arc<MessageBus>,
    subscriptions: Vec<(MessageType, SubscriptionId)>,
}

impl AuditTrail {
    pub fn attach(bus: Arc<MessageBus>, logger: Arc<dyn AuditLogger>) -> Self {
        let subscriptions = MessageType::ALL
            .iter()
            .map(|&ty| {
                let logger = Arc::clone(&logger);
                let id = bus.subscribe(ty, move |msg| logger.log(audit_event(msg)));
                (ty, id)
            })
            .collect();
        Self { bus, subscriptions }
    }
}

impl Drop for AuditTrail {
    fn drop(&mut self) {
        for (ty, id) in self.subscriptions.drain(..) {
            self.bus.unsubscribe(ty, id);
        }
    }
}

fn audit_event(message: &BusMessage) -> AuditEvent {
    let payload = serde_json::to_value(message).unwrap_or_else(|e| {
        warn!("Failed to serialize {} for audit: {}", message.message_type(), e);
        serde_json::Value::Null
    });
    AuditEvent::new(message.message_type().as_str(), payload)
}
