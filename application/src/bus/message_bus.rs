//! Message bus — typed publish/subscribe with policy interception.
//!
//! The bus decouples the scheduler (which asks for confirmation) from
//! whatever answers (policy, a human at a terminal, a test harness). It has
//! three jobs:
//!
//! 1. **Route** every published [`BusMessage`] to the handlers subscribed to
//!    its [`MessageType`].
//! 2. **Intercept** confirmation requests and run the [`PolicyEngine`]
//!    before anything else sees them:
//!
//!    | Decision | What is published |
//!    |----------|-------------------|
//!    | `Allow`  | a confirmed response with the same correlation id |
//!    | `Deny`   | a policy rejection, then a rejected response |
//!    | `AskUser`| the request itself, forwarded to subscribers |
//!
//! 3. **Correlate** confirmation responses with the waiter that asked,
//!    through a `oneshot` per correlation id (see
//!    [`request_confirmation`](MessageBus::request_confirmation)). A waiter
//!    that gives up is announced as a
//!    [`BusMessage::ToolConfirmationCancelled`].
//!
//! Handler failures never escape `publish`: a panicking subscriber is
//! reported as a [`BusMessage::BusError`] and the remaining subscribers
//! still run.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, trace, warn};
use toolgate_domain::{
    BusErrorEvent, BusMessage, ConfirmationCancellation, ConfirmationRequest,
    ConfirmationResponse, ConfirmationSource, CorrelationId, MessageType, PolicyDecision,
    PolicyEngine, PolicyRejection,
};

use super::ticket::ConfirmationTicket;

/// Errors returned by [`MessageBus::publish`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    #[error("{0} message has an empty correlation id")]
    MissingCorrelationId(MessageType),

    #[error("Malformed bus message: {0}")]
    Malformed(String),

    #[error("Confirmation {0} is already pending")]
    DuplicateCorrelationId(CorrelationId),

    #[error("Confirmation {0} was dropped without a response")]
    ResponseDropped(CorrelationId),
}

/// Handle returned by [`MessageBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&BusMessage) + Send + Sync>;

struct Subscriber {
    id: SubscriptionId,
    handler: Handler,
}

/// In-process message bus.
///
/// Locks are `std::sync` and held only for map updates; handlers always run
/// outside them, so a handler may publish or (un)subscribe re-entrantly.
pub struct MessageBus {
    policy: Arc<PolicyEngine>,
    subscribers: RwLock<HashMap<MessageType, Vec<Subscriber>>>,
    /// Confirmation correlation (correlation id -> waiting ticket).
    pending: Mutex<HashMap<CorrelationId, oneshot::Sender<ConfirmationResponse>>>,
    next_id: AtomicU64,
}

impl MessageBus {
    pub fn new(policy: Arc<PolicyEngine>) -> Self {
        Self {
            policy,
            subscribers: RwLock::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn policy(&self) -> &PolicyEngine {
        &self.policy
    }

    // ==================== Subscriptions ====================

    /// Register `handler` for every message of `message_type`.
    ///
    /// Handlers run synchronously inside `publish`, in subscription order.
    /// Long-running work belongs in a spawned task.
    pub fn subscribe<F>(&self, message_type: MessageType, handler: F) -> SubscriptionId
    where
        F: Fn(&BusMessage) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut subscribers = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        subscribers
            .entry(message_type)
            .or_default()
            .push(Subscriber {
                id,
                handler: Arc::new(handler),
            });
        trace!("Bus: subscribed {:?} to {}", id, message_type);
        id
    }

    /// Subscribe through a channel instead of a callback.
    pub fn subscribe_channel(
        &self,
        message_type: MessageType,
    ) -> (SubscriptionId, mpsc::UnboundedReceiver<BusMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.subscribe(message_type, move |msg| {
            let _ = tx.send(msg.clone());
        });
        (id, rx)
    }

    /// Remove a subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, message_type: MessageType, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        let Some(list) = subscribers.get_mut(&message_type) else {
            return false;
        };
        let before = list.len();
        list.retain(|s| s.id != id);
        let removed = list.len() != before;
        if removed {
            trace!("Bus: unsubscribed {:?} from {}", id, message_type);
        }
        removed
    }

    pub fn subscriber_count(&self, message_type: MessageType) -> usize {
        let subscribers = self.subscribers.read().unwrap_or_else(|e| e.into_inner());
        subscribers.get(&message_type).map_or(0, |l| l.len())
    }

    // ==================== Publishing ====================

    /// Publish a message.
    ///
    /// Confirmation requests go through the policy engine first; everything
    /// else is delivered to subscribers as-is. A confirmation message with
    /// an empty correlation id is refused: it is reported as a bus error
    /// event and never reaches the policy engine or any subscriber.
    pub fn publish(&self, message: BusMessage) -> Result<(), BusError> {
        if let Some(id) = message.correlation_id()
            && id.is_empty()
        {
            let err = BusError::MissingCorrelationId(message.message_type());
            self.report_error(Some(message.message_type()), err.to_string());
            return Err(err);
        }

        match message {
            BusMessage::ToolConfirmationRequest(request) => {
                self.handle_confirmation_request(request);
            }
            BusMessage::ToolConfirmationResponse(response) => {
                self.resolve_pending(&response);
                self.dispatch(&BusMessage::ToolConfirmationResponse(response));
            }
            other => self.dispatch(&other),
        }
        Ok(())
    }

    /// Publish a raw JSON message, e.g. one received from an external UI.
    ///
    /// The payload must carry a `type` tag naming a known message type.
    pub fn publish_json(&self, value: Value) -> Result<(), BusError> {
        match serde_json::from_value::<BusMessage>(value) {
            Ok(message) => self.publish(message),
            Err(e) => {
                let err = BusError::Malformed(e.to_string());
                self.report_error(None, err.to_string());
                Err(err)
            }
        }
    }

    fn handle_confirmation_request(&self, request: ConfirmationRequest) {
        let evaluation = self.policy.evaluate(&request.tool_call);
        debug!(
            "Bus: policy {} for {} (call {}, rule {})",
            evaluation.decision,
            request.tool_call.name,
            request.call_id,
            evaluation
                .matched_rule
                .map_or_else(|| "default".to_string(), |r| r.pattern.to_string()),
        );

        match evaluation.decision {
            PolicyDecision::Allow => {
                let response = ConfirmationResponse::confirmed(request.correlation_id)
                    .with_source(ConfirmationSource::Policy);
                self.resolve_pending(&response);
                self.dispatch(&BusMessage::ToolConfirmationResponse(response));
            }
            PolicyDecision::Deny => {
                let rejection = PolicyRejection {
                    correlation_id: request.correlation_id.clone(),
                    call_id: request.call_id,
                    tool_name: request.tool_call.name,
                    rule: evaluation.matched_rule.map(|r| r.pattern.to_string()),
                };
                self.dispatch(&BusMessage::ToolPolicyRejection(rejection));

                let response = ConfirmationResponse::rejected(request.correlation_id)
                    .with_source(ConfirmationSource::Policy);
                self.resolve_pending(&response);
                self.dispatch(&BusMessage::ToolConfirmationResponse(response));
            }
            PolicyDecision::AskUser => {
                if self.subscriber_count(MessageType::ToolConfirmationRequest) == 0 {
                    warn!(
                        "Bus: no confirmation channel attached; call {} will wait",
                        request.call_id
                    );
                }
                self.dispatch(&BusMessage::ToolConfirmationRequest(request));
            }
        }
    }

    // ==================== Correlation ====================

    /// Register a waiter for `request` and publish it.
    ///
    /// The waiter is registered before the request is published, so a
    /// response produced synchronously by the policy engine is not lost.
    /// Dropping the returned ticket abandons the wait; a response that
    /// arrives afterwards is discarded.
    pub fn request_confirmation(
        self: &Arc<Self>,
        request: ConfirmationRequest,
    ) -> Result<ConfirmationTicket, BusError> {
        let correlation_id = request.correlation_id.clone();
        if correlation_id.is_empty() {
            let err = BusError::MissingCorrelationId(MessageType::ToolConfirmationRequest);
            self.report_error(Some(MessageType::ToolConfirmationRequest), err.to_string());
            return Err(err);
        }

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            if pending.contains_key(&correlation_id) {
                return Err(BusError::DuplicateCorrelationId(correlation_id));
            }
            pending.insert(correlation_id.clone(), tx);
        }

        if let Err(e) = self.publish(BusMessage::ToolConfirmationRequest(request)) {
            self.cancel_confirmation(&correlation_id);
            return Err(e);
        }

        Ok(ConfirmationTicket::new(correlation_id, rx, Arc::clone(self)))
    }

    /// Forget a pending confirmation. Returns `false` if none was pending.
    ///
    /// Subscribers are told through a [`BusMessage::ToolConfirmationCancelled`]
    /// so a prompt still showing the request can be withdrawn.
    pub fn cancel_confirmation(&self, correlation_id: &CorrelationId) -> bool {
        let removed = {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            pending.remove(correlation_id).is_some()
        };
        if removed {
            debug!("Bus: abandoned confirmation {}", correlation_id);
            self.dispatch(&BusMessage::ToolConfirmationCancelled(ConfirmationCancellation {
                correlation_id: correlation_id.clone(),
            }));
        }
        removed
    }

    /// Number of confirmations still waiting for a response.
    pub fn pending_confirmations(&self) -> usize {
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Hand a response to its waiter. Only the first response per
    /// correlation id is delivered.
    fn resolve_pending(&self, response: &ConfirmationResponse) {
        let sender = {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            pending.remove(&response.correlation_id)
        };
        match sender {
            Some(tx) => {
                if tx.send(response.clone()).is_err() {
                    debug!(
                        "Bus: waiter for confirmation {} is gone",
                        response.correlation_id
                    );
                }
            }
            None => debug!(
                "Bus: no pending confirmation for {}; response discarded",
                response.correlation_id
            ),
        }
    }

    // ==================== Dispatch ====================

    fn dispatch(&self, message: &BusMessage) {
        let message_type = message.message_type();
        // Snapshot so handlers run without the lock held
        let handlers: Vec<(SubscriptionId, Handler)> = {
            let subscribers = self.subscribers.read().unwrap_or_else(|e| e.into_inner());
            subscribers
                .get(&message_type)
                .map(|list| {
                    list.iter()
                        .map(|s| (s.id, Arc::clone(&s.handler)))
                        .collect()
                })
                .unwrap_or_default()
        };

        trace!("Bus: dispatching {} to {} handler(s)", message_type, handlers.len());

        for (id, handler) in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(message))).is_err() {
                let reason = format!("Subscriber {:?} panicked while handling {}", id, message_type);
                if message_type == MessageType::BusError {
                    error!("Bus: {}", reason);
                } else {
                    self.report_error(Some(message_type), reason);
                }
            }
        }
    }

    fn report_error(&self, message_type: Option<MessageType>, error: String) {
        warn!("Bus: {}", error);
        self.dispatch(&BusMessage::BusError(BusErrorEvent {
            message_type,
            error,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use toolgate_domain::{PolicyRule, ToolCallDescription};

    fn bus(engine: PolicyEngine) -> Arc<MessageBus> {
        Arc::new(MessageBus::new(Arc::new(engine)))
    }

    fn request(correlation_id: &str, command: &str) -> ConfirmationRequest {
        ConfirmationRequest::new(
            correlation_id,
            "call-1",
            ToolCallDescription::new("shell_exec", json!({ "command": command })),
        )
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<BusMessage>) -> Vec<BusMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[test]
    fn test_allow_publishes_confirmed_response() {
        let bus = bus(PolicyEngine::allow_all());
        let (_, mut requests) = bus.subscribe_channel(MessageType::ToolConfirmationRequest);
        let (_, mut responses) = bus.subscribe_channel(MessageType::ToolConfirmationResponse);

        bus.publish(BusMessage::ToolConfirmationRequest(request("c-1", "ls")))
            .unwrap();

        assert!(drain(&mut requests).is_empty());
        let responses = drain(&mut responses);
        assert_eq!(responses.len(), 1);
        let BusMessage::ToolConfirmationResponse(resp) = &responses[0] else {
            panic!("expected response");
        };
        assert!(resp.confirmed);
        assert_eq!(resp.correlation_id.as_str(), "c-1");
        assert!(resp.is_policy_decision());
    }

    #[test]
    fn test_deny_publishes_rejection_then_response() {
        let engine = PolicyEngine::allow_all().with_rule(PolicyRule::deny("shell_exec").unwrap());
        let bus = bus(engine);
        let order = Arc::new(Mutex::new(Vec::new()));
        for ty in [
            MessageType::ToolPolicyRejection,
            MessageType::ToolConfirmationResponse,
            MessageType::ToolConfirmationRequest,
        ] {
            let order = Arc::clone(&order);
            bus.subscribe(ty, move |msg| order.lock().unwrap().push(msg.clone()));
        }

        bus.publish(BusMessage::ToolConfirmationRequest(request("c-2", "rm -rf /")))
            .unwrap();

        let order = order.lock().unwrap();
        assert_eq!(order.len(), 2);
        let BusMessage::ToolPolicyRejection(rejection) = &order[0] else {
            panic!("expected rejection first");
        };
        assert_eq!(rejection.rule.as_deref(), Some("shell_exec"));
        let BusMessage::ToolConfirmationResponse(resp) = &order[1] else {
            panic!("expected response second");
        };
        assert!(!resp.confirmed);
        assert_eq!(resp.correlation_id.as_str(), "c-2");
    }

    #[test]
    fn test_ask_user_forwards_request() {
        let bus = bus(PolicyEngine::default());
        let (_, mut requests) = bus.subscribe_channel(MessageType::ToolConfirmationRequest);
        let (_, mut responses) = bus.subscribe_channel(MessageType::ToolConfirmationResponse);

        bus.publish(BusMessage::ToolConfirmationRequest(request("c-3", "ls")))
            .unwrap();

        let forwarded = drain(&mut requests);
        assert_eq!(forwarded.len(), 1);
        assert_eq!(forwarded[0].correlation_id().unwrap().as_str(), "c-3");
        assert!(drain(&mut responses).is_empty());
    }

    #[test]
    fn test_empty_correlation_id_is_refused() {
        let bus = bus(PolicyEngine::allow_all());
        let (_, mut errors) = bus.subscribe_channel(MessageType::BusError);
        let (_, mut responses) = bus.subscribe_channel(MessageType::ToolConfirmationResponse);

        let err = bus
            .publish(BusMessage::ToolConfirmationRequest(request("", "ls")))
            .unwrap_err();

        assert_eq!(
            err,
            BusError::MissingCorrelationId(MessageType::ToolConfirmationRequest)
        );
        assert_eq!(drain(&mut errors).len(), 1);
        assert!(drain(&mut responses).is_empty());
    }

    #[test]
    fn test_untagged_json_is_refused() {
        let bus = bus(PolicyEngine::allow_all());
        let (_, mut errors) = bus.subscribe_channel(MessageType::BusError);

        let err = bus
            .publish_json(json!({"correlation_id": "c-4", "confirmed": true}))
            .unwrap_err();
        assert!(matches!(err, BusError::Malformed(_)));
        assert_eq!(drain(&mut errors).len(), 1);

        bus.publish_json(json!({
            "type": "tool-confirmation-response",
            "correlation_id": "c-4",
            "confirmed": true
        }))
        .unwrap();
    }

    #[test]
    fn test_panicking_handler_does_not_stop_others() {
        let bus = bus(PolicyEngine::default());
        let (_, mut errors) = bus.subscribe_channel(MessageType::BusError);
        bus.subscribe(MessageType::ToolConfirmationRequest, |_| panic!("boom"));
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = Arc::clone(&seen);
        bus.subscribe(MessageType::ToolConfirmationRequest, move |_| {
            seen_clone.fetch_add(1, Ordering::SeqCst);
        });

        let result = bus.publish(BusMessage::ToolConfirmationRequest(request("c-5", "ls")));

        assert!(result.is_ok());
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        let errors = drain(&mut errors);
        assert_eq!(errors.len(), 1);
        let BusMessage::BusError(event) = &errors[0] else {
            panic!("expected bus error");
        };
        assert_eq!(event.message_type, Some(MessageType::ToolConfirmationRequest));
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let bus = bus(PolicyEngine::default());
        let (id, mut rx) = bus.subscribe_channel(MessageType::ToolConfirmationRequest);

        assert!(bus.unsubscribe(MessageType::ToolConfirmationRequest, id));
        assert!(!bus.unsubscribe(MessageType::ToolConfirmationRequest, id));
        assert!(!bus.unsubscribe(MessageType::BusError, id));

        bus.publish(BusMessage::ToolConfirmationRequest(request("c-6", "ls")))
            .unwrap();
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_ticket_receives_policy_response() {
        let bus = bus(PolicyEngine::allow_all());
        let mut ticket = bus.request_confirmation(request("c-7", "ls")).unwrap();

        let resp = ticket.try_response().expect("resolved synchronously");
        assert!(resp.confirmed);
        assert_eq!(bus.pending_confirmations(), 0);
    }

    #[tokio::test]
    async fn test_ticket_receives_channel_response() {
        let bus = bus(PolicyEngine::default());
        let mut ticket = bus.request_confirmation(request("c-8", "ls")).unwrap();
        assert!(ticket.try_response().is_none());
        assert_eq!(bus.pending_confirmations(), 1);

        bus.publish(BusMessage::ToolConfirmationResponse(
            ConfirmationResponse::rejected("c-8"),
        ))
        .unwrap();

        let resp = ticket.response().await.unwrap();
        assert!(!resp.confirmed);
        assert_eq!(bus.pending_confirmations(), 0);
    }

    #[test]
    fn test_dropped_ticket_discards_late_response() {
        let bus = bus(PolicyEngine::default());
        let ticket = bus.request_confirmation(request("c-9", "ls")).unwrap();
        drop(ticket);
        assert_eq!(bus.pending_confirmations(), 0);

        // A late response is a harmless no-op
        bus.publish(BusMessage::ToolConfirmationResponse(
            ConfirmationResponse::confirmed("c-9"),
        ))
        .unwrap();
        assert_eq!(bus.pending_confirmations(), 0);
    }

    #[test]
    fn test_dropped_ticket_announces_cancellation() {
        let bus = bus(PolicyEngine::default());
        let (_, mut rx) = bus.subscribe_channel(MessageType::ToolConfirmationCancelled);

        let ticket = bus.request_confirmation(request("c-11", "ls")).unwrap();
        drop(ticket);

        let messages = drain(&mut rx);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].correlation_id().unwrap().as_str(), "c-11");
    }

    #[tokio::test]
    async fn test_answered_ticket_is_not_announced() {
        let bus = bus(PolicyEngine::allow_all());
        let (_, mut rx) = bus.subscribe_channel(MessageType::ToolConfirmationCancelled);

        let mut ticket = bus.request_confirmation(request("c-12", "ls")).unwrap();
        assert!(ticket.try_response().is_some());
        drop(ticket);

        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_duplicate_pending_correlation_id() {
        let bus = bus(PolicyEngine::default());
        let _ticket = bus.request_confirmation(request("c-10", "ls")).unwrap();
        let err = bus.request_confirmation(request("c-10", "ls")).unwrap_err();
        assert_eq!(err, BusError::DuplicateCorrelationId(CorrelationId::new("c-10")));
        assert_eq!(bus.pending_confirmations(), 1);
    }
}
