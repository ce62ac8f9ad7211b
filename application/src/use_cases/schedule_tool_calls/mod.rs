//! Schedule tool calls use case.
//!
//! [`ToolCallScheduler`] takes the tool calls of one model turn, drives each
//! through its lifecycle and reports exactly one [`ToolCallResponse`] per
//! request:
//!
//! ```text
//! validating ─ resolve tool, check args
//!     ↓
//! scheduled ─ ask the bus (policy: Allow / Deny / AskUser)
//!     ↓
//! awaiting_confirmation ─ only for AskUser; bounded by the optional timeout
//!     ↓
//! executing ─ Tool::execute, bounded by max_concurrent_executions
//!     ↓
//! success | error | cancelled
//! ```
//!
//! Every call runs in its own task with its own state, so a call parked on
//! confirmation never holds up its siblings. Cancellation is a
//! [`CancellationToken`] hierarchy: caller token → batch token → call
//! token. Cancelling any level aborts the calls below it.

mod batch;
mod call_table;
#[cfg(test)]
mod tests;

pub use batch::ToolCallBatch;

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde_json::Value;
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use toolgate_domain::{
    BusMessage, CallId, ConfirmationRequest, ConfirmationResponse, CorrelationId,
    ExecutionReport, ToolCallError, ToolCallRecord, ToolCallRequest, ToolCallResponse,
    ToolCallState,
};
use uuid::Uuid;

use crate::bus::{ConfirmationTicket, MessageBus};
use crate::config::SchedulerConfig;
use crate::ports::tool::ToolExecutionError;
use crate::registry::{ResolvedTool, ToolRegistry};
use call_table::CallTable;

/// Orchestrates the lifecycle of every requested tool call.
pub struct ToolCallScheduler {
    registry: Arc<ToolRegistry>,
    bus: Arc<MessageBus>,
    config: SchedulerConfig,
    calls: Arc<CallTable>,
    execution_slots: Option<Arc<Semaphore>>,
}

impl ToolCallScheduler {
    pub fn new(registry: Arc<ToolRegistry>, bus: Arc<MessageBus>) -> Self {
        Self {
            registry,
            bus,
            config: SchedulerConfig::default(),
            calls: Arc::new(CallTable::default()),
            execution_slots: None,
        }
    }

    pub fn with_config(mut self, config: SchedulerConfig) -> Self {
        self.execution_slots = config
            .max_concurrent_executions
            .map(|max| Arc::new(Semaphore::new(max.max(1))));
        self.config = config;
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn bus(&self) -> &Arc<MessageBus> {
        &self.bus
    }

    /// Start every request and return the batch handle.
    ///
    /// Must be called within a Tokio runtime. Cancelling `cancel` (or the
    /// returned batch) aborts all calls that have not finished.
    pub fn schedule(
        &self,
        requests: Vec<ToolCallRequest>,
        cancel: &CancellationToken,
    ) -> ToolCallBatch {
        let batch_token = cancel.child_token();
        let (tx, rx) = mpsc::unbounded_channel();
        let expected = requests.len();
        info!("Scheduling {} tool call(s)", expected);

        for request in requests {
            let call_token = batch_token.child_token();
            let record = ToolCallRecord::new(request.call_id.clone(), request.name.clone());
            if !self.calls.insert(record, call_token.clone()) {
                warn!("Call id {} is already in flight; refusing duplicate", request.call_id);
                let error = ToolCallError::invalid_arguments(format!(
                    "Call id '{}' is already in flight",
                    request.call_id
                ));
                let _ = tx.send(ToolCallResponse::failure(&request, error));
                continue;
            }

            let runner = CallRunner {
                registry: Arc::clone(&self.registry),
                bus: Arc::clone(&self.bus),
                calls: Arc::clone(&self.calls),
                confirmation_timeout: self.config.confirmation_timeout,
                execution_slots: self.execution_slots.clone(),
                request,
                token: call_token,
                tx: tx.clone(),
            };
            tokio::spawn(runner.run());
        }

        ToolCallBatch::new(rx, expected, batch_token)
    }

    /// Schedule and wait for every response.
    pub async fn execute_batch(
        &self,
        requests: Vec<ToolCallRequest>,
        cancel: &CancellationToken,
    ) -> Vec<ToolCallResponse> {
        self.schedule(requests, cancel).collect_all().await
    }

    /// Cancel a single in-flight call.
    ///
    /// Returns `false` if the call is unknown, already finished or already
    /// cancelled.
    pub fn cancel_call(&self, call_id: &CallId) -> bool {
        let cancelled = self.calls.cancel(call_id);
        if cancelled {
            info!("Cancelling call {}", call_id);
        }
        cancelled
    }

    /// Current state of an in-flight call. Finished calls are forgotten.
    pub fn call_state(&self, call_id: &CallId) -> Option<ToolCallState> {
        self.calls.state(call_id)
    }

    /// Number of calls not yet finished.
    pub fn in_flight(&self) -> usize {
        self.calls.len()
    }

    pub fn snapshot(&self) -> Vec<ToolCallRecord> {
        self.calls.snapshot()
    }
}

/// How a call ended, before it is recorded.
struct Outcome {
    state: ToolCallState,
    response: ToolCallResponse,
    executed: bool,
}

/// One call's task.
struct CallRunner {
    registry: Arc<ToolRegistry>,
    bus: Arc<MessageBus>,
    calls: Arc<CallTable>,
    confirmation_timeout: Option<Duration>,
    execution_slots: Option<Arc<Semaphore>>,
    request: ToolCallRequest,
    token: CancellationToken,
    tx: mpsc::UnboundedSender<ToolCallResponse>,
}

impl CallRunner {
    async fn run(self) {
        let outcome = self.drive().await;
        self.finish(outcome);
    }

    async fn drive(&self) -> Outcome {
        let request = &self.request;

        if self.token.is_cancelled() {
            return self.fail(
                ToolCallState::Cancelled,
                ToolCallError::aborted("Call was cancelled before it started"),
            );
        }

        // Validating
        let Some(resolved) = self.registry.resolve(&request.name) else {
            return self.fail(
                ToolCallState::Error,
                ToolCallError::tool_not_found(&request.name),
            );
        };
        self.calls.set_tool_name(&request.call_id, &resolved.canonical);

        match validate(&resolved, &request.args) {
            Ok(Ok(())) => {}
            Ok(Err(reason)) => {
                return self.fail(
                    ToolCallState::Error,
                    ToolCallError::invalid_arguments(reason),
                );
            }
            Err(panic) => return self.fail(ToolCallState::Error, panic),
        }
        self.advance(ToolCallState::Scheduled);

        // Policy, and confirmation if policy asks for it
        let correlation_id = CorrelationId::new(Uuid::new_v4().to_string());
        let description = self
            .registry
            .describe(&resolved.canonical, request.args.clone());
        let mut ticket = match self.bus.request_confirmation(ConfirmationRequest::new(
            correlation_id.clone(),
            request.call_id.clone(),
            description,
        )) {
            Ok(ticket) => ticket,
            Err(e) => {
                return self.fail(
                    ToolCallState::Cancelled,
                    ToolCallError::aborted(format!("Confirmation could not be requested: {e}")),
                );
            }
        };

        let confirmation = match ticket.try_response() {
            Some(response) if response.is_policy_decision() => response,
            early => {
                self.advance(ToolCallState::AwaitingConfirmation { correlation_id });
                debug!("Call {} awaiting confirmation", request.call_id);
                match early {
                    Some(response) => response,
                    None => match self.await_confirmation(&mut ticket).await {
                        Ok(response) => response,
                        Err(error) => return self.fail(ToolCallState::Cancelled, error),
                    },
                }
            }
        };
        drop(ticket);

        if !confirmation.confirmed {
            let error = if confirmation.is_policy_decision() {
                ToolCallError::policy_denied(&resolved.canonical)
            } else {
                ToolCallError::user_rejected(&resolved.canonical)
            };
            return self.fail(ToolCallState::Cancelled, error);
        }

        let args = match confirmation.approved_args_override {
            Some(args) => {
                match validate(&resolved, &args) {
                    Ok(Ok(())) => {}
                    Ok(Err(reason)) => {
                        return self.fail(
                            ToolCallState::Error,
                            ToolCallError::invalid_arguments(format!(
                                "Approved argument override is invalid: {reason}"
                            )),
                        );
                    }
                    Err(panic) => return self.fail(ToolCallState::Error, panic),
                }
                debug!("Call {} runs with overridden arguments", request.call_id);
                args
            }
            None => request.args.clone(),
        };

        self.execute(&resolved, args).await
    }

    async fn await_confirmation(
        &self,
        ticket: &mut ConfirmationTicket,
    ) -> Result<ConfirmationResponse, ToolCallError> {
        let timeout = self.confirmation_timeout;
        let wait = async {
            match timeout {
                Some(limit) => match tokio::time::timeout(limit, ticket.response()).await {
                    Ok(result) => result.map_err(|e| ToolCallError::aborted(e.to_string())),
                    Err(_) => Err(ToolCallError::aborted(format!(
                        "Confirmation timed out after {}ms",
                        limit.as_millis()
                    ))),
                },
                None => ticket
                    .response()
                    .await
                    .map_err(|e| ToolCallError::aborted(e.to_string())),
            }
        };

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(ToolCallError::aborted(
                "Call was cancelled while awaiting confirmation",
            )),
            result = wait => result,
        }
    }

    async fn execute(&self, resolved: &ResolvedTool, args: Value) -> Outcome {
        let _permit = match &self.execution_slots {
            Some(slots) => tokio::select! {
                biased;
                _ = self.token.cancelled() => {
                    return self.fail(
                        ToolCallState::Cancelled,
                        ToolCallError::aborted("Call was cancelled while waiting to execute"),
                    );
                }
                permit = Arc::clone(slots).acquire_owned() => match permit {
                    Ok(permit) => Some(permit),
                    Err(_) => {
                        return self.fail(
                            ToolCallState::Cancelled,
                            ToolCallError::aborted("Execution slots are closed"),
                        );
                    }
                },
            },
            None => None,
        };

        self.advance(ToolCallState::Executing);
        debug!("Executing {} (call {})", resolved.canonical, self.request.call_id);

        let result = tokio::select! {
            biased;
            _ = self.token.cancelled() => {
                return self.executed(
                    ToolCallState::Error,
                    ToolCallResponse::failure(&self.request, ToolCallError::aborted("Execution aborted")),
                );
            }
            result = AssertUnwindSafe(resolved.tool.execute(args, self.token.child_token()))
                .catch_unwind() => result,
        };

        let result = match result {
            Ok(result) => result,
            Err(payload) => {
                let error = tool_panicked(&resolved.canonical, payload.as_ref());
                return self.executed(
                    ToolCallState::Error,
                    ToolCallResponse::failure(&self.request, error),
                );
            }
        };

        match result {
            Ok(output) => self.executed(
                ToolCallState::Success,
                ToolCallResponse::success(&self.request, output),
            ),
            Err(ToolExecutionError::Cancelled) => self.executed(
                ToolCallState::Error,
                ToolCallResponse::failure(&self.request, ToolCallError::aborted("Execution cancelled")),
            ),
            Err(e) => self.executed(
                ToolCallState::Error,
                ToolCallResponse::failure(&self.request, ToolCallError::execution_failed(e.to_string())),
            ),
        }
    }

    /// Record the terminal state and deliver the response.
    fn finish(&self, outcome: Outcome) {
        let call_id = &self.request.call_id;
        let mut response = outcome.response;
        let tool_name = match self.calls.finish(call_id, outcome.state) {
            Ok(record) => {
                if let Some(duration_ms) = record.duration_ms() {
                    response = response.with_duration(duration_ms);
                }
                record.tool_name
            }
            Err(e) => {
                warn!("{}", e);
                self.request.name.clone()
            }
        };

        match &response.error {
            None => info!("Tool {} (call {}) succeeded", tool_name, call_id),
            Some(err) if err.kind.is_refusal() => {
                info!("Tool {} (call {}) refused: {}", tool_name, call_id, err)
            }
            Some(err) => warn!("Tool {} (call {}) failed: {}", tool_name, call_id, err),
        }

        if outcome.executed {
            let report = ExecutionReport {
                call_id: call_id.clone(),
                tool_name,
                duration_ms: response.duration_ms,
                error: response.error.clone(),
            };
            let message = if response.is_success() {
                BusMessage::ToolExecutionSucceeded(report)
            } else {
                BusMessage::ToolExecutionFailed(report)
            };
            if let Err(e) = self.bus.publish(message) {
                warn!("Failed to publish execution report: {}", e);
            }
        }

        if self.tx.send(response).is_err() {
            debug!("Batch dropped; response for call {} discarded", call_id);
        }
    }

    fn advance(&self, next: ToolCallState) {
        if let Err(e) = self.calls.transition(&self.request.call_id, next) {
            warn!("{}", e);
        }
    }

    fn fail(&self, state: ToolCallState, error: ToolCallError) -> Outcome {
        Outcome {
            state,
            response: ToolCallResponse::failure(&self.request, error),
            executed: false,
        }
    }

    fn executed(&self, state: ToolCallState, response: ToolCallResponse) -> Outcome {
        Outcome {
            state,
            response,
            executed: true,
        }
    }
}

/// Run the tool's argument check, turning a panic into an
/// `execution-failed` error.
fn validate(resolved: &ResolvedTool, args: &Value) -> Result<Result<(), String>, ToolCallError> {
    catch_unwind(AssertUnwindSafe(|| resolved.tool.validate(args)))
        .map_err(|payload| tool_panicked(&resolved.canonical, payload.as_ref()))
}

fn tool_panicked(tool: &str, payload: &(dyn Any + Send)) -> ToolCallError {
    let reason = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    warn!("Tool {} panicked: {}", tool, reason);
    ToolCallError::execution_failed(format!("Tool panicked: {reason}"))
}
