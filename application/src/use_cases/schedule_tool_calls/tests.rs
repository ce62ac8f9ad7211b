use super::*;
use crate::bus::ConfirmationChannel;
use crate::ports::confirmation::{
    AutoApproveConfirmation, AutoRejectConfirmation, ConfirmationError, ConfirmationHandler,
    ConfirmationOutcome,
};
use crate::ports::tool::Tool;
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use toolgate_domain::{
    MessageType, PolicyEngine, PolicyRule, ResponseStatus, ToolDefinition, ToolErrorKind,
    ToolKind, ToolOutput, ToolParameter,
};

// ==================== Fake tools ====================

struct EchoTool {
    definition: ToolDefinition,
    executions: AtomicUsize,
    last_args: Mutex<Option<Value>>,
}

impl EchoTool {
    fn new() -> Self {
        Self {
            definition: ToolDefinition::new("echo", "Echo text back", ToolKind::ReadOnly)
                .with_parameter(ToolParameter::new("text", "Text to echo", true).with_type("string")),
            executions: AtomicUsize::new(0),
            last_args: Mutex::new(None),
        }
    }

    fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Tool for EchoTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    fn aliases(&self) -> &[&'static str] {
        &["say"]
    }

    async fn execute(
        &self,
        args: Value,
        _cancel: CancellationToken,
    ) -> Result<ToolOutput, ToolExecutionError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        let text = args["text"].as_str().unwrap_or_default().to_string();
        *self.last_args.lock().unwrap() = Some(args);
        Ok(ToolOutput::text(text))
    }
}

/// Sleeps for `ms`, tracking how many executions overlap.
struct SlowTool {
    definition: ToolDefinition,
    running: AtomicUsize,
    max_running: AtomicUsize,
    completions: AtomicUsize,
}

impl SlowTool {
    fn new() -> Self {
        Self {
            definition: ToolDefinition::new("slow", "Sleep", ToolKind::Execute)
                .with_parameter(ToolParameter::new("ms", "Milliseconds", true).with_type("integer")),
            running: AtomicUsize::new(0),
            max_running: AtomicUsize::new(0),
            completions: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Tool for SlowTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        args: Value,
        cancel: CancellationToken,
    ) -> Result<ToolOutput, ToolExecutionError> {
        let ms = args["ms"].as_u64().unwrap_or(0);
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);

        tokio::select! {
            _ = cancel.cancelled() => {
                self.running.fetch_sub(1, Ordering::SeqCst);
                Err(ToolExecutionError::Cancelled)
            }
            _ = tokio::time::sleep(Duration::from_millis(ms)) => {
                self.running.fetch_sub(1, Ordering::SeqCst);
                self.completions.fetch_add(1, Ordering::SeqCst);
                Ok(ToolOutput::text(format!("slept {ms}ms")))
            }
        }
    }
}

struct FailingTool {
    definition: ToolDefinition,
}

impl FailingTool {
    fn new() -> Self {
        Self {
            definition: ToolDefinition::new("fail", "Always fails", ToolKind::Mutating),
        }
    }
}

#[async_trait]
impl Tool for FailingTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        _args: Value,
        _cancel: CancellationToken,
    ) -> Result<ToolOutput, ToolExecutionError> {
        Err(ToolExecutionError::failed("disk full"))
    }
}

/// Panics in `validate` when asked to, otherwise in `execute`.
struct PanickingTool {
    definition: ToolDefinition,
}

impl PanickingTool {
    fn new() -> Self {
        Self {
            definition: ToolDefinition::new("boom", "Always panics", ToolKind::Execute),
        }
    }
}

#[async_trait]
impl Tool for PanickingTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    fn validate(&self, args: &Value) -> Result<(), String> {
        if args["in_validate"].as_bool() == Some(true) {
            panic!("validator exploded");
        }
        Ok(())
    }

    async fn execute(
        &self,
        _args: Value,
        _cancel: CancellationToken,
    ) -> Result<ToolOutput, ToolExecutionError> {
        panic!("tool exploded");
    }
}

/// Approves with replacement arguments.
struct OverrideConfirmation(Value);

#[async_trait]
impl ConfirmationHandler for OverrideConfirmation {
    async fn confirm(
        &self,
        _request: &ConfirmationRequest,
        _cancel: CancellationToken,
    ) -> Result<ConfirmationOutcome, ConfirmationError> {
        Ok(ConfirmationOutcome::ApproveWithArgs(self.0.clone()))
    }
}

// ==================== Harness ====================

struct Harness {
    scheduler: ToolCallScheduler,
    bus: Arc<MessageBus>,
    echo: Arc<EchoTool>,
    slow: Arc<SlowTool>,
}

fn harness(engine: PolicyEngine, config: SchedulerConfig) -> Harness {
    let echo = Arc::new(EchoTool::new());
    let slow = Arc::new(SlowTool::new());
    let mut registry = ToolRegistry::new();
    registry.register(echo.clone()).unwrap();
    registry.register(slow.clone()).unwrap();
    registry.register(Arc::new(FailingTool::new())).unwrap();
    registry.register(Arc::new(PanickingTool::new())).unwrap();

    let bus = Arc::new(MessageBus::new(Arc::new(engine)));
    let scheduler =
        ToolCallScheduler::new(Arc::new(registry), Arc::clone(&bus)).with_config(config);
    Harness {
        scheduler,
        bus,
        echo,
        slow,
    }
}

fn allow_all() -> Harness {
    harness(PolicyEngine::allow_all(), SchedulerConfig::default())
}

fn echo(id: &str, text: &str) -> ToolCallRequest {
    ToolCallRequest::new(id, "echo", json!({ "text": text }))
}

fn slow(id: &str, ms: u64) -> ToolCallRequest {
    ToolCallRequest::new(id, "slow", json!({ "ms": ms }))
}

async fn collect(batch: ToolCallBatch) -> Vec<ToolCallResponse> {
    tokio::time::timeout(Duration::from_secs(5), batch.collect_all())
        .await
        .expect("batch did not finish")
}

fn by_id<'a>(responses: &'a [ToolCallResponse], id: &str) -> &'a ToolCallResponse {
    responses
        .iter()
        .find(|r| r.call_id.as_str() == id)
        .unwrap_or_else(|| panic!("no response for {id}"))
}

async fn next_request(rx: &mut mpsc::UnboundedReceiver<BusMessage>) -> ConfirmationRequest {
    match tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
        Ok(Some(BusMessage::ToolConfirmationRequest(request))) => request,
        other => panic!("expected confirmation request, got {other:?}"),
    }
}

// ==================== Policy outcomes ====================

#[tokio::test]
async fn test_allowed_call_executes() {
    let h = allow_all();
    let responses = collect(h.scheduler.schedule(vec![echo("1", "hi")], &CancellationToken::new())).await;

    assert_eq!(responses.len(), 1);
    let resp = &responses[0];
    assert!(resp.is_success());
    assert_eq!(resp.text(), "hi");
    assert!(resp.duration_ms.is_some());
    assert_eq!(h.echo.executions(), 1);
    assert_eq!(h.scheduler.in_flight(), 0);
}

#[tokio::test]
async fn test_denied_call_never_executes() {
    let engine = PolicyEngine::allow_all().with_rule(PolicyRule::deny("echo").unwrap());
    let h = harness(engine, SchedulerConfig::default());
    let (_, mut rejections) = h.bus.subscribe_channel(MessageType::ToolPolicyRejection);

    let responses = collect(h.scheduler.schedule(vec![echo("1", "hi")], &CancellationToken::new())).await;

    let resp = &responses[0];
    assert_eq!(resp.error_kind(), Some(ToolErrorKind::PolicyDenied));
    assert_eq!(resp.status(), ResponseStatus::Rejected);
    assert_eq!(h.echo.executions(), 0);
    assert!(matches!(
        rejections.try_recv(),
        Ok(BusMessage::ToolPolicyRejection(r)) if r.call_id.as_str() == "1"
    ));
}

#[tokio::test]
async fn test_unknown_tool_is_reported_without_policy_check() {
    let h = allow_all();
    let (_, mut responses_seen) = h.bus.subscribe_channel(MessageType::ToolConfirmationResponse);

    let responses = collect(h.scheduler.schedule(
        vec![ToolCallRequest::new("1", "teleport", json!({}))],
        &CancellationToken::new(),
    ))
    .await;

    assert_eq!(responses[0].error_kind(), Some(ToolErrorKind::ToolNotFound));
    assert!(responses_seen.try_recv().is_err());
}

#[tokio::test]
async fn test_invalid_arguments_are_rejected_before_policy() {
    let h = allow_all();
    let (_, mut responses_seen) = h.bus.subscribe_channel(MessageType::ToolConfirmationResponse);

    let responses = collect(h.scheduler.schedule(
        vec![ToolCallRequest::new("1", "echo", json!({ "text": 5 }))],
        &CancellationToken::new(),
    ))
    .await;

    assert_eq!(responses[0].error_kind(), Some(ToolErrorKind::InvalidArguments));
    assert_eq!(h.echo.executions(), 0);
    assert!(responses_seen.try_recv().is_err());
}

#[tokio::test]
async fn test_alias_is_resolved_and_matched_by_policy() {
    let engine = PolicyEngine::deny_all().with_rule(PolicyRule::allow("say").unwrap());
    let h = harness(engine, SchedulerConfig::default());

    let responses = collect(h.scheduler.schedule(
        vec![ToolCallRequest::new("1", "say", json!({ "text": "hello" }))],
        &CancellationToken::new(),
    ))
    .await;

    assert!(responses[0].is_success());
    assert_eq!(responses[0].tool_name, "say");
    assert_eq!(h.echo.executions(), 1);
}

#[tokio::test]
async fn test_arg_qualified_allow_bypasses_confirmation() {
    let engine = PolicyEngine::default()
        .with_rule(PolicyRule::ask_user("echo").unwrap())
        .with_rule(PolicyRule::allow("echo(hello)").unwrap());
    let config =
        SchedulerConfig::default().with_confirmation_timeout(Some(Duration::from_millis(50)));
    let h = harness(engine, config);

    let responses = collect(h.scheduler.schedule(
        vec![echo("1", "hello world"), echo("2", "goodbye")],
        &CancellationToken::new(),
    ))
    .await;

    assert!(by_id(&responses, "1").is_success());
    assert_eq!(by_id(&responses, "2").error_kind(), Some(ToolErrorKind::Aborted));
    assert_eq!(h.echo.executions(), 1);
}

// ==================== Confirmation ====================

#[tokio::test]
async fn test_confirmation_timeout_aborts_call() {
    let config =
        SchedulerConfig::default().with_confirmation_timeout(Some(Duration::from_millis(50)));
    let h = harness(PolicyEngine::default(), config);
    let (_, mut requests) = h.bus.subscribe_channel(MessageType::ToolConfirmationRequest);

    let responses = collect(h.scheduler.schedule(vec![echo("1", "hi")], &CancellationToken::new())).await;

    let error = responses[0].error.as_ref().unwrap();
    assert_eq!(error.kind, ToolErrorKind::Aborted);
    assert!(error.message.starts_with("Confirmation timed out"));
    assert_eq!(h.bus.pending_confirmations(), 0);

    // A late approval must not revive the call
    let request = next_request(&mut requests).await;
    h.bus
        .publish(BusMessage::ToolConfirmationResponse(
            ConfirmationResponse::confirmed(request.correlation_id),
        ))
        .unwrap();
    tokio::task::yield_now().await;
    assert_eq!(h.echo.executions(), 0);
    assert_eq!(h.scheduler.in_flight(), 0);
}

#[tokio::test]
async fn test_awaiting_call_does_not_block_allowed_call() {
    let engine = PolicyEngine::default().with_rule(PolicyRule::allow("echo").unwrap());
    let h = harness(engine, SchedulerConfig::default());
    let (_, mut requests) = h.bus.subscribe_channel(MessageType::ToolConfirmationRequest);

    let mut batch = h
        .scheduler
        .schedule(vec![slow("ask", 1), echo("auto", "hi")], &CancellationToken::new());

    let first = batch.next_response().await.unwrap();
    assert_eq!(first.call_id.as_str(), "auto");
    assert!(first.is_success());

    let request = next_request(&mut requests).await;
    assert_eq!(request.call_id.as_str(), "ask");
    assert_eq!(
        h.scheduler.call_state(&CallId::new("ask")),
        Some(ToolCallState::AwaitingConfirmation {
            correlation_id: request.correlation_id.clone()
        })
    );
    h.bus
        .publish(BusMessage::ToolConfirmationResponse(
            ConfirmationResponse::confirmed(request.correlation_id),
        ))
        .unwrap();

    let second = batch.next_response().await.unwrap();
    assert_eq!(second.call_id.as_str(), "ask");
    assert!(second.is_success());
    assert!(batch.next_response().await.is_none());
}

#[tokio::test]
async fn test_synchronous_channel_answer_is_used() {
    let h = harness(PolicyEngine::default(), SchedulerConfig::default());
    let bus = Arc::downgrade(&h.bus);
    h.bus.subscribe(MessageType::ToolConfirmationRequest, move |msg| {
        let (Some(bus), BusMessage::ToolConfirmationRequest(request)) = (bus.upgrade(), msg) else {
            return;
        };
        bus.publish(BusMessage::ToolConfirmationResponse(
            ConfirmationResponse::confirmed(request.correlation_id.clone()),
        ))
        .unwrap();
    });

    let responses = collect(h.scheduler.schedule(vec![echo("1", "hi")], &CancellationToken::new())).await;

    assert!(responses[0].is_success());
    assert_eq!(h.echo.executions(), 1);
    assert_eq!(h.bus.pending_confirmations(), 0);
}

#[tokio::test]
async fn test_user_rejection() {
    let h = harness(PolicyEngine::default(), SchedulerConfig::default());
    let _channel = ConfirmationChannel::attach(Arc::clone(&h.bus), Arc::new(AutoRejectConfirmation));

    let responses = collect(h.scheduler.schedule(vec![echo("1", "hi")], &CancellationToken::new())).await;

    assert_eq!(responses[0].error_kind(), Some(ToolErrorKind::UserRejected));
    assert_eq!(responses[0].status(), ResponseStatus::Rejected);
    assert_eq!(h.echo.executions(), 0);
}

#[tokio::test]
async fn test_auto_approve_channel() {
    let h = harness(PolicyEngine::default(), SchedulerConfig::default());
    let _channel =
        ConfirmationChannel::attach(Arc::clone(&h.bus), Arc::new(AutoApproveConfirmation));

    let responses = collect(h.scheduler.schedule(vec![echo("1", "hi")], &CancellationToken::new())).await;

    assert!(responses[0].is_success());
    assert_eq!(h.echo.executions(), 1);
}

#[tokio::test]
async fn test_duplicate_confirmation_response_is_ignored() {
    let h = harness(PolicyEngine::default(), SchedulerConfig::default());
    let (_, mut requests) = h.bus.subscribe_channel(MessageType::ToolConfirmationRequest);
    let batch = h.scheduler.schedule(vec![echo("1", "hi")], &CancellationToken::new());

    let request = next_request(&mut requests).await;
    for _ in 0..2 {
        h.bus
            .publish(BusMessage::ToolConfirmationResponse(
                ConfirmationResponse::confirmed(request.correlation_id.clone()),
            ))
            .unwrap();
    }
    h.bus
        .publish(BusMessage::ToolConfirmationResponse(
            ConfirmationResponse::rejected(request.correlation_id.clone()),
        ))
        .unwrap();

    let responses = collect(batch).await;
    assert_eq!(responses.len(), 1);
    assert!(responses[0].is_success());
    assert_eq!(h.echo.executions(), 1);
}

#[tokio::test]
async fn test_approved_args_override_is_used() {
    let h = harness(PolicyEngine::default(), SchedulerConfig::default());
    let _channel = ConfirmationChannel::attach(
        Arc::clone(&h.bus),
        Arc::new(OverrideConfirmation(json!({ "text": "edited" }))),
    );

    let responses = collect(h.scheduler.schedule(vec![echo("1", "original")], &CancellationToken::new())).await;

    assert_eq!(responses[0].text(), "edited");
    assert_eq!(
        *h.echo.last_args.lock().unwrap(),
        Some(json!({ "text": "edited" }))
    );
}

#[tokio::test]
async fn test_invalid_args_override_is_rejected() {
    let h = harness(PolicyEngine::default(), SchedulerConfig::default());
    let _channel = ConfirmationChannel::attach(
        Arc::clone(&h.bus),
        Arc::new(OverrideConfirmation(json!({ "bogus": 1 }))),
    );

    let responses = collect(h.scheduler.schedule(vec![echo("1", "original")], &CancellationToken::new())).await;

    assert_eq!(responses[0].error_kind(), Some(ToolErrorKind::InvalidArguments));
    assert_eq!(h.echo.executions(), 0);
}

// ==================== Cancellation ====================

#[tokio::test]
async fn test_cancel_call_while_awaiting_confirmation() {
    let h = harness(PolicyEngine::default(), SchedulerConfig::default());
    let (_, mut requests) = h.bus.subscribe_channel(MessageType::ToolConfirmationRequest);
    let (_, mut withdrawn) = h.bus.subscribe_channel(MessageType::ToolConfirmationCancelled);
    let batch = h.scheduler.schedule(vec![echo("1", "hi")], &CancellationToken::new());

    let request = next_request(&mut requests).await;
    let call_id = CallId::new("1");
    assert!(h.scheduler.cancel_call(&call_id));
    assert!(!h.scheduler.cancel_call(&call_id));

    let responses = collect(batch).await;
    assert_eq!(responses[0].error_kind(), Some(ToolErrorKind::Aborted));
    assert_eq!(h.echo.executions(), 0);
    assert_eq!(h.bus.pending_confirmations(), 0);
    assert!(!h.scheduler.cancel_call(&call_id));
    assert!(matches!(
        withdrawn.try_recv(),
        Ok(BusMessage::ToolConfirmationCancelled(c)) if c.correlation_id == request.correlation_id
    ));
}

#[tokio::test]
async fn test_batch_cancel_aborts_awaiting_and_executing_calls() {
    let engine = PolicyEngine::default().with_rule(PolicyRule::allow("slow").unwrap());
    let h = harness(engine, SchedulerConfig::default());
    let (_, mut requests) = h.bus.subscribe_channel(MessageType::ToolConfirmationRequest);
    let caller = CancellationToken::new();

    let batch = h
        .scheduler
        .schedule(vec![slow("running", 10_000), echo("parked", "hi")], &caller);
    next_request(&mut requests).await;
    assert_eq!(
        h.scheduler.call_state(&CallId::new("running")),
        Some(ToolCallState::Executing)
    );

    batch.cancel();
    let responses = collect(batch).await;

    assert_eq!(responses.len(), 2);
    for resp in &responses {
        assert_eq!(resp.error_kind(), Some(ToolErrorKind::Aborted));
    }
    assert_eq!(h.slow.completions.load(Ordering::SeqCst), 0);
    assert_eq!(h.echo.executions(), 0);
    assert!(!caller.is_cancelled());
    assert_eq!(h.scheduler.in_flight(), 0);
}

#[tokio::test]
async fn test_dropping_batch_cancels_its_calls() {
    let h = allow_all();
    let batch = h.scheduler.schedule(vec![slow("running", 10_000)], &CancellationToken::new());

    tokio::time::timeout(Duration::from_secs(5), async {
        while h.scheduler.call_state(&CallId::new("running")) != Some(ToolCallState::Executing) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("call never started executing");

    drop(batch);
    tokio::time::timeout(Duration::from_secs(5), async {
        while h.scheduler.in_flight() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("dropped batch left calls running");

    assert_eq!(h.slow.completions.load(Ordering::SeqCst), 0);
    assert_eq!(h.slow.running.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cancelled_token_aborts_every_call() {
    let h = allow_all();
    let token = CancellationToken::new();
    token.cancel();

    let responses = collect(h.scheduler.schedule(vec![echo("1", "a"), echo("2", "b")], &token)).await;

    assert_eq!(responses.len(), 2);
    assert!(responses
        .iter()
        .all(|r| r.error_kind() == Some(ToolErrorKind::Aborted)));
    assert_eq!(h.echo.executions(), 0);
}

#[tokio::test]
async fn test_cancel_finished_call_is_noop() {
    let h = allow_all();
    collect(h.scheduler.schedule(vec![echo("1", "hi")], &CancellationToken::new())).await;
    assert!(!h.scheduler.cancel_call(&CallId::new("1")));
    assert!(h.scheduler.call_state(&CallId::new("1")).is_none());
}

// ==================== Batches ====================

#[tokio::test]
async fn test_execution_failure_is_isolated() {
    let h = allow_all();
    let (_, mut failed) = h.bus.subscribe_channel(MessageType::ToolExecutionFailed);
    let (_, mut succeeded) = h.bus.subscribe_channel(MessageType::ToolExecutionSucceeded);

    let responses = collect(h.scheduler.schedule(
        vec![ToolCallRequest::new("bad", "fail", json!({})), echo("good", "hi")],
        &CancellationToken::new(),
    ))
    .await;

    let bad = by_id(&responses, "bad");
    assert_eq!(bad.error_kind(), Some(ToolErrorKind::ExecutionFailed));
    assert!(bad.error.as_ref().unwrap().message.contains("disk full"));
    assert!(by_id(&responses, "good").is_success());

    assert!(matches!(failed.try_recv(), Ok(BusMessage::ToolExecutionFailed(r)) if r.call_id.as_str() == "bad"));
    assert!(matches!(succeeded.try_recv(), Ok(BusMessage::ToolExecutionSucceeded(r)) if r.call_id.as_str() == "good"));
}

#[tokio::test]
async fn test_panicking_tool_fails_only_its_call() {
    let h = allow_all();
    let (_, mut failed) = h.bus.subscribe_channel(MessageType::ToolExecutionFailed);

    let responses = collect(h.scheduler.schedule(
        vec![
            ToolCallRequest::new("boom", "boom", json!({})),
            ToolCallRequest::new("boom-validate", "boom", json!({ "in_validate": true })),
            echo("e", "hi"),
        ],
        &CancellationToken::new(),
    ))
    .await;

    assert_eq!(responses.len(), 3);
    let boom = by_id(&responses, "boom");
    assert_eq!(boom.error_kind(), Some(ToolErrorKind::ExecutionFailed));
    assert!(boom.error.as_ref().unwrap().message.contains("tool exploded"));
    let early = by_id(&responses, "boom-validate");
    assert_eq!(early.error_kind(), Some(ToolErrorKind::ExecutionFailed));
    assert!(early.error.as_ref().unwrap().message.contains("validator exploded"));
    assert!(by_id(&responses, "e").is_success());

    assert_eq!(h.scheduler.in_flight(), 0);
    assert!(!h.scheduler.cancel_call(&CallId::new("boom")));
    assert!(matches!(failed.try_recv(), Ok(BusMessage::ToolExecutionFailed(r)) if r.call_id.as_str() == "boom"));
}

#[tokio::test]
async fn test_exactly_one_response_per_request() {
    let engine = PolicyEngine::default()
        .with_rule(PolicyRule::allow("echo").unwrap())
        .with_rule(PolicyRule::allow("fail").unwrap())
        .with_rule(PolicyRule::deny("echo(forbidden)").unwrap());
    let h = harness(engine, SchedulerConfig::default());
    let _channel = ConfirmationChannel::attach(Arc::clone(&h.bus), Arc::new(AutoRejectConfirmation));

    let requests = vec![
        echo("allowed", "hi"),
        echo("denied", "forbidden fruit"),
        ToolCallRequest::new("missing", "teleport", json!({})),
        ToolCallRequest::new("invalid", "echo", json!({ "text": true })),
        slow("rejected", 1),
        ToolCallRequest::new("failing", "fail", json!({})),
    ];
    let responses = collect(h.scheduler.schedule(requests, &CancellationToken::new())).await;

    assert_eq!(responses.len(), 6);
    let ids: HashSet<&str> = responses.iter().map(|r| r.call_id.as_str()).collect();
    assert_eq!(ids.len(), 6);
    assert_eq!(by_id(&responses, "denied").error_kind(), Some(ToolErrorKind::PolicyDenied));
    assert_eq!(by_id(&responses, "rejected").error_kind(), Some(ToolErrorKind::UserRejected));
    assert_eq!(by_id(&responses, "missing").error_kind(), Some(ToolErrorKind::ToolNotFound));
    assert_eq!(by_id(&responses, "invalid").error_kind(), Some(ToolErrorKind::InvalidArguments));
    assert_eq!(by_id(&responses, "failing").error_kind(), Some(ToolErrorKind::ExecutionFailed));
    assert!(by_id(&responses, "allowed").is_success());
}

#[tokio::test]
async fn test_duplicate_call_id_is_refused() {
    let h = allow_all();
    let responses = collect(h.scheduler.schedule(
        vec![echo("dup", "a"), echo("dup", "b")],
        &CancellationToken::new(),
    ))
    .await;

    assert_eq!(responses.len(), 2);
    assert_eq!(responses.iter().filter(|r| r.is_success()).count(), 1);
    assert_eq!(
        responses
            .iter()
            .filter(|r| r.error_kind() == Some(ToolErrorKind::InvalidArguments))
            .count(),
        1
    );
}

#[tokio::test]
async fn test_max_concurrent_executions() {
    let config = SchedulerConfig::default().with_max_concurrent_executions(Some(1));
    let h = harness(PolicyEngine::allow_all(), config);

    let responses = collect(h.scheduler.schedule(
        vec![slow("a", 20), slow("b", 20), slow("c", 20)],
        &CancellationToken::new(),
    ))
    .await;

    assert!(responses.iter().all(|r| r.is_success()));
    assert_eq!(h.slow.max_running.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_allowed_calls_run_concurrently() {
    let h = allow_all();

    collect(h.scheduler.schedule(
        vec![slow("a", 30), slow("b", 30), slow("c", 30)],
        &CancellationToken::new(),
    ))
    .await;

    assert_eq!(h.slow.max_running.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_batch_is_a_stream() {
    let h = allow_all();
    let mut batch = h
        .scheduler
        .schedule(vec![echo("1", "a"), echo("2", "b")], &CancellationToken::new());
    assert_eq!(batch.len(), 2);

    let mut count = 0;
    while let Some(resp) = batch.next().await {
        assert!(resp.is_success());
        count += 1;
    }
    assert_eq!(count, 2);
    assert_eq!(batch.remaining(), 0);
}

#[tokio::test]
async fn test_empty_batch_finishes_immediately() {
    let h = allow_all();
    let batch = h.scheduler.schedule(Vec::new(), &CancellationToken::new());
    assert!(batch.is_empty());
    assert!(collect(batch).await.is_empty());
}
