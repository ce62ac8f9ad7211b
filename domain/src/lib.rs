//! Domain layer for toolgate
//!
//! This crate contains the core types and pure logic of the tool invocation
//! pipeline. It has no dependencies on an async runtime, I/O or
//! presentation concerns.
//!
//! # Core Concepts
//!
//! - **Tool call**: a model's request to invoke a named tool with arguments
//!   ([`ToolCallRequest`]), answered by exactly one [`ToolCallResponse`]
//! - **Lifecycle**: the forward-only state machine every call moves through
//!   ([`ToolCallState`])
//! - **Policy**: rule-based `Allow` / `Deny` / `AskUser` verdicts
//!   ([`PolicyEngine`])
//! - **Bus messages**: confirmation requests and responses paired by
//!   [`CorrelationId`], plus observability events ([`BusMessage`])

pub mod bus;
pub mod call;
pub mod core;
pub mod policy;
pub mod tool;

// Re-export commonly used types
pub use bus::{
    BusErrorEvent, BusMessage, ConfirmationCancellation, ConfirmationRequest, ConfirmationResponse,
    ConfirmationSource, CorrelationId, ExecutionReport, MessageType, PolicyRejection,
};
pub use call::{
    CallId, ContentPart, InvalidTransition, ResponseStatus, ToolCallError, ToolCallRecord,
    ToolCallRequest, ToolCallResponse, ToolCallState, ToolErrorKind, ToolOutput,
};
pub use core::{error::DomainError, string::{single_line, truncate}};
pub use policy::{
    PolicyDecision, PolicyEngine, PolicyEvaluation, PolicyRule, ToolCallDescription, ToolPattern,
};
pub use tool::{DefaultToolValidator, ToolDefinition, ToolKind, ToolParameter, ToolSpec, ToolValidator};
