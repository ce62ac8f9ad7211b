//! Tool-call domain module: requests, responses and the per-call lifecycle.

pub mod lifecycle;
pub mod request;
pub mod response;

pub use lifecycle::{InvalidTransition, ToolCallRecord, ToolCallState};
pub use request::{CallId, ToolCallRequest};
pub use response::{
    ContentPart, ResponseStatus, ToolCallError, ToolCallResponse, ToolErrorKind, ToolOutput,
};
