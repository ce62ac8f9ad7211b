//! Policy domain module — governance rules for tool calls.
//!
//! - [`PolicyDecision`] — `Allow`, `Deny` or `AskUser`
//! - [`PolicyRule`] / [`ToolPattern`] — `tool` or `tool(arg prefix)` plus a decision
//! - [`PolicyEngine`] — pure, deterministic rule evaluation
//! - [`ToolCallDescription`] — what the engine sees of a call

pub mod decision;
pub mod description;
pub mod engine;
pub mod rule;

pub use decision::PolicyDecision;
pub use description::ToolCallDescription;
pub use engine::{PolicyEngine, PolicyEvaluation};
pub use rule::{PolicyRule, ToolPattern};
