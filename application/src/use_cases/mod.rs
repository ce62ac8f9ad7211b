//! Use cases
//!
//! Application-level operations that orchestrate domain logic.

pub mod schedule_tool_calls;
