//! Application layer for toolgate
//!
//! This crate contains the message bus, the tool call scheduler, the tool
//! registry and the port definitions adapters implement. It depends only on
//! the domain layer.

pub mod bus;
pub mod config;
pub mod ports;
pub mod registry;
pub mod use_cases;

// Re-export commonly used types
pub use bus::{AuditTrail, BusError, ConfirmationChannel, ConfirmationTicket, MessageBus, SubscriptionId};
pub use config::SchedulerConfig;
pub use ports::{
    audit_logger::{AuditEvent, AuditLogger, NoAuditLogger},
    confirmation::{
        AutoApproveConfirmation, AutoRejectConfirmation, ConfirmationError, ConfirmationHandler,
        ConfirmationOutcome,
    },
    tool::{Tool, ToolExecutionError},
};
pub use registry::{RegistryError, ResolvedTool, ToolRegistry};
pub use use_cases::schedule_tool_calls::{ToolCallBatch, ToolCallScheduler};
