//! Bus domain module — message types for the tool-governance bus.
//!
//! The bus itself lives in the application layer; this module only defines
//! what travels on it.

pub mod message;

pub use message::{
    BusErrorEvent, BusMessage, ConfirmationCancellation, ConfirmationRequest, ConfirmationResponse, ConfirmationSource,
    CorrelationId, ExecutionReport, MessageType, PolicyRejection,
};
