//! Message bus and its adapters.
//!
//! - [`MessageBus`] — typed pub/sub with policy interception and
//!   confirmation correlation
//! - [`ConfirmationTicket`] — the waiting side of one confirmation
//! - [`ConfirmationChannel`] — answers forwarded requests with a
//!   [`ConfirmationHandler`](crate::ports::confirmation::ConfirmationHandler)
//! - [`AuditTrail`] — mirrors all bus traffic to an
//!   [`AuditLogger`](crate::ports::audit_logger::AuditLogger)

pub mod audit;
pub mod confirmation_channel;
pub mod message_bus;
pub mod ticket;

pub use audit::AuditTrail;
pub use confirmation_channel::ConfirmationChannel;
pub use message_bus::{BusError, MessageBus, SubscriptionId};
pub use ticket::ConfirmationTicket;
