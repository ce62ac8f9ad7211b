//! Confirmation handlers that talk to a human

pub mod interactive;
