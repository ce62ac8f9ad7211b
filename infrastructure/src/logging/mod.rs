//! Logging infrastructure — structured audit logging.
//!
//! Provides [`JsonlAuditLogger`], a JSONL file writer that implements the
//! [`AuditLogger`](toolgate_application::AuditLogger) port.

mod jsonl_audit_logger;

pub use jsonl_audit_logger::JsonlAuditLogger;
