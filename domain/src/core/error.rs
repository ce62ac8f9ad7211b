//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid policy rule '{pattern}': {reason}")]
    InvalidRule { pattern: String, reason: String },

    #[error("Unknown policy decision: {0}")]
    UnknownDecision(String),
}

impl DomainError {
    pub(crate) fn invalid_rule(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        DomainError::InvalidRule {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }
}
