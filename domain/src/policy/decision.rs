//! Policy decision verdict.

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Governance verdict for a tool call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyDecision {
    /// Run without asking anyone
    Allow,
    /// Refuse without asking anyone
    Deny,
    /// Forward to the confirmation channel
    #[default]
    #[serde(alias = "ask-user", alias = "ask")]
    AskUser,
}

impl PolicyDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyDecision::Allow => "allow",
            PolicyDecision::Deny => "deny",
            PolicyDecision::AskUser => "ask_user",
        }
    }
}

impl std::fmt::Display for PolicyDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyDecision {
    type Err = DomainError;

    /// Unknown values are an error, never a silent fallback.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" => Ok(PolicyDecision::Allow),
            "deny" => Ok(PolicyDecision::Deny),
            "ask_user" | "ask-user" | "ask" => Ok(PolicyDecision::AskUser),
            _ => Err(DomainError::UnknownDecision(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_ask_user() {
        assert_eq!(PolicyDecision::default(), PolicyDecision::AskUser);
    }

    #[test]
    fn test_from_str() {
        assert_eq!("allow".parse::<PolicyDecision>().unwrap(), PolicyDecision::Allow);
        assert_eq!("DENY".parse::<PolicyDecision>().unwrap(), PolicyDecision::Deny);
        assert_eq!("ask-user".parse::<PolicyDecision>().unwrap(), PolicyDecision::AskUser);
    }

    #[test]
    fn test_unknown_decision_is_rejected() {
        let err = "yolo".parse::<PolicyDecision>().unwrap_err();
        assert_eq!(err, DomainError::UnknownDecision("yolo".to_string()));
    }

    #[test]
    fn test_unknown_decision_fails_deserialization() {
        let result: Result<PolicyDecision, _> = serde_json::from_str("\"sometimes\"");
        assert!(result.is_err());
        let ok: PolicyDecision = serde_json::from_str("\"ask_user\"").unwrap();
        assert_eq!(ok, PolicyDecision::AskUser);
    }
}
