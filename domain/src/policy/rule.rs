//! Policy rules: a tool pattern plus a decision.
//!
//! A pattern is a tool name, optionally followed by a parenthesized argument
//! prefix:
//!
//! | Pattern | Matches |
//! |---------|---------|
//! | `shell_exec` | any invocation of `shell_exec` |
//! | `shell_exec(git status)` | primary argument `git status` or `git status …` |
//!
//! Prefixes match whole tokens: `shell_exec(git status)` does not match
//! `git statusx`.

use super::decision::PolicyDecision;
use super::description::ToolCallDescription;
use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Tool name with an optional argument prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ToolPattern {
    tool: String,
    arg_prefix: Option<String>,
}

impl ToolPattern {
    pub fn tool(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            arg_prefix: None,
        }
    }

    pub fn with_arg_prefix(tool: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            arg_prefix: Some(prefix.into()),
        }
    }

    pub fn tool_name(&self) -> &str {
        &self.tool
    }

    pub fn arg_prefix(&self) -> Option<&str> {
        self.arg_prefix.as_deref()
    }

    /// Argument-qualified patterns are more specific than bare tool names.
    pub fn is_arg_qualified(&self) -> bool {
        self.arg_prefix.is_some()
    }

    pub fn matches(&self, call: &ToolCallDescription) -> bool {
        if !call.names().any(|name| name == self.tool) {
            return false;
        }
        match &self.arg_prefix {
            None => true,
            Some(prefix) => call
                .primary_argument()
                .is_some_and(|arg| prefix_matches(prefix, arg.trim_start())),
        }
    }
}

/// Whole-token prefix match: equal, or followed by a space.
fn prefix_matches(prefix: &str, arg: &str) -> bool {
    match arg.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with(' '),
        None => false,
    }
}

impl FromStr for ToolPattern {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (tool, arg_prefix) = match s.find('(') {
            None => {
                if s.contains(')') {
                    return Err(DomainError::invalid_rule(s, "unbalanced parentheses"));
                }
                (s, None)
            }
            Some(open) => {
                let Some(inner) = s[open + 1..].strip_suffix(')') else {
                    return Err(DomainError::invalid_rule(s, "unbalanced parentheses"));
                };
                let inner = inner.trim();
                if inner.is_empty() {
                    return Err(DomainError::invalid_rule(s, "empty argument prefix"));
                }
                (s[..open].trim(), Some(inner.to_string()))
            }
        };

        if tool.is_empty() {
            return Err(DomainError::invalid_rule(s, "missing tool name"));
        }
        if tool.contains(char::is_whitespace) {
            return Err(DomainError::invalid_rule(s, "tool name contains whitespace"));
        }

        Ok(Self {
            tool: tool.to_string(),
            arg_prefix,
        })
    }
}

impl TryFrom<String> for ToolPattern {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ToolPattern> for String {
    fn from(pattern: ToolPattern) -> Self {
        pattern.to_string()
    }
}

impl std::fmt::Display for ToolPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.arg_prefix {
            Some(prefix) => write!(f, "{}({})", self.tool, prefix),
            None => write!(f, "{}", self.tool),
        }
    }
}

/// A pattern and the decision it yields when it matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRule {
    #[serde(rename = "tool")]
    pub pattern: ToolPattern,
    pub decision: PolicyDecision,
}

impl PolicyRule {
    pub fn new(pattern: ToolPattern, decision: PolicyDecision) -> Self {
        Self { pattern, decision }
    }

    /// Parse a pattern string into a rule.
    pub fn parse(pattern: &str, decision: PolicyDecision) -> Result<Self, DomainError> {
        Ok(Self::new(pattern.parse()?, decision))
    }

    pub fn allow(pattern: &str) -> Result<Self, DomainError> {
        Self::parse(pattern, PolicyDecision::Allow)
    }

    pub fn deny(pattern: &str) -> Result<Self, DomainError> {
        Self::parse(pattern, PolicyDecision::Deny)
    }

    pub fn ask_user(pattern: &str) -> Result<Self, DomainError> {
        Self::parse(pattern, PolicyDecision::AskUser)
    }

    pub fn matches(&self, call: &ToolCallDescription) -> bool {
        self.pattern.matches(call)
    }

    pub fn is_arg_qualified(&self) -> bool {
        self.pattern.is_arg_qualified()
    }
}

impl std::fmt::Display for PolicyRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} => {}", self.pattern, self.decision)
    }
}
