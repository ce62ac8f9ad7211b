//! Policy configuration from TOML (`[policy]` section)
//!
//! Example configuration:
//!
//! ```toml
//! [policy]
//! default_decision = "ask_user"
//! non_interactive = false
//! allowed_tools = ["read_file"]
//! excluded_tools = ["shell_exec(rm -rf)"]
//!
//! [[policy.rules]]
//! tool = "shell_exec(git status)"
//! decision = "allow"
//! ```
//!
//! Rule patterns stay strings here so that [`FileConfig::validate`] can
//! report every malformed one at once. An unknown decision string is
//! rejected during deserialization.
//!
//! [`FileConfig::validate`]: super::FileConfig::validate

use serde::{Deserialize, Serialize};
use toolgate_domain::{PolicyDecision, PolicyEngine, PolicyRule};

use super::ConfigValidationError;

/// One `[[policy.rules]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePolicyRule {
    /// `tool` or `tool(argument prefix)`
    pub tool: String,
    pub decision: PolicyDecision,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilePolicyConfig {
    /// Decision when no rule matches
    pub default_decision: PolicyDecision,
    /// Convert `ask_user` into `deny` (nobody is there to answer)
    pub non_interactive: bool,
    /// Shorthand for `allow` rules
    pub allowed_tools: Vec<String>,
    /// Shorthand for `deny` rules
    pub excluded_tools: Vec<String>,
    pub rules: Vec<FilePolicyRule>,
}

impl FilePolicyConfig {
    /// Every configured pattern with its decision and config field, in
    /// evaluation order: exclusions, explicit rules, then allowances.
    fn entries(&self) -> Vec<(String, &str, PolicyDecision)> {
        let excluded = self
            .excluded_tools
            .iter()
            .enumerate()
            .map(|(i, p)| (format!("policy.excluded_tools[{i}]"), p.as_str(), PolicyDecision::Deny));
        let rules = self
            .rules
            .iter()
            .enumerate()
            .map(|(i, r)| (format!("policy.rules[{i}].tool"), r.tool.as_str(), r.decision));
        let allowed = self
            .allowed_tools
            .iter()
            .enumerate()
            .map(|(i, p)| (format!("policy.allowed_tools[{i}]"), p.as_str(), PolicyDecision::Allow));
        excluded.chain(rules).chain(allowed).collect()
    }

    pub(super) fn validate(&self) -> Vec<ConfigValidationError> {
        self.entries()
            .into_iter()
            .filter_map(|(field, pattern, decision)| parse_rule(field, pattern, decision).err())
            .collect()
    }

    /// Build the policy engine. Fails on the first malformed pattern.
    pub fn to_policy_engine(&self) -> Result<PolicyEngine, ConfigValidationError> {
        let rules = self
            .entries()
            .into_iter()
            .map(|(field, pattern, decision)| parse_rule(field, pattern, decision))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PolicyEngine::new(rules, self.default_decision)
            .with_non_interactive(self.non_interactive))
    }
}

fn parse_rule(
    field: String,
    pattern: &str,
    decision: PolicyDecision,
) -> Result<PolicyRule, ConfigValidationError> {
    if pattern.trim().is_empty() {
        return Err(ConfigValidationError::EmptyToolName { field });
    }
    PolicyRule::parse(pattern, decision)
        .map_err(|source| ConfigValidationError::InvalidRule { field, source })
}
