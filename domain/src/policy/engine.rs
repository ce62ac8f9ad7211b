//! Policy engine — the pure decision function.
//!
//! [`PolicyEngine::decide`] maps a [`ToolCallDescription`] to a
//! [`PolicyDecision`] using an ordered rule table:
//!
//! 1. The first matching argument-qualified rule (`shell_exec(git status)`)
//! 2. Otherwise the first matching bare tool-name rule (`shell_exec`)
//! 3. Otherwise the configured default decision
//!
//! Every name the tool is known by (canonical name and aliases) is checked
//! against every rule. In non-interactive mode `AskUser` becomes `Deny`,
//! since nobody is there to answer.
//!
//! The engine holds configuration only. It performs no I/O and keeps no
//! per-call state, so the same input always yields the same decision.

use super::decision::PolicyDecision;
use super::description::ToolCallDescription;
use super::rule::PolicyRule;

/// Result of evaluating one call, with the rule that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyEvaluation<'a> {
    pub decision: PolicyDecision,
    /// `None` when the default decision applied
    pub matched_rule: Option<&'a PolicyRule>,
}

/// Rule-based policy engine.
#[derive(Debug, Clone, Default)]
pub struct PolicyEngine {
    rules: Vec<PolicyRule>,
    default_decision: PolicyDecision,
    non_interactive: bool,
}

impl PolicyEngine {
    pub fn new(rules: Vec<PolicyRule>, default_decision: PolicyDecision) -> Self {
        Self {
            rules,
            default_decision,
            non_interactive: false,
        }
    }

    /// Engine that allows everything (no rules, default `Allow`).
    pub fn allow_all() -> Self {
        Self::new(Vec::new(), PolicyDecision::Allow)
    }

    /// Engine that denies everything (no rules, default `Deny`).
    pub fn deny_all() -> Self {
        Self::new(Vec::new(), PolicyDecision::Deny)
    }

    // ==================== Builder Methods ====================

    pub fn with_rule(mut self, rule: PolicyRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_default_decision(mut self, decision: PolicyDecision) -> Self {
        self.default_decision = decision;
        self
    }

    pub fn with_non_interactive(mut self, non_interactive: bool) -> Self {
        self.non_interactive = non_interactive;
        self
    }

    // ==================== Accessors ====================

    pub fn rules(&self) -> &[PolicyRule] {
        &self.rules
    }

    pub fn default_decision(&self) -> PolicyDecision {
        self.default_decision
    }

    pub fn is_non_interactive(&self) -> bool {
        self.non_interactive
    }

    // ==================== Evaluation ====================

    /// Decide what to do with a tool call.
    pub fn decide(&self, call: &ToolCallDescription) -> PolicyDecision {
        self.evaluate(call).decision
    }

    /// Decide, and report which rule matched.
    pub fn evaluate(&self, call: &ToolCallDescription) -> PolicyEvaluation<'_> {
        let matched_rule = self
            .rules
            .iter()
            .find(|r| r.is_arg_qualified() && r.matches(call))
            .or_else(|| {
                self.rules
                    .iter()
                    .find(|r| !r.is_arg_qualified() && r.matches(call))
            });

        let decision = matched_rule
            .map(|r| r.decision)
            .unwrap_or(self.default_decision);

        PolicyEvaluation {
            decision: self.apply_mode(decision),
            matched_rule,
        }
    }

    /// [`evaluate`](Self::evaluate) as a tuple.
    pub fn decide_with_rule(
        &self,
        call: &ToolCallDescription,
    ) -> (PolicyDecision, Option<&PolicyRule>) {
        let eval = self.evaluate(call);
        (eval.decision, eval.matched_rule)
    }

    fn apply_mode(&self, decision: PolicyDecision) -> PolicyDecision {
        match decision {
            PolicyDecision::AskUser if self.non_interactive => PolicyDecision::Deny,
            PolicyDecision::Allow | PolicyDecision::Deny | PolicyDecision::AskUser => decision,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn shell(command: &str) -> ToolCallDescription {
        ToolCallDescription::new("shell_exec", json!({ "command": command }))
    }

    fn git_status_engine() -> PolicyEngine {
        PolicyEngine::default()
            .with_rule(PolicyRule::ask_user("shell_exec").unwrap())
            .with_rule(PolicyRule::allow("shell_exec(git status)").unwrap())
    }

    #[test]
    fn test_default_decision_without_rules() {
        let engine = PolicyEngine::default();
        assert_eq!(engine.decide(&shell("ls")), PolicyDecision::AskUser);
        assert_eq!(PolicyEngine::allow_all().decide(&shell("ls")), PolicyDecision::Allow);
        assert_eq!(PolicyEngine::deny_all().decide(&shell("ls")), PolicyDecision::Deny);
    }

    #[test]
    fn test_arg_qualified_rule_wins_regardless_of_order() {
        let engine = git_status_engine();
        assert_eq!(engine.decide(&shell("git status --short")), PolicyDecision::Allow);
        assert_eq!(engine.decide(&shell("git push")), PolicyDecision::AskUser);

        let reversed = PolicyEngine::default()
            .with_rule(PolicyRule::allow("shell_exec(git status)").unwrap())
            .with_rule(PolicyRule::ask_user("shell_exec").unwrap());
        assert_eq!(reversed.decide(&shell("git status")), PolicyDecision::Allow);
        assert_eq!(reversed.decide(&shell("git push")), PolicyDecision::AskUser);
    }

    #[test]
    fn test_token_boundary_is_respected() {
        let engine = git_status_engine();
        assert_eq!(engine.decide(&shell("git statusx")), PolicyDecision::AskUser);
    }

    #[test]
    fn test_bare_deny_rule() {
        let engine = PolicyEngine::allow_all().with_rule(PolicyRule::deny("shell_exec").unwrap());
        let eval = engine.evaluate(&shell("rm -rf /"));
        assert_eq!(eval.decision, PolicyDecision::Deny);
        assert_eq!(eval.matched_rule.unwrap().pattern.to_string(), "shell_exec");
    }

    #[test]
    fn test_first_matching_rule_of_equal_specificity_wins() {
        let engine = PolicyEngine::default()
            .with_rule(PolicyRule::deny("shell_exec(git)").unwrap())
            .with_rule(PolicyRule::allow("shell_exec(git status)").unwrap());
        assert_eq!(engine.decide(&shell("git status")), PolicyDecision::Deny);
    }

    #[test]
    fn test_aliases_are_checked_against_rules() {
        let engine = PolicyEngine::default()
            .with_rule(PolicyRule::allow("ShellTool(ls)").unwrap())
            .with_rule(PolicyRule::deny("run_shell_command").unwrap());

        let call = shell("ls -la").with_aliases(["ShellTool", "run_shell_command"]);
        assert_eq!(engine.decide(&call), PolicyDecision::Allow);

        let call = shell("cat x").with_aliases(["ShellTool", "run_shell_command"]);
        assert_eq!(engine.decide(&call), PolicyDecision::Deny);
    }

    #[test]
    fn test_decide_with_rule_reports_match() {
        let engine = git_status_engine();
        let (decision, rule) = engine.decide_with_rule(&shell("git status"));
        assert_eq!(decision, PolicyDecision::Allow);
        assert_eq!(rule.unwrap().to_string(), "shell_exec(git status) => allow");
    }

    #[test]
    fn test_unmatched_tool_uses_default() {
        let engine = git_status_engine().with_default_decision(PolicyDecision::Deny);
        let read = ToolCallDescription::new("read_file", json!({"path": "a"}));
        let eval = engine.evaluate(&read);
        assert_eq!(eval.decision, PolicyDecision::Deny);
        assert!(eval.matched_rule.is_none());
    }

    #[test]
    fn test_non_interactive_turns_ask_into_deny() {
        let engine = git_status_engine().with_non_interactive(true);
        assert_eq!(engine.decide(&shell("git push")), PolicyDecision::Deny);
        assert_eq!(engine.decide(&shell("git status")), PolicyDecision::Allow);
    }

    #[test]
    fn test_decide_is_deterministic() {
        let engine = git_status_engine();
        let call = shell("git status");
        let first = engine.decide(&call);
        for _ in 0..10 {
            assert_eq!(engine.decide(&call), first);
        }
    }
}
