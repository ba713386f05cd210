//! Security policy enforcement over a proposed config write.

use crate::paths::{dotted_to_glob_path, flatten_leaves, locked_path_patterns};
use scope_config_core::SecurityPolicy;
use scope_config_error::ScopeConfigError;
use scope_config_glob::IncludeExcludeGlobs;
use serde_json::Value;

/// Dotted-path wildcard gated by `require_approval_for_prompts`.
const PROMPT_APPROVAL_PATTERN: &str = "agents/*/prompt/*";
/// Dotted-path wildcard gated by `require_approval_for_tools`.
const TOOLS_APPROVAL_PATTERN: &str = "agents/*/tools/*";

/// Outcome of evaluating a proposed write against a [`SecurityPolicy`].
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyOutcome {
    /// No approval gate triggered; the caller may apply the diff as-is.
    Apply,
    /// One or more paths matched an approval-gated pattern; the caller
    /// should queue the diff as a pending proposal instead of applying it.
    Pending {
        /// The dotted paths that triggered the gate.
        paths: Vec<String>,
    },
}

/// Compiled matchers for one org's [`SecurityPolicy`], reused across every
/// write evaluated against that org.
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    locked: IncludeExcludeGlobs,
    approval_gate: Option<IncludeExcludeGlobs>,
    max_values: std::collections::BTreeMap<String, f64>,
}

impl PolicyEngine {
    /// Compile `policy`'s `locked_paths`, `max_values`, and approval-gate
    /// flags into a reusable matcher.
    ///
    /// # Errors
    ///
    /// [`ScopeConfigError::InvalidInput`] if a locked path cannot be
    /// compiled into a glob (should not happen for operator-entered dotted
    /// paths, but a stray glob metacharacter is possible).
    pub fn new(policy: &SecurityPolicy) -> Result<Self, ScopeConfigError> {
        let no_include: Vec<String> = Vec::new();
        let exclude: Vec<String> = policy
            .locked_paths
            .iter()
            .flat_map(|p| locked_path_patterns(p))
            .collect();
        let locked = IncludeExcludeGlobs::new(&no_include, &exclude)
            .map_err(|e| ScopeConfigError::invalid_input(format!("invalid locked_paths entry: {e}")))?;

        let mut approval_patterns = Vec::new();
        if policy.require_approval_for_prompts {
            approval_patterns.push(PROMPT_APPROVAL_PATTERN.to_string());
        }
        if policy.require_approval_for_tools {
            approval_patterns.push(TOOLS_APPROVAL_PATTERN.to_string());
        }
        let approval_gate = if approval_patterns.is_empty() {
            None
        } else {
            Some(
                IncludeExcludeGlobs::new(&approval_patterns, &no_include)
                    .map_err(|e| ScopeConfigError::invalid_input(format!("invalid approval pattern: {e}")))?,
            )
        };

        Ok(Self {
            locked,
            approval_gate,
            max_values: policy.max_values.clone(),
        })
    }

    /// Evaluate a proposed diff (the JSON object that would be merged into
    /// a node's local config).
    ///
    /// # Errors
    ///
    /// [`ScopeConfigError::PolicyViolation`] naming the first offending path
    /// if any leaf is locked or exceeds its `max_values` ceiling.
    pub fn evaluate(&self, diff: &Value) -> Result<PolicyOutcome, ScopeConfigError> {
        let leaves = flatten_leaves(diff);
        let mut pending_paths = Vec::new();

        for (path, value) in &leaves {
            let glob_path = dotted_to_glob_path(path);
            if !self.locked.decide_str(&glob_path).is_allowed() {
                return Err(ScopeConfigError::PolicyViolation {
                    path: path.clone(),
                    reason: "path is locked".to_string(),
                });
            }

            if let Some(limit) = self.max_values.get(path) {
                if let Some(n) = value.as_f64() {
                    if n > *limit {
                        return Err(ScopeConfigError::PolicyViolation {
                            path: path.clone(),
                            reason: format!("value {n} exceeds max {limit}"),
                        });
                    }
                }
            }

            if let Some(gate) = &self.approval_gate {
                if gate.decide_str(&glob_path).is_allowed() {
                    pending_paths.push(path.clone());
                }
            }
        }

        if pending_paths.is_empty() {
            Ok(PolicyOutcome::Apply)
        } else {
            Ok(PolicyOutcome::Pending { paths: pending_paths })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn policy_with(locked: &[&str], max: &[(&str, f64)], approve_prompts: bool, approve_tools: bool) -> SecurityPolicy {
        let mut p = SecurityPolicy::default_for("acme");
        p.locked_paths = locked.iter().map(|s| s.to_string()).collect();
        p.max_values = max.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        p.require_approval_for_prompts = approve_prompts;
        p.require_approval_for_tools = approve_tools;
        p
    }

    #[test]
    fn permissive_policy_allows_everything() {
        let engine = PolicyEngine::new(&SecurityPolicy::default_for("acme")).unwrap();
        let outcome = engine.evaluate(&json!({"model": {"name": "gpt"}})).unwrap();
        assert_eq!(outcome, PolicyOutcome::Apply);
    }

    #[test]
    fn locked_path_rejects_exact_match() {
        let policy = policy_with(&["model.name"], &[], false, false);
        let engine = PolicyEngine::new(&policy).unwrap();
        let err = engine.evaluate(&json!({"model": {"name": "gpt"}})).unwrap_err();
        match err {
            ScopeConfigError::PolicyViolation { path, .. } => assert_eq!(path, "model.name"),
            other => panic!("expected PolicyViolation, got {other:?}"),
        }
    }

    #[test]
    fn locked_path_rejects_nested_descendant() {
        let policy = policy_with(&["agents.sre"], &[], false, false);
        let engine = PolicyEngine::new(&policy).unwrap();
        let err = engine
            .evaluate(&json!({"agents": {"sre": {"model": {"temperature": 0.5}}}}))
            .unwrap_err();
        assert!(matches!(err, ScopeConfigError::PolicyViolation { .. }));
    }

    #[test]
    fn locked_path_does_not_affect_siblings() {
        let policy = policy_with(&["agents.sre"], &[], false, false);
        let engine = PolicyEngine::new(&policy).unwrap();
        let outcome = engine.evaluate(&json!({"agents": {"billing": {"enabled": true}}})).unwrap();
        assert_eq!(outcome, PolicyOutcome::Apply);
    }

    #[test]
    fn max_values_rejects_values_over_the_ceiling() {
        let policy = policy_with(&[], &[("model.max_tokens", 4096.0)], false, false);
        let engine = PolicyEngine::new(&policy).unwrap();
        let err = engine
            .evaluate(&json!({"model": {"max_tokens": 8192}}))
            .unwrap_err();
        assert!(matches!(err, ScopeConfigError::PolicyViolation { .. }));
    }

    #[test]
    fn max_values_allows_values_at_or_under_the_ceiling() {
        let policy = policy_with(&[], &[("model.max_tokens", 4096.0)], false, false);
        let engine = PolicyEngine::new(&policy).unwrap();
        let outcome = engine.evaluate(&json!({"model": {"max_tokens": 4096}})).unwrap();
        assert_eq!(outcome, PolicyOutcome::Apply);
    }

    #[test]
    fn prompt_write_is_queued_as_pending_when_gated() {
        let policy = policy_with(&[], &[], true, false);
        let engine = PolicyEngine::new(&policy).unwrap();
        let outcome = engine
            .evaluate(&json!({"agents": {"sre": {"prompt": {"system": "be nice"}}}}))
            .unwrap();
        match outcome {
            PolicyOutcome::Pending { paths } => assert_eq!(paths, vec!["agents.sre.prompt.system"]),
            other => panic!("expected Pending, got {other:?}"),
        }
    }

    #[test]
    fn tools_write_is_queued_as_pending_when_gated() {
        let policy = policy_with(&[], &[], false, true);
        let engine = PolicyEngine::new(&policy).unwrap();
        let outcome = engine
            .evaluate(&json!({"agents": {"sre": {"tools": {"bash": true}}}}))
            .unwrap();
        assert!(matches!(outcome, PolicyOutcome::Pending { .. }));
    }

    #[test]
    fn prompt_write_applies_directly_when_not_gated() {
        let policy = policy_with(&[], &[], false, false);
        let engine = PolicyEngine::new(&policy).unwrap();
        let outcome = engine
            .evaluate(&json!({"agents": {"sre": {"prompt": {"system": "be nice"}}}}))
            .unwrap();
        assert_eq!(outcome, PolicyOutcome::Apply);
    }

    #[test]
    fn locked_path_check_takes_precedence_over_approval_gate() {
        let mut policy = policy_with(&["agents.sre.prompt"], &[], true, false);
        policy.require_approval_for_prompts = true;
        let engine = PolicyEngine::new(&policy).unwrap();
        let err = engine
            .evaluate(&json!({"agents": {"sre": {"prompt": {"system": "x"}}}}))
            .unwrap_err();
        assert!(matches!(err, ScopeConfigError::PolicyViolation { .. }));
    }
}
