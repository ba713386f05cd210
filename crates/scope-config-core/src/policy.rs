//! Org-wide [`SecurityPolicy`]: token lifecycle defaults and config write
//! guardrails enforced by `scope-config-policy`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Exactly zero or one row per org. Governs token lifecycle defaults and
/// config-write guardrails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SecurityPolicy {
    /// Tenant this policy applies to.
    pub org_id: String,
    /// Tokens expire `token_expiry_days` after issuance, if set.
    pub token_expiry_days: Option<u32>,
    /// Warn actors this many days before an expiry sweep would revoke a token.
    pub token_warn_before_days: Option<u32>,
    /// Revoke tokens inactive for this many days, if set.
    pub token_revoke_inactive_days: Option<u32>,
    /// Dotted config paths that may never be written (prefix match).
    pub locked_paths: Vec<String>,
    /// Per-path numeric ceilings for config writes.
    pub max_values: BTreeMap<String, f64>,
    /// Queue `agents.*.prompt.*` writes as pending proposals rather than applying them.
    pub require_approval_for_prompts: bool,
    /// Queue `agents.*.tools.*` writes as pending proposals rather than applying them.
    pub require_approval_for_tools: bool,
    /// Whether every config write should also be audited verbosely (diff included).
    pub log_all_changes: bool,
}

impl SecurityPolicy {
    /// The permissive default: no locks, no clamps, no approval gates.
    #[must_use]
    pub fn default_for(org_id: impl Into<String>) -> Self {
        Self {
            org_id: org_id.into(),
            token_expiry_days: None,
            token_warn_before_days: None,
            token_revoke_inactive_days: None,
            locked_paths: Vec::new(),
            max_values: BTreeMap::new(),
            require_approval_for_prompts: false,
            require_approval_for_tools: false,
            log_all_changes: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_for_is_fully_permissive() {
        let p = SecurityPolicy::default_for("acme");
        assert!(p.locked_paths.is_empty());
        assert!(p.max_values.is_empty());
        assert!(!p.require_approval_for_prompts);
        assert!(!p.require_approval_for_tools);
    }
}
