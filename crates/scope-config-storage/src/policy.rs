//! Security policy repository: one row per org.

use crate::map_db_err;
use chrono::{DateTime, Utc};
use scope_config_core::SecurityPolicy;
use scope_config_error::ScopeConfigError;
use sqlx::PgPool;
use std::collections::BTreeMap;
use tracing::instrument;

#[derive(Debug, sqlx::FromRow)]
struct PolicyRow {
    org_id: String,
    token_expiry_days: Option<i32>,
    token_warn_before_days: Option<i32>,
    token_revoke_inactive_days: Option<i32>,
    locked_paths: serde_json::Value,
    max_values: serde_json::Value,
    require_approval_for_prompts: bool,
    require_approval_for_tools: bool,
    log_all_changes: bool,
}

impl TryFrom<PolicyRow> for SecurityPolicy {
    type Error = ScopeConfigError;

    fn try_from(row: PolicyRow) -> Result<Self, Self::Error> {
        let locked_paths: Vec<String> = serde_json::from_value(row.locked_paths)
            .map_err(|e| ScopeConfigError::invalid_input(format!("corrupt locked_paths: {e}")))?;
        let max_values: BTreeMap<String, f64> = serde_json::from_value(row.max_values)
            .map_err(|e| ScopeConfigError::invalid_input(format!("corrupt max_values: {e}")))?;
        Ok(SecurityPolicy {
            org_id: row.org_id,
            token_expiry_days: row.token_expiry_days.map(|v| v as u32),
            token_warn_before_days: row.token_warn_before_days.map(|v| v as u32),
            token_revoke_inactive_days: row.token_revoke_inactive_days.map(|v| v as u32),
            locked_paths,
            max_values,
            require_approval_for_prompts: row.require_approval_for_prompts,
            require_approval_for_tools: row.require_approval_for_tools,
            log_all_changes: row.log_all_changes,
        })
    }
}

/// Repository for the `security_policies` table.
#[derive(Clone)]
pub struct PolicyRepo {
    pool: PgPool,
}

impl PolicyRepo {
    /// Build a repository over `pool`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fetch an org's policy, or [`SecurityPolicy::default_for`] if none has been set.
    #[instrument(skip(self), name = "db_get_policy")]
    pub async fn get(&self, org_id: &str) -> Result<SecurityPolicy, ScopeConfigError> {
        let row = sqlx::query_as::<_, PolicyRow>(
            "SELECT org_id, token_expiry_days, token_warn_before_days, token_revoke_inactive_days, \
                    locked_paths, max_values, require_approval_for_prompts, require_approval_for_tools, log_all_changes \
             FROM security_policies WHERE org_id = $1",
        )
        .bind(org_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_db_err("get_policy", e))?;

        match row {
            Some(row) => row.try_into(),
            None => Ok(SecurityPolicy::default_for(org_id)),
        }
    }

    /// Upsert an org's policy.
    #[instrument(skip(self, policy), name = "db_put_policy")]
    pub async fn put(&self, policy: &SecurityPolicy, now: DateTime<Utc>) -> Result<(), ScopeConfigError> {
        let locked_paths = serde_json::to_value(&policy.locked_paths)
            .map_err(|e| ScopeConfigError::invalid_input(format!("cannot serialize locked_paths: {e}")))?;
        let max_values = serde_json::to_value(&policy.max_values)
            .map_err(|e| ScopeConfigError::invalid_input(format!("cannot serialize max_values: {e}")))?;

        sqlx::query(
            "INSERT INTO security_policies \
                (org_id, token_expiry_days, token_warn_before_days, token_revoke_inactive_days, \
                 locked_paths, max_values, require_approval_for_prompts, require_approval_for_tools, log_all_changes, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (org_id) DO UPDATE SET \
                token_expiry_days = EXCLUDED.token_expiry_days, \
                token_warn_before_days = EXCLUDED.token_warn_before_days, \
                token_revoke_inactive_days = EXCLUDED.token_revoke_inactive_days, \
                locked_paths = EXCLUDED.locked_paths, \
                max_values = EXCLUDED.max_values, \
                require_approval_for_prompts = EXCLUDED.require_approval_for_prompts, \
                require_approval_for_tools = EXCLUDED.require_approval_for_tools, \
                log_all_changes = EXCLUDED.log_all_changes, \
                updated_at = EXCLUDED.updated_at",
        )
        .bind(&policy.org_id)
        .bind(policy.token_expiry_days.map(|v| v as i32))
        .bind(policy.token_warn_before_days.map(|v| v as i32))
        .bind(policy.token_revoke_inactive_days.map(|v| v as i32))
        .bind(locked_paths)
        .bind(max_values)
        .bind(policy.require_approval_for_prompts)
        .bind(policy.require_approval_for_tools)
        .bind(policy.log_all_changes)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_err("put_policy", e))?;
        Ok(())
    }
}
