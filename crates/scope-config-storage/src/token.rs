//! Token repository: team tokens, admin tokens, and the sweep query C9 uses.

use crate::map_db_err;
use chrono::{DateTime, Utc};
use scope_config_core::{AdminToken, Token};
use scope_config_error::ScopeConfigError;
use serde_json::Value;
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
struct TokenRow {
    token_id: Uuid,
    org_id: String,
    team_node_id: String,
    token_hash: Vec<u8>,
    issued_at: DateTime<Utc>,
    issued_by: String,
    last_used_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    revoked_at: Option<DateTime<Utc>>,
    revoked_reason: Option<String>,
}

impl From<TokenRow> for Token {
    fn from(row: TokenRow) -> Self {
        Token {
            token_id: row.token_id,
            org_id: row.org_id,
            team_node_id: row.team_node_id,
            token_hash: row.token_hash,
            issued_at: row.issued_at,
            issued_by: row.issued_by,
            last_used_at: row.last_used_at,
            expires_at: row.expires_at,
            revoked_at: row.revoked_at,
            revoked_reason: row.revoked_reason,
        }
    }
}

const TOKEN_COLUMNS: &str =
    "token_id, org_id, team_node_id, token_hash, issued_at, issued_by, last_used_at, expires_at, revoked_at, revoked_reason";

/// Repository for team [`Token`]s and [`AdminToken`]s.
#[derive(Clone)]
pub struct TokenRepo {
    pool: PgPool,
}

impl TokenRepo {
    /// Build a repository over `pool`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Persist a freshly issued token.
    #[instrument(skip(self, token), fields(token_id = %token.token_id), name = "db_issue_token")]
    pub async fn issue(&self, token: &Token) -> Result<(), ScopeConfigError> {
        sqlx::query(
            "INSERT INTO tokens (token_id, org_id, team_node_id, token_hash, issued_at, issued_by, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(token.token_id)
        .bind(&token.org_id)
        .bind(&token.team_node_id)
        .bind(&token.token_hash)
        .bind(token.issued_at)
        .bind(&token.issued_by)
        .bind(token.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_err("issue_token", e))?;
        Ok(())
    }

    /// Resolve a token by its HMAC hash, for authentication on every request.
    #[instrument(skip(self, token_hash), name = "db_resolve_token")]
    pub async fn resolve(&self, token_hash: &[u8]) -> Result<Token, ScopeConfigError> {
        sqlx::query_as::<_, TokenRow>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM tokens WHERE token_hash = $1"
        ))
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_db_err("resolve_token", e))?
        .map(Into::into)
        .ok_or_else(|| ScopeConfigError::not_found("token"))
    }

    /// Coalesced `last_used_at` touch (callers debounce to ≤1/min per token).
    #[instrument(skip(self), name = "db_touch_last_used")]
    pub async fn touch_last_used(&self, token_id: Uuid, at: DateTime<Utc>) -> Result<(), ScopeConfigError> {
        sqlx::query("UPDATE tokens SET last_used_at = $2 WHERE token_id = $1")
            .bind(token_id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_err("touch_last_used", e))?;
        Ok(())
    }

    /// Revoke a token, recording a human-readable reason.
    #[instrument(skip(self), name = "db_revoke_token")]
    pub async fn revoke(&self, token_id: Uuid, reason: &str, at: DateTime<Utc>) -> Result<(), ScopeConfigError> {
        let result = sqlx::query(
            "UPDATE tokens SET revoked_at = $2, revoked_reason = $3 WHERE token_id = $1 AND revoked_at IS NULL",
        )
        .bind(token_id)
        .bind(at)
        .bind(reason)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_err("revoke_token", e))?;
        if result.rows_affected() == 0 {
            return Err(ScopeConfigError::not_found("active token"));
        }
        Ok(())
    }

    /// The underlying pool, for callers that need to open a transaction
    /// spanning this repo and another (e.g. issuance/revocation plus an
    /// audit event — see [`Self::issue_tx`], [`Self::revoke_tx`]).
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Same as [`Self::issue`], but participates in a caller-managed transaction.
    #[instrument(skip(self, tx, token), fields(token_id = %token.token_id), name = "db_issue_token_tx")]
    pub async fn issue_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        token: &Token,
    ) -> Result<(), ScopeConfigError> {
        sqlx::query(
            "INSERT INTO tokens (token_id, org_id, team_node_id, token_hash, issued_at, issued_by, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(token.token_id)
        .bind(&token.org_id)
        .bind(&token.team_node_id)
        .bind(&token.token_hash)
        .bind(token.issued_at)
        .bind(&token.issued_by)
        .bind(token.expires_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_db_err("issue_token_tx", e))?;
        Ok(())
    }

    /// Same as [`Self::revoke`], but participates in a caller-managed transaction.
    #[instrument(skip(self, tx), name = "db_revoke_token_tx")]
    pub async fn revoke_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        token_id: Uuid,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<(), ScopeConfigError> {
        let result = sqlx::query(
            "UPDATE tokens SET revoked_at = $2, revoked_reason = $3 WHERE token_id = $1 AND revoked_at IS NULL",
        )
        .bind(token_id)
        .bind(at)
        .bind(reason)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_db_err("revoke_token_tx", e))?;
        if result.rows_affected() == 0 {
            return Err(ScopeConfigError::not_found("active token"));
        }
        Ok(())
    }

    /// List every token scoped to `team_node_id`.
    #[instrument(skip(self), name = "db_list_tokens_for_team")]
    pub async fn list_for_team(&self, team_node_id: &str) -> Result<Vec<Token>, ScopeConfigError> {
        let rows = sqlx::query_as::<_, TokenRow>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM tokens WHERE team_node_id = $1 ORDER BY issued_at DESC"
        ))
        .bind(team_node_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_db_err("list_tokens_for_team", e))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// List every token issued within an org.
    #[instrument(skip(self), name = "db_list_tokens_for_org")]
    pub async fn list_for_org(&self, org_id: &str) -> Result<Vec<Token>, ScopeConfigError> {
        let rows = sqlx::query_as::<_, TokenRow>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM tokens WHERE org_id = $1 ORDER BY issued_at DESC"
        ))
        .bind(org_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_db_err("list_tokens_for_org", e))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Claim up to `batch_size` active tokens that are past `expiry_cutoff`
    /// (by `issued_at`) or idle past `inactivity_cutoff` (by
    /// `COALESCE(last_used_at, issued_at)`), locking the rows so concurrent
    /// sweeper replicas never double-revoke the same token.
    ///
    /// `SELECT ... FOR UPDATE SKIP LOCKED` makes this safe to call from every
    /// replica on its own timer: a row already claimed by another sweeper is
    /// simply skipped rather than awaited.
    #[instrument(skip(self), name = "db_claim_sweep_candidates")]
    pub async fn claim_sweep_candidates(
        &self,
        expiry_cutoff: DateTime<Utc>,
        inactivity_cutoff: DateTime<Utc>,
        batch_size: i64,
    ) -> Result<Vec<(Uuid, &'static str)>, ScopeConfigError> {
        let mut tx = self.pool.begin().await.map_err(|e| map_db_err("claim_sweep_candidates:begin", e))?;

        let rows: Vec<(Uuid, bool)> = sqlx::query_as(
            "SELECT token_id, expires_at IS NOT NULL AND expires_at <= $1 AS past_expiry \
             FROM tokens \
             WHERE revoked_at IS NULL \
               AND ( \
                 (expires_at IS NOT NULL AND expires_at <= $1) \
                 OR COALESCE(last_used_at, issued_at) <= $2 \
               ) \
             ORDER BY issued_at \
             LIMIT $3 \
             FOR UPDATE SKIP LOCKED",
        )
        .bind(expiry_cutoff)
        .bind(inactivity_cutoff)
        .bind(batch_size)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_db_err("claim_sweep_candidates:select", e))?;

        let now = Utc::now();
        for (token_id, past_expiry) in &rows {
            let reason = if *past_expiry { "expired" } else { "inactive" };
            sqlx::query("UPDATE tokens SET revoked_at = $2, revoked_reason = $3 WHERE token_id = $1")
                .bind(token_id)
                .bind(now)
                .bind(reason)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_db_err("claim_sweep_candidates:revoke", e))?;
        }

        tx.commit().await.map_err(|e| map_db_err("claim_sweep_candidates:commit", e))?;

        Ok(rows
            .into_iter()
            .map(|(id, past_expiry)| (id, if past_expiry { "expired" } else { "inactive" }))
            .collect())
    }

    /// Create an admin token, persisting its org scope (or lack of one) and
    /// its custom permission scopes.
    #[instrument(skip(self, token, created_by), fields(token_id = %token.token_id), name = "db_create_admin_token")]
    pub async fn create_admin(&self, token: &AdminToken, created_by: &str) -> Result<(), ScopeConfigError> {
        let scopes = serde_json::to_value(&token.scopes)
            .map_err(|e| ScopeConfigError::invalid_input(format!("cannot serialize admin token scopes: {e}")))?;
        sqlx::query(
            "INSERT INTO admin_tokens (token_id, org_id, token_hash, scopes, created_at, created_by, revoked_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(token.token_id)
        .bind(&token.org_id)
        .bind(&token.token_hash)
        .bind(scopes)
        .bind(token.issued_at)
        .bind(created_by)
        .bind(token.revoked_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_err("create_admin_token", e))?;
        Ok(())
    }

    /// Resolve an admin token by its HMAC hash, returning its actual
    /// persisted org scope and permission scopes.
    #[instrument(skip(self, token_hash), name = "db_resolve_admin_token")]
    pub async fn resolve_admin(&self, token_hash: &[u8]) -> Result<AdminToken, ScopeConfigError> {
        #[derive(sqlx::FromRow)]
        struct Row {
            token_id: Uuid,
            org_id: Option<String>,
            token_hash: Vec<u8>,
            scopes: Value,
            created_at: DateTime<Utc>,
            revoked_at: Option<DateTime<Utc>>,
        }
        let row = sqlx::query_as::<_, Row>(
            "SELECT token_id, org_id, token_hash, scopes, created_at, revoked_at FROM admin_tokens WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_db_err("resolve_admin_token", e))?
        .ok_or_else(|| ScopeConfigError::not_found("admin token"))?;
        let scopes: Vec<String> = serde_json::from_value(row.scopes)
            .map_err(|e| ScopeConfigError::invalid_input(format!("corrupt admin token scopes: {e}")))?;
        Ok(AdminToken {
            token_id: row.token_id,
            org_id: row.org_id,
            token_hash: row.token_hash,
            scopes,
            issued_at: row.created_at,
            revoked_at: row.revoked_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_columns_constant_matches_struct_field_count() {
        assert_eq!(TOKEN_COLUMNS.split(',').count(), 10);
    }
}
