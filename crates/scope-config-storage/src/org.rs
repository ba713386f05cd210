//! Organization repository.

use crate::map_db_err;
use chrono::{DateTime, Utc};
use scope_config_core::Organization;
use scope_config_error::ScopeConfigError;
use sqlx::PgPool;
use tracing::instrument;

#[derive(Debug, sqlx::FromRow)]
struct OrgRow {
    org_id: String,
    created_at: DateTime<Utc>,
}

impl From<OrgRow> for Organization {
    fn from(row: OrgRow) -> Self {
        Organization {
            org_id: row.org_id,
            created_at: row.created_at,
        }
    }
}

/// Repository for the `organizations` table.
#[derive(Clone)]
pub struct OrgRepo {
    pool: PgPool,
}

impl OrgRepo {
    /// Build a repository over `pool`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new organization.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeConfigError::Conflict`] if `org_id` already exists.
    #[instrument(skip(self), name = "db_create_org")]
    pub async fn create(&self, org_id: &str, now: DateTime<Utc>) -> Result<Organization, ScopeConfigError> {
        sqlx::query("INSERT INTO organizations (org_id, created_at) VALUES ($1, $2)")
            .bind(org_id)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    ScopeConfigError::conflict(format!("organization '{org_id}' already exists"))
                }
                _ => map_db_err("create_org", e),
            })?;
        Ok(Organization::new(org_id.to_string(), now))
    }

    /// Fetch an organization by id.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeConfigError::NotFound`] if it does not exist.
    #[instrument(skip(self), name = "db_get_org")]
    pub async fn get(&self, org_id: &str) -> Result<Organization, ScopeConfigError> {
        sqlx::query_as::<_, OrgRow>("SELECT org_id, created_at FROM organizations WHERE org_id = $1")
            .bind(org_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_db_err("get_org", e))?
            .map(Into::into)
            .ok_or_else(|| ScopeConfigError::not_found(format!("organization '{org_id}'")))
    }

    /// List all organizations, ordered by creation time.
    #[instrument(skip(self), name = "db_list_orgs")]
    pub async fn list(&self) -> Result<Vec<Organization>, ScopeConfigError> {
        let rows = sqlx::query_as::<_, OrgRow>("SELECT org_id, created_at FROM organizations ORDER BY created_at")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_db_err("list_orgs", e))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
