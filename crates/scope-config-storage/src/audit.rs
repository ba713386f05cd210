//! Audit event repository: append-only inserts, filtered/paginated query.

use crate::map_db_err;
use chrono::{DateTime, Utc};
use scope_config_core::{AuditEvent, AuditSource};
use scope_config_error::ScopeConfigError;
use serde_json::Value;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
struct AuditRow {
    event_id: Uuid,
    org_id: String,
    source: String,
    event_type: String,
    occurred_at: DateTime<Utc>,
    actor: String,
    team_node_id: Option<String>,
    summary: String,
    details: Value,
    correlation_id: Option<String>,
}

impl TryFrom<AuditRow> for AuditEvent {
    type Error = ScopeConfigError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        let source = match row.source.as_str() {
            "token" => AuditSource::Token,
            "config" => AuditSource::Config,
            "agent" => AuditSource::Agent,
            other => return Err(ScopeConfigError::invalid_input(format!("unknown audit source '{other}'"))),
        };
        Ok(AuditEvent {
            event_id: row.event_id,
            org_id: row.org_id,
            source,
            event_type: row.event_type,
            occurred_at: row.occurred_at,
            actor: row.actor,
            team_node_id: row.team_node_id,
            summary: row.summary,
            details: row.details,
            correlation_id: row.correlation_id,
        })
    }
}

/// Filters accepted by [`AuditRepo::query`].
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    /// Restrict to one subsystem.
    pub source: Option<AuditSource>,
    /// Restrict to events concerning one team node.
    pub team_node_id: Option<String>,
    /// Restrict to events at or after this time.
    pub since: Option<DateTime<Utc>>,
    /// Restrict to events at or before this time.
    pub until: Option<DateTime<Utc>>,
    /// Restrict to one correlation id.
    pub correlation_id: Option<String>,
    /// Case-insensitive substring search over `summary` and stringified `details`.
    pub search: Option<String>,
}

/// Repository for the append-only `audit_events` table.
#[derive(Clone)]
pub struct AuditRepo {
    pool: PgPool,
}

impl AuditRepo {
    /// Build a repository over `pool`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append one event. Audit inserts are expected to run inside the same
    /// transaction as the state change they describe; callers should use
    /// [`AuditRepo::insert_tx`] when transactional coupling matters and this
    /// convenience wrapper otherwise.
    #[instrument(skip(self, event), fields(event_id = %event.event_id), name = "db_insert_audit_event")]
    pub async fn insert(&self, event: &AuditEvent) -> Result<(), ScopeConfigError> {
        let mut tx = self.pool.begin().await.map_err(|e| map_db_err("insert_audit_event:begin", e))?;
        Self::insert_tx(&mut tx, event).await?;
        tx.commit().await.map_err(|e| map_db_err("insert_audit_event:commit", e))?;
        Ok(())
    }

    /// Append one event as part of an already-open transaction, so the audit
    /// row and the state change it describes commit or roll back together.
    pub async fn insert_tx(tx: &mut sqlx::Transaction<'_, Postgres>, event: &AuditEvent) -> Result<(), ScopeConfigError> {
        sqlx::query(
            "INSERT INTO audit_events (event_id, org_id, source, event_type, occurred_at, actor, team_node_id, summary, details, correlation_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(event.event_id)
        .bind(&event.org_id)
        .bind(event.source.as_str())
        .bind(&event.event_type)
        .bind(event.occurred_at)
        .bind(&event.actor)
        .bind(&event.team_node_id)
        .bind(&event.summary)
        .bind(&event.details)
        .bind(&event.correlation_id)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_db_err("insert_audit_event", e))?;
        Ok(())
    }

    /// Filtered, paginated query over an org's audit log, newest first.
    #[instrument(skip(self, filter), name = "db_query_audit_events")]
    pub async fn query(&self, org_id: &str, filter: &AuditFilter, limit: i64, offset: i64) -> Result<(Vec<AuditEvent>, i64), ScopeConfigError> {
        let mut count_qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM audit_events WHERE org_id = ");
        count_qb.push_bind(org_id.to_string());
        Self::push_filter(&mut count_qb, filter);
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_db_err("query_audit_events:count", e))?;

        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT event_id, org_id, source, event_type, occurred_at, actor, team_node_id, summary, details, correlation_id \
             FROM audit_events WHERE org_id = ",
        );
        qb.push_bind(org_id.to_string());
        Self::push_filter(&mut qb, filter);
        qb.push(" ORDER BY occurred_at DESC LIMIT ");
        qb.push_bind(limit);
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        let rows: Vec<AuditRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_db_err("query_audit_events", e))?;

        let events = rows.into_iter().map(TryInto::try_into).collect::<Result<Vec<_>, _>>()?;
        Ok((events, total))
    }

    fn push_filter<'a>(qb: &mut QueryBuilder<'a, Postgres>, filter: &'a AuditFilter) {
        if let Some(source) = filter.source {
            qb.push(" AND source = ").push_bind(source.as_str());
        }
        if let Some(team_node_id) = &filter.team_node_id {
            qb.push(" AND team_node_id = ").push_bind(team_node_id.as_str());
        }
        if let Some(since) = filter.since {
            qb.push(" AND occurred_at >= ").push_bind(since);
        }
        if let Some(until) = filter.until {
            qb.push(" AND occurred_at <= ").push_bind(until);
        }
        if let Some(correlation_id) = &filter.correlation_id {
            qb.push(" AND correlation_id = ").push_bind(correlation_id.as_str());
        }
        if let Some(search) = &filter.search {
            let pattern = format!("%{search}%");
            qb.push(" AND (summary ILIKE ").push_bind(pattern.clone());
            qb.push(" OR details::text ILIKE ").push_bind(pattern);
            qb.push(")");
        }
    }
}
