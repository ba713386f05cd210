//! Node tree and per-node config repositories.

use crate::map_db_err;
use chrono::{DateTime, Utc};
use scope_config_core::{Node, NodeConfig, NodeType};
use scope_config_error::ScopeConfigError;
use serde_json::Value;
use sqlx::PgPool;
use tracing::instrument;

#[derive(Debug, sqlx::FromRow)]
struct NodeRow {
    org_id: String,
    node_id: String,
    parent_id: Option<String>,
    node_type: String,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn parse_node_type(s: &str) -> Result<NodeType, ScopeConfigError> {
    match s {
        "org" => Ok(NodeType::Org),
        "unit" => Ok(NodeType::Unit),
        "team" => Ok(NodeType::Team),
        other => Err(ScopeConfigError::invalid_input(format!("unknown node_type '{other}'"))),
    }
}

fn node_type_str(t: NodeType) -> &'static str {
    match t {
        NodeType::Org => "org",
        NodeType::Unit => "unit",
        NodeType::Team => "team",
    }
}

impl TryFrom<NodeRow> for Node {
    type Error = ScopeConfigError;

    fn try_from(row: NodeRow) -> Result<Self, Self::Error> {
        Ok(Node {
            org_id: row.org_id,
            node_id: row.node_id,
            parent_id: row.parent_id,
            node_type: parse_node_type(&row.node_type)?,
            name: row.name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const NODE_COLUMNS: &str = "org_id, node_id, parent_id, node_type, name, created_at, updated_at";

/// Repository for the `nodes` table: the scope tree itself.
#[derive(Clone)]
pub struct NodeRepo {
    pool: PgPool,
}

impl NodeRepo {
    /// Build a repository over `pool`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new node.
    ///
    /// # Errors
    ///
    /// [`ScopeConfigError::Conflict`] if `node_id` already exists within the org.
    #[instrument(skip(self), name = "db_create_node")]
    pub async fn create(&self, node: &Node) -> Result<(), ScopeConfigError> {
        sqlx::query(
            "INSERT INTO nodes (org_id, node_id, parent_id, node_type, name, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&node.org_id)
        .bind(&node.node_id)
        .bind(&node.parent_id)
        .bind(node_type_str(node.node_type))
        .bind(&node.name)
        .bind(node.created_at)
        .bind(node.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                ScopeConfigError::conflict(format!("node '{}' already exists", node.node_id))
            }
            _ => map_db_err("create_node", e),
        })?;
        Ok(())
    }

    /// Fetch one node by id.
    #[instrument(skip(self), name = "db_get_node")]
    pub async fn get(&self, org_id: &str, node_id: &str) -> Result<Node, ScopeConfigError> {
        let row = sqlx::query_as::<_, NodeRow>(&format!(
            "SELECT {NODE_COLUMNS} FROM nodes WHERE org_id = $1 AND node_id = $2"
        ))
        .bind(org_id)
        .bind(node_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_db_err("get_node", e))?
        .ok_or_else(|| ScopeConfigError::not_found(format!("node '{node_id}'")))?;
        row.try_into()
    }

    /// Direct children of `node_id`.
    #[instrument(skip(self), name = "db_children")]
    pub async fn children(&self, org_id: &str, node_id: &str) -> Result<Vec<Node>, ScopeConfigError> {
        let rows = sqlx::query_as::<_, NodeRow>(&format!(
            "SELECT {NODE_COLUMNS} FROM nodes WHERE org_id = $1 AND parent_id = $2 ORDER BY name"
        ))
        .bind(org_id)
        .bind(node_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_db_err("children", e))?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Every node belonging to an org (used for depth/cycle checks and full dumps).
    #[instrument(skip(self), name = "db_list_nodes")]
    pub async fn list(&self, org_id: &str) -> Result<Vec<Node>, ScopeConfigError> {
        let rows = sqlx::query_as::<_, NodeRow>(&format!(
            "SELECT {NODE_COLUMNS} FROM nodes WHERE org_id = $1 ORDER BY created_at"
        ))
        .bind(org_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_db_err("list_nodes", e))?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Root-to-leaf lineage for `node_id`, root first.
    ///
    /// Walks parent pointers in application code rather than a recursive CTE,
    /// matching [`scope_config_tree`]'s bounded-depth guard: a lineage longer
    /// than [`scope_config_core::DEFAULT_MAX_TREE_DEPTH`] indicates a cycle
    /// and is reported as [`ScopeConfigError::Conflict`].
    #[instrument(skip(self), name = "db_lineage")]
    pub async fn lineage(&self, org_id: &str, node_id: &str) -> Result<Vec<Node>, ScopeConfigError> {
        let all = self.list(org_id).await?;
        let by_id: std::collections::HashMap<&str, &Node> =
            all.iter().map(|n| (n.node_id.as_str(), n)).collect();

        let mut chain = Vec::new();
        let mut seen = std::collections::HashSet::new();
        let mut current = by_id
            .get(node_id)
            .copied()
            .ok_or_else(|| ScopeConfigError::not_found(format!("node '{node_id}'")))?;
        loop {
            if !seen.insert(current.node_id.clone()) {
                return Err(ScopeConfigError::conflict("cycle detected in scope tree"));
            }
            chain.push(current.clone());
            if chain.len() > scope_config_core::DEFAULT_MAX_TREE_DEPTH {
                return Err(ScopeConfigError::conflict("scope tree exceeds maximum depth"));
            }
            match &current.parent_id {
                Some(parent_id) => {
                    current = by_id
                        .get(parent_id.as_str())
                        .copied()
                        .ok_or_else(|| ScopeConfigError::conflict("dangling parent_id in scope tree"))?;
                }
                None => break,
            }
        }
        chain.reverse();
        Ok(chain)
    }

    /// Rename a node and/or move it under a new parent.
    #[instrument(skip(self), name = "db_update_node")]
    pub async fn update(&self, org_id: &str, node_id: &str, name: Option<&str>, parent_id: Option<&str>, now: DateTime<Utc>) -> Result<(), ScopeConfigError> {
        let result = sqlx::query(
            "UPDATE nodes SET name = COALESCE($3, name), parent_id = COALESCE($4, parent_id), updated_at = $5 \
             WHERE org_id = $1 AND node_id = $2",
        )
        .bind(org_id)
        .bind(node_id)
        .bind(name)
        .bind(parent_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_err("update_node", e))?;
        if result.rows_affected() == 0 {
            return Err(ScopeConfigError::not_found(format!("node '{node_id}'")));
        }
        Ok(())
    }

    /// Delete a node (and, via `ON DELETE CASCADE`, its subtree and config).
    #[instrument(skip(self), name = "db_delete_node")]
    pub async fn delete(&self, org_id: &str, node_id: &str) -> Result<(), ScopeConfigError> {
        let result = sqlx::query("DELETE FROM nodes WHERE org_id = $1 AND node_id = $2")
            .bind(org_id)
            .bind(node_id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_err("delete_node", e))?;
        if result.rows_affected() == 0 {
            return Err(ScopeConfigError::not_found(format!("node '{node_id}'")));
        }
        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct NodeConfigRow {
    org_id: String,
    node_id: String,
    config: Value,
    updated_at: DateTime<Utc>,
    updated_by: String,
}

impl From<NodeConfigRow> for NodeConfig {
    fn from(row: NodeConfigRow) -> Self {
        NodeConfig {
            org_id: row.org_id,
            node_id: row.node_id,
            config: row.config,
            updated_at: row.updated_at,
            updated_by: row.updated_by,
        }
    }
}

/// Repository for per-node local configuration overrides.
#[derive(Clone)]
pub struct ConfigRepo {
    pool: PgPool,
}

impl ConfigRepo {
    /// Build a repository over `pool`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert or replace a node's local config wholesale (upsert).
    ///
    /// `config` is stored exactly as given — already encrypted by
    /// `scope-config-crypto` at the caller's boundary.
    #[instrument(skip(self, config), name = "db_put_node_config")]
    pub async fn put(&self, org_id: &str, node_id: &str, config: &Value, now: DateTime<Utc>, updated_by: &str) -> Result<(), ScopeConfigError> {
        sqlx::query(
            "INSERT INTO node_configs (node_id, org_id, config, updated_at, updated_by) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (node_id) DO UPDATE SET config = EXCLUDED.config, updated_at = EXCLUDED.updated_at, updated_by = EXCLUDED.updated_by",
        )
        .bind(node_id)
        .bind(org_id)
        .bind(config)
        .bind(now)
        .bind(updated_by)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_err("put_node_config", e))?;
        Ok(())
    }

    /// Fetch a node's raw (still-encrypted) local config.
    #[instrument(skip(self), name = "db_get_node_config")]
    pub async fn get(&self, org_id: &str, node_id: &str) -> Result<NodeConfig, ScopeConfigError> {
        sqlx::query_as::<_, NodeConfigRow>(
            "SELECT org_id, node_id, config, updated_at, updated_by FROM node_configs WHERE org_id = $1 AND node_id = $2",
        )
        .bind(org_id)
        .bind(node_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_db_err("get_node_config", e))?
        .map(Into::into)
        .ok_or_else(|| ScopeConfigError::not_found(format!("config for node '{node_id}'")))
    }

    /// The underlying pool, for callers that need to open a transaction
    /// spanning this repo and another (e.g. a config write plus its audit
    /// event — see [`Self::put_tx`]).
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Same as [`Self::put`], but participates in a caller-managed
    /// transaction so the write and its audit event commit or roll back
    /// together.
    #[instrument(skip(self, tx, config), name = "db_put_node_config_tx")]
    pub async fn put_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        org_id: &str,
        node_id: &str,
        config: &Value,
        now: DateTime<Utc>,
        updated_by: &str,
    ) -> Result<(), ScopeConfigError> {
        sqlx::query(
            "INSERT INTO node_configs (node_id, org_id, config, updated_at, updated_by) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (node_id) DO UPDATE SET config = EXCLUDED.config, updated_at = EXCLUDED.updated_at, updated_by = EXCLUDED.updated_by",
        )
        .bind(node_id)
        .bind(org_id)
        .bind(config)
        .bind(now)
        .bind(updated_by)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_db_err("put_node_config_tx", e))?;
        Ok(())
    }
}
