//! Tree mutation and effective-config computation over `scope-config-storage`.

use crate::merge::merge_chain;
use chrono::{DateTime, Utc};
use scope_config_core::{Node, NodeConfig, NodeType, DEFAULT_MAX_TREE_DEPTH};
use scope_config_crypto::subtree::{decrypt_subtree, encrypt_subtree};
use scope_config_crypto::EncryptionKeyring;
use scope_config_error::ScopeConfigError;
use scope_config_storage::{ConfigRepo, NodeRepo};
use serde_json::Value;
use uuid::Uuid;

/// Tree operations: node CRUD, lineage, and effective-config merge.
///
/// A bounded depth guard (`max_depth`, defaulting to
/// [`DEFAULT_MAX_TREE_DEPTH`]) rejects both unbounded-depth creation and
/// cycles introduced by reparenting, since a cycle manifests as an
/// unbounded walk the same way an overly deep chain does.
#[derive(Clone)]
pub struct TreeService {
    nodes: NodeRepo,
    configs: ConfigRepo,
    max_depth: usize,
}

impl TreeService {
    /// Build a tree service over the given repositories.
    #[must_use]
    pub fn new(nodes: NodeRepo, configs: ConfigRepo) -> Self {
        Self {
            nodes,
            configs,
            max_depth: DEFAULT_MAX_TREE_DEPTH,
        }
    }

    /// Override the default depth guard (primarily for tests).
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Create a node under `parent_id` (or as the org root if `parent_id` is
    /// `None` and no root exists yet), with an empty local config.
    ///
    /// # Errors
    ///
    /// [`ScopeConfigError::Conflict`] if the resulting depth would exceed
    /// `max_depth`, or if `node_id` collides with an existing node.
    pub async fn create_node(
        &self,
        org_id: &str,
        node_id: &str,
        parent_id: Option<&str>,
        node_type: NodeType,
        name: &str,
        now: DateTime<Utc>,
        actor: &str,
    ) -> Result<Node, ScopeConfigError> {
        if let Some(parent_id) = parent_id {
            let lineage = self.nodes.lineage(org_id, parent_id).await?;
            if lineage.len() + 1 > self.max_depth {
                return Err(ScopeConfigError::conflict("scope tree would exceed maximum depth"));
            }
        }

        let node = Node {
            org_id: org_id.to_string(),
            node_id: node_id.to_string(),
            parent_id: parent_id.map(str::to_string),
            node_type,
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.nodes.create(&node).await?;
        self.configs
            .put(org_id, node_id, &Value::Object(serde_json::Map::new()), now, actor)
            .await?;
        Ok(node)
    }

    /// Rename and/or reparent a node.
    ///
    /// # Errors
    ///
    /// [`ScopeConfigError::Conflict`] if the new parent is the node itself or
    /// one of its own descendants (a cycle), or if the new depth would
    /// exceed `max_depth`.
    pub async fn update_node(
        &self,
        org_id: &str,
        node_id: &str,
        name: Option<&str>,
        new_parent_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), ScopeConfigError> {
        if let Some(new_parent_id) = new_parent_id {
            if new_parent_id == node_id {
                return Err(ScopeConfigError::conflict("a node cannot be its own parent"));
            }
            let descendants = self.descendant_ids(org_id, node_id).await?;
            if descendants.contains(new_parent_id) {
                return Err(ScopeConfigError::conflict("reparenting under a descendant would create a cycle"));
            }
            let new_lineage = self.nodes.lineage(org_id, new_parent_id).await?;
            if new_lineage.len() + 1 > self.max_depth {
                return Err(ScopeConfigError::conflict("reparenting would exceed maximum tree depth"));
            }
        }
        self.nodes.update(org_id, node_id, name, new_parent_id, now).await
    }

    /// Delete a node.
    ///
    /// # Errors
    ///
    /// [`ScopeConfigError::InvalidInput`] if the node has children — there
    /// is no implicit cascade of a subtree. Callers that also need to
    /// revoke tokens attached to the node (if it is a team) are expected to
    /// do so before calling this, through the audited revoke path rather
    /// than relying on the storage layer's `ON DELETE CASCADE`.
    pub async fn delete_node(&self, org_id: &str, node_id: &str) -> Result<(), ScopeConfigError> {
        if !self.nodes.children(org_id, node_id).await?.is_empty() {
            return Err(ScopeConfigError::invalid_input("node has children; delete them first"));
        }
        self.nodes.delete(org_id, node_id).await
    }

    /// Direct children of a node.
    pub async fn children(&self, org_id: &str, node_id: &str) -> Result<Vec<Node>, ScopeConfigError> {
        self.nodes.children(org_id, node_id).await
    }

    /// Every node in the org.
    pub async fn list_nodes(&self, org_id: &str) -> Result<Vec<Node>, ScopeConfigError> {
        self.nodes.list(org_id).await
    }

    /// Root-to-leaf lineage of `node_id`.
    pub async fn lineage(&self, org_id: &str, node_id: &str) -> Result<Vec<Node>, ScopeConfigError> {
        self.nodes.lineage(org_id, node_id).await
    }

    /// A node's own local override config, still in its stored (possibly
    /// envelope-encrypted) form.
    pub async fn raw_config(&self, org_id: &str, node_id: &str) -> Result<NodeConfig, ScopeConfigError> {
        self.configs.get(org_id, node_id).await
    }

    /// Replace a node's local override config. `new_config` is plaintext;
    /// sensitive keys are encrypted under `keyring` before the write.
    pub async fn put_node_config(
        &self,
        org_id: &str,
        node_id: &str,
        new_config: &Value,
        keyring: &EncryptionKeyring,
        sensitive_keys: &[String],
        now: DateTime<Utc>,
        actor: &str,
    ) -> Result<(), ScopeConfigError> {
        let encrypted = encrypt_subtree(new_config, sensitive_keys, keyring)?;
        self.configs.put(org_id, node_id, &encrypted, now, actor).await
    }

    /// The merged, decrypted effective configuration at `node_id`: every
    /// ancestor's local config, root first, folded with [`merge_chain`].
    pub async fn effective_config(&self, org_id: &str, node_id: &str, keyring: &EncryptionKeyring) -> Result<Value, ScopeConfigError> {
        let lineage = self.nodes.lineage(org_id, node_id).await?;
        let mut decrypted = Vec::with_capacity(lineage.len());
        for node in &lineage {
            let cfg = self.configs.get(org_id, &node.node_id).await?;
            decrypted.push(decrypt_subtree(&cfg.config, keyring)?);
        }
        Ok(merge_chain(decrypted.iter()))
    }

    async fn descendant_ids(&self, org_id: &str, node_id: &str) -> Result<std::collections::HashSet<String>, ScopeConfigError> {
        let all = self.nodes.list(org_id).await?;
        let mut children_of: std::collections::HashMap<&str, Vec<&str>> = std::collections::HashMap::new();
        for n in &all {
            if let Some(parent) = &n.parent_id {
                children_of.entry(parent.as_str()).or_default().push(&n.node_id);
            }
        }
        let mut out = std::collections::HashSet::new();
        let mut stack = vec![node_id];
        while let Some(current) = stack.pop() {
            if let Some(children) = children_of.get(current) {
                for &child in children {
                    if out.insert(child.to_string()) {
                        stack.push(child);
                    }
                }
            }
        }
        Ok(out)
    }
}

/// Generate a fresh node identifier. The scope tree does not require any
/// particular id shape; a UUID keeps ids collision-free across orgs without
/// callers needing to coordinate.
#[must_use]
pub fn new_node_id() -> String {
    Uuid::new_v4().to_string()
}
