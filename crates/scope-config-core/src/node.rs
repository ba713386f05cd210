//! The scope tree: [`Node`] forms a rooted forest per organization;
//! [`NodeConfig`] stores a node's local configuration overrides.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The kind of a node in the scope tree.
///
/// Ordering (`org` → `unit` → `team`) is soft: nothing here enforces it.
/// Whether nesting order is hard-checked is a policy decision left to the
/// security policy engine, not the tree itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// The organization root. Exactly one per org, with `parent_id = None`.
    Org,
    /// An intermediate business unit.
    Unit,
    /// A leaf team — the only node type tokens may be issued against.
    Team,
}

impl NodeType {
    /// `true` for [`NodeType::Team`], the only node type tokens attach to.
    #[must_use]
    pub fn is_team(self) -> bool {
        matches!(self, NodeType::Team)
    }
}

/// A node in an organization's scope tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Node {
    /// Tenant this node belongs to.
    pub org_id: String,
    /// Identifier, unique within the org.
    pub node_id: String,
    /// Parent node id; `None` only for the org root.
    pub parent_id: Option<String>,
    /// Org / unit / team.
    pub node_type: NodeType,
    /// Display name.
    pub name: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp (renames, reparenting).
    pub updated_at: DateTime<Utc>,
}

impl Node {
    /// `true` if this node is the org root (`parent_id = None`).
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none() && self.node_type == NodeType::Org
    }
}

/// A node's local configuration overrides (not the merged/effective view).
///
/// `config` may contain envelope strings in place of sensitive scalar
/// values; decryption happens at the storage-repository boundary, never
/// here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NodeConfig {
    /// Tenant this config belongs to.
    pub org_id: String,
    /// The node these overrides apply to.
    pub node_id: String,
    /// Local override object. Top-level must be a JSON object.
    pub config: Value,
    /// Last write timestamp.
    pub updated_at: DateTime<Utc>,
    /// Identity string of whoever last wrote this config (actor).
    pub updated_by: String,
}

impl NodeConfig {
    /// An empty config for `node_id`, as created alongside a fresh [`Node`].
    #[must_use]
    pub fn empty(org_id: impl Into<String>, node_id: impl Into<String>, now: DateTime<Utc>, updated_by: impl Into<String>) -> Self {
        Self {
            org_id: org_id.into(),
            node_id: node_id.into(),
            config: Value::Object(serde_json::Map::new()),
            updated_at: now,
            updated_by: updated_by.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_node(node_type: NodeType, parent_id: Option<&str>) -> Node {
        let now = Utc::now();
        Node {
            org_id: "acme".into(),
            node_id: "n1".into(),
            parent_id: parent_id.map(str::to_owned),
            node_type,
            name: "n1".into(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn org_root_with_no_parent_is_root() {
        let node = sample_node(NodeType::Org, None);
        assert!(node.is_root());
    }

    #[test]
    fn unit_with_no_parent_is_not_root() {
        // only an Org-typed, parentless node counts as root
        let node = sample_node(NodeType::Unit, None);
        assert!(!node.is_root());
    }

    #[test]
    fn node_with_parent_is_not_root() {
        let node = sample_node(NodeType::Team, Some("parent"));
        assert!(!node.is_root());
    }

    #[test]
    fn team_is_team_unit_is_not() {
        assert!(NodeType::Team.is_team());
        assert!(!NodeType::Unit.is_team());
        assert!(!NodeType::Org.is_team());
    }

    #[test]
    fn empty_node_config_has_empty_object() {
        let cfg = NodeConfig::empty("acme", "n1", Utc::now(), "system");
        assert_eq!(cfg.config, Value::Object(serde_json::Map::new()));
    }
}
