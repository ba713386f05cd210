//! The resolved caller identity and its permission set.

use scope_config_core::Node;

/// `admin:*` grants every permission unconditionally.
pub const ADMIN_WILDCARD: &str = "admin:*";

/// A resolved caller, tagged by how it authenticated.
///
/// Every authorization decision pattern-matches on this variant rather than
/// inspecting the raw bearer credential; see [`Principal::has_permission`]
/// and [`Principal::can_write_node`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// Authenticated via the env-sourced break-glass token or a DB-resident
    /// admin token. `org_id: None` means global (spans every org).
    Admin {
        /// `None` for a global admin; `Some` for an org-scoped admin token.
        org_id: Option<String>,
        /// Dotted permission strings this token carries.
        permissions: Vec<String>,
    },
    /// Authenticated via a team-scoped bearer token.
    Team {
        /// Tenant this token belongs to.
        org_id: String,
        /// The team node this token is scoped to.
        team_node_id: String,
        /// Dotted permission strings (`config:read`, `config:write:self`).
        permissions: Vec<String>,
    },
    /// Authenticated via an SSO JWT mapped to a read-only role.
    Viewer {
        /// Tenant this identity belongs to.
        org_id: String,
        /// Dotted permission strings (typically just `config:read`).
        permissions: Vec<String>,
    },
}

impl Principal {
    /// The org this principal is scoped to, if any. `None` only for a
    /// global admin.
    #[must_use]
    pub fn org_id(&self) -> Option<&str> {
        match self {
            Principal::Admin { org_id, .. } => org_id.as_deref(),
            Principal::Team { org_id, .. } => Some(org_id),
            Principal::Viewer { org_id, .. } => Some(org_id),
        }
    }

    /// A stable tag for the auth method used, surfaced on `/auth/me`.
    #[must_use]
    pub fn auth_kind(&self) -> &'static str {
        match self {
            Principal::Admin { .. } => "admin",
            Principal::Team { .. } => "team",
            Principal::Viewer { .. } => "viewer",
        }
    }

    /// A stable role tag, surfaced on `/auth/me`.
    #[must_use]
    pub fn role(&self) -> &'static str {
        match self {
            Principal::Admin { .. } => "admin",
            Principal::Team { .. } => "team",
            Principal::Viewer { .. } => "viewer",
        }
    }

    /// This principal's team node, if it has one.
    #[must_use]
    pub fn team_node_id(&self) -> Option<&str> {
        match self {
            Principal::Team { team_node_id, .. } => Some(team_node_id),
            _ => None,
        }
    }

    fn permissions(&self) -> &[String] {
        match self {
            Principal::Admin { permissions, .. }
            | Principal::Team { permissions, .. }
            | Principal::Viewer { permissions, .. } => permissions,
        }
    }

    /// `true` if this principal holds `permission`, or the `admin:*` wildcard.
    #[must_use]
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions()
            .iter()
            .any(|p| p == ADMIN_WILDCARD || p == permission)
    }

    /// `true` if this principal may write to `target_node_id`.
    ///
    /// Admins with `admin:*` may write anywhere. A team principal may write
    /// iff `target_node_id` is its own team node or a descendant of it —
    /// established by `target_lineage` containing the caller's
    /// `team_node_id` (lineage is root-to-leaf and always includes the
    /// target node itself).
    #[must_use]
    pub fn can_write_node(&self, target_node_id: &str, target_lineage: &[Node]) -> bool {
        match self {
            Principal::Admin { .. } => self.has_permission(ADMIN_WILDCARD),
            Principal::Team { team_node_id, .. } => {
                if !self.has_permission("config:write:self") {
                    return false;
                }
                team_node_id == target_node_id
                    || target_lineage.iter().any(|n| &n.node_id == team_node_id)
            }
            Principal::Viewer { .. } => false,
        }
    }
}
