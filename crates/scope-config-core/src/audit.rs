//! Append-only [`AuditEvent`]s aggregating token, config, and agent activity.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which subsystem produced an [`AuditEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditSource {
    /// Token issuance, revocation, expiry, or inactivity sweep.
    Token,
    /// Scope tree or node-config mutation.
    Config,
    /// Events ingested from the orchestrator describing an agent run.
    Agent,
}

impl AuditSource {
    /// The wire string used in filters and CSV export (`"token"`, `"config"`, `"agent"`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AuditSource::Token => "token",
            AuditSource::Config => "config",
            AuditSource::Agent => "agent",
        }
    }
}

/// An append-only record of a state-changing operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AuditEvent {
    /// Unique event identifier.
    pub event_id: uuid::Uuid,
    /// Tenant this event belongs to.
    pub org_id: String,
    /// Which subsystem produced this event.
    pub source: AuditSource,
    /// A short machine-oriented type tag (e.g. `"node_created"`, `"token_revoked"`).
    pub event_type: String,
    /// When the underlying operation occurred.
    pub occurred_at: DateTime<Utc>,
    /// Identity string of whoever (or whatever) performed the action.
    pub actor: String,
    /// Team node the event concerns, if applicable.
    pub team_node_id: Option<String>,
    /// One-line human summary.
    pub summary: String,
    /// Structured detail payload (diff, reason, etc).
    pub details: Value,
    /// Caller-supplied or server-minted correlation id.
    pub correlation_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_source_as_str_matches_wire_format() {
        assert_eq!(AuditSource::Token.as_str(), "token");
        assert_eq!(AuditSource::Config.as_str(), "config");
        assert_eq!(AuditSource::Agent.as_str(), "agent");
    }

    #[test]
    fn audit_event_serde_roundtrip() {
        let event = AuditEvent {
            event_id: uuid::Uuid::nil(),
            org_id: "acme".into(),
            source: AuditSource::Config,
            event_type: "node_created".into(),
            occurred_at: Utc::now(),
            actor: "admin".into(),
            team_node_id: Some("sre".into()),
            summary: "created node sre".into(),
            details: serde_json::json!({"node_id": "sre"}),
            correlation_id: Some("corr-1".into()),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: AuditEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }
}
