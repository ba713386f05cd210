//! Bearer credentials: team [`Token`]s, [`AdminToken`]s, and per-org
//! [`SsoConfig`].

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// An opaque bearer token scoped to a team node.
///
/// The plaintext secret is never stored — only `token_hash`, an HMAC of the
/// secret under the server-wide pepper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Token {
    /// Short identifier used for UI reference; not secret.
    pub token_id: uuid::Uuid,
    /// Tenant this token belongs to.
    pub org_id: String,
    /// The team node this token is scoped to. Must be `NodeType::Team`.
    pub team_node_id: String,
    /// HMAC-SHA256(pepper, plaintext secret). Indexed, never the raw secret.
    #[serde(with = "hex_bytes")]
    pub token_hash: Vec<u8>,
    /// When the token was issued.
    pub issued_at: DateTime<Utc>,
    /// Actor who issued the token.
    pub issued_by: String,
    /// Last time this token was presented (coalesced, minute granularity).
    pub last_used_at: Option<DateTime<Utc>>,
    /// Effective expiry, if the org's token expiry policy is set.
    pub expires_at: Option<DateTime<Utc>>,
    /// When the token was revoked, if it has been.
    pub revoked_at: Option<DateTime<Utc>>,
    /// Why the token was revoked (`"expired"`, `"inactive"`, or an operator reason).
    pub revoked_reason: Option<String>,
}

impl Token {
    /// A token is active iff it isn't revoked and hasn't passed its expiry.
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        if self.revoked_at.is_some() {
            return false;
        }
        match self.expires_at {
            Some(exp) => exp > now,
            None => true,
        }
    }
}

/// An admin token: org-scoped or global, bypassing the team boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AdminToken {
    /// Short identifier for UI reference.
    pub token_id: uuid::Uuid,
    /// `None` for a global admin token spanning every org.
    pub org_id: Option<String>,
    /// HMAC-SHA256(pepper, plaintext secret).
    #[serde(with = "hex_bytes")]
    pub token_hash: Vec<u8>,
    /// Dotted permission strings this token carries (e.g. `admin:*`).
    pub scopes: Vec<String>,
    /// When the token was issued.
    pub issued_at: DateTime<Utc>,
    /// When the token was revoked, if it has been.
    pub revoked_at: Option<DateTime<Utc>>,
}

impl AdminToken {
    /// A token is active iff it isn't revoked.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.revoked_at.is_none()
    }
}

/// Per-org identity-provider configuration for SSO JWT resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SsoConfig {
    /// Tenant this configuration applies to.
    pub org_id: String,
    /// Identity provider family (e.g. `"okta"`, `"generic_oidc"`).
    pub provider_type: String,
    /// Token issuer (`iss` claim to match, and JWKS discovery base).
    pub issuer: String,
    /// OAuth client id.
    pub client_id: String,
    /// Client secret, stored as an encryption envelope (see `scope-config-crypto`).
    pub client_secret: String,
    /// Email domains permitted to authenticate against this org.
    pub allowed_domains: Vec<String>,
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex_encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        hex_decode(&s).map_err(serde::de::Error::custom)
    }

    fn hex_encode(bytes: &[u8]) -> String {
        use std::fmt::Write;
        let mut out = String::with_capacity(bytes.len() * 2);
        for b in bytes {
            write!(out, "{b:02x}").expect("writing to a String never fails");
        }
        out
    }

    fn hex_decode(s: &str) -> Result<Vec<u8>, String> {
        if s.len() % 2 != 0 {
            return Err("odd-length hex string".into());
        }
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|e| e.to_string()))
            .collect()
    }
}
