//! Per-org SSO JWT decoding.
//!
//! Grounded on neon's `SwappableJwtAuth`/`JwtAuth::decode` (trying each
//! configured decoding key in turn and returning the first success),
//! adapted from a single process-wide key set to one keyring per org,
//! keyed by `org_id`.

use jsonwebtoken::{decode, Algorithm, DecodingKey, TokenData, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Claims carried by an SSO-issued JWT.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SsoClaims {
    /// Tenant this identity belongs to.
    pub org_id: String,
    /// `"admin"`, `"team"`, or `"viewer"`.
    pub role: String,
    /// Present for `role = "team"`.
    #[serde(default)]
    pub team_node_id: Option<String>,
}

/// The decoding keys configured for a single org's identity provider.
pub struct JwtAuth {
    decoding_keys: Vec<DecodingKey>,
    validation: Validation,
}

impl JwtAuth {
    /// Build an auth set over `decoding_keys`, requiring `RS256` (the
    /// algorithm family SSO identity providers issue) and a valid `exp`.
    #[must_use]
    pub fn new(decoding_keys: Vec<DecodingKey>) -> Self {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_required_spec_claims(&["exp"]);
        Self {
            decoding_keys,
            validation,
        }
    }

    /// Try each configured decoding key in turn; return the first success,
    /// or the last failure if none decode.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`jsonwebtoken::errors::Error`] from the last
    /// attempted key, or a "no keys configured" error if the keyring is empty.
    pub fn decode(&self, token: &str) -> Result<TokenData<SsoClaims>, jsonwebtoken::errors::Error> {
        let mut last = None;
        for key in &self.decoding_keys {
            match decode::<SsoClaims>(token, key, &self.validation) {
                Ok(data) => return Ok(data),
                Err(e) => last = Some(e),
            }
        }
        Err(last.unwrap_or_else(|| {
            jsonwebtoken::errors::ErrorKind::InvalidKeyFormat.into()
        }))
    }
}

/// Per-org SSO decoding keyrings, looked up by `org_id` during bearer
/// resolution. An org with no [`SsoConfig`](scope_config_core::SsoConfig)
/// simply has no entry and SSO decode is skipped for it.
#[derive(Default)]
pub struct SsoKeyring {
    by_org: HashMap<String, JwtAuth>,
}

impl SsoKeyring {
    /// An empty keyring (no org has SSO configured).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the decoding keys for `org_id`.
    pub fn set_org(&mut self, org_id: impl Into<String>, auth: JwtAuth) {
        self.by_org.insert(org_id.into(), auth);
    }

    /// Probe-decode `token` against every configured org's keyring, in
    /// insertion-unordered iteration, returning the first org that accepts
    /// it. A probe-decode is cheap relative to a DB round trip, so this
    /// runs before any lookup fails outright.
    pub fn probe_decode(&self, token: &str) -> Option<SsoClaims> {
        self.by_org
            .values()
            .find_map(|auth| auth.decode(token).ok())
            .map(|data| data.claims)
    }

    /// Decode `token` against exactly the `org_id` keyring, if configured.
    pub fn decode_for_org(&self, org_id: &str, token: &str) -> Option<SsoClaims> {
        self.by_org.get(org_id).and_then(|auth| auth.decode(token).ok().map(|d| d.claims))
    }
}
