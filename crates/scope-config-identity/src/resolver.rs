//! Bearer resolution: the fixed precedence order from env-sourced admin
//! override through to SSO JWT probe-decode.

use crate::jwt::SsoKeyring;
use crate::principal::Principal;
use chrono::{DateTime, Utc};
use scope_config_error::ScopeConfigError;
use scope_config_storage::TokenRepo;
use scope_config_tokens::hashing::hash_secret;
use tracing::instrument;

/// Default permissions granted to a team-scoped token.
const TEAM_PERMISSIONS: &[&str] = &["config:read", "config:write:self"];
/// Default permissions granted to an SSO-mapped viewer identity.
const VIEWER_PERMISSIONS: &[&str] = &["config:read"];

/// Resolves a raw `Authorization: Bearer <token>` value into a [`Principal`],
/// trying each credential kind in the fixed order:
///
/// 1. The env-sourced admin override token (exact match, no hashing).
/// 2. A DB-resident [`scope_config_core::AdminToken`] (peppered HMAC lookup).
/// 3. A team [`scope_config_core::Token`] (peppered HMAC lookup); records a
///    coalesced `last_used_at` touch on success.
/// 4. An SSO JWT, probe-decoded against every configured org's keyring.
/// 5. [`ScopeConfigError::Unauthenticated`].
pub struct IdentityResolver {
    token_repo: TokenRepo,
    sso: SsoKeyring,
    pepper: Vec<u8>,
    admin_override_token: Option<String>,
}

impl IdentityResolver {
    /// Build a resolver. `admin_override_token` is the `ADMIN_TOKEN`
    /// process env var, if set; `pepper` is `TOKEN_PEPPER`.
    #[must_use]
    pub fn new(token_repo: TokenRepo, sso: SsoKeyring, pepper: Vec<u8>, admin_override_token: Option<String>) -> Self {
        Self {
            token_repo,
            sso,
            pepper,
            admin_override_token,
        }
    }

    /// Resolve `bearer` (the raw credential presented by the caller,
    /// without the `Bearer ` prefix) to a [`Principal`].
    #[instrument(skip(self, bearer), name = "resolve_identity")]
    pub async fn resolve(&self, bearer: &str, now: DateTime<Utc>) -> Result<Principal, ScopeConfigError> {
        if let Some(expected) = &self.admin_override_token {
            if !expected.is_empty() && bearer == expected {
                return Ok(Principal::Admin {
                    org_id: None,
                    permissions: vec!["admin:*".to_string()],
                });
            }
        }

        let hash = hash_secret(bearer, &self.pepper);

        if let Ok(admin) = self.token_repo.resolve_admin(&hash).await {
            if admin.is_active() {
                return Ok(Principal::Admin {
                    org_id: admin.org_id,
                    permissions: admin.scopes,
                });
            }
        }

        if let Ok(token) = self.token_repo.resolve(&hash).await {
            if token.is_active(now) {
                self.token_repo.touch_last_used(token.token_id, now).await.ok();
                return Ok(Principal::Team {
                    org_id: token.org_id,
                    team_node_id: token.team_node_id,
                    permissions: TEAM_PERMISSIONS.iter().map(|s| s.to_string()).collect(),
                });
            }
        }

        if let Some(claims) = self.sso.probe_decode(bearer) {
            return Ok(match claims.role.as_str() {
                "admin" => Principal::Admin {
                    org_id: Some(claims.org_id),
                    permissions: vec!["admin:*".to_string()],
                },
                "team" => {
                    let Some(team_node_id) = claims.team_node_id else {
                        return Err(ScopeConfigError::Unauthenticated);
                    };
                    Principal::Team {
                        org_id: claims.org_id,
                        team_node_id,
                        permissions: TEAM_PERMISSIONS.iter().map(|s| s.to_string()).collect(),
                    }
                }
                _ => Principal::Viewer {
                    org_id: claims.org_id,
                    permissions: VIEWER_PERMISSIONS.iter().map(|s| s.to_string()).collect(),
                },
            });
        }

        Err(ScopeConfigError::Unauthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn team_permissions_always_include_read_and_write_self() {
        assert!(TEAM_PERMISSIONS.contains(&"config:read"));
        assert!(TEAM_PERMISSIONS.contains(&"config:write:self"));
    }

    #[test]
    fn viewer_permissions_are_read_only() {
        assert_eq!(VIEWER_PERMISSIONS, &["config:read"]);
    }
}
