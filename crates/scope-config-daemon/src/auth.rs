// SPDX-License-Identifier: MIT OR Apache-2.0
//! Authentication middleware and the authorization helpers handlers call at
//! the component boundary.
//!
//! Resolving *who* the caller is happens once, here, via
//! [`scope_config_identity::IdentityResolver`]. Deciding *what* they may do
//! with that identity happens in each handler, not here — see §4.8's design
//! note that authorization stays centralized in the component layer instead
//! of spreading permission checks across middleware.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;
use scope_config_error::ScopeConfigError;
use scope_config_identity::Principal;
use std::sync::Arc;

/// Resolves the bearer credential on every request under `/api/v1` and
/// inserts the resulting [`Principal`] as a request extension.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let bearer = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ScopeConfigError::Unauthenticated)?;

    let principal = state.identity.resolve(bearer, Utc::now()).await?;
    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

/// Fetch the [`Principal`] a successful [`auth_middleware`] run attached to
/// the request extensions.
pub fn principal_of(req: &Request) -> Result<&Principal, ApiError> {
    req.extensions()
        .get::<Principal>()
        .ok_or_else(|| ApiError(ScopeConfigError::Unauthenticated))
}

/// Require that `principal` is an admin authorized for `org_id` (a global
/// admin, or an org-scoped admin token whose `org_id` matches).
pub fn require_admin_for_org(principal: &Principal, org_id: &str) -> Result<(), ApiError> {
    match principal {
        Principal::Admin { org_id: scope, .. } if scope.is_none() || scope.as_deref() == Some(org_id) => Ok(()),
        _ => Err(ApiError(ScopeConfigError::PermissionDenied {
            required: "admin:*".to_string(),
        })),
    }
}

/// Require that `principal` is a global admin (no `org_id` scope), for
/// operations that outrank any single org, such as minting further admin
/// tokens.
pub fn require_global_admin(principal: &Principal) -> Result<(), ApiError> {
    match principal {
        Principal::Admin { org_id: None, .. } => Ok(()),
        _ => Err(ApiError(ScopeConfigError::PermissionDenied {
            required: "admin:*".to_string(),
        })),
    }
}

/// Require that `principal` is the team bearer for `org_id`, returning its
/// `team_node_id`.
pub fn require_team_for_org<'a>(principal: &'a Principal, org_id: &str) -> Result<&'a str, ApiError> {
    match principal {
        Principal::Team {
            org_id: p_org,
            team_node_id,
            ..
        } if p_org == org_id => Ok(team_node_id.as_str()),
        _ => Err(ApiError(ScopeConfigError::PermissionDenied {
            required: "config:read".to_string(),
        })),
    }
}
