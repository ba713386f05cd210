// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
//! HTTP control-plane for the scope-config service: the node tree, token
//! lifecycle, security policy, and audit pipeline exposed as a versioned
//! REST API.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod pagination;
pub mod state;
pub mod sweeper;

use crate::middleware::{request_id_middleware, RequestLogger};
use crate::state::AppState;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post, put};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower::timeout::TimeoutLayer;
use tower_http::cors::CorsLayer;

/// Request deadline enforced on every `/api/v1` route (§5).
pub const REQUEST_DEADLINE: Duration = Duration::from_secs(15);

/// Assembles the full router: `/healthz` unauthenticated, everything else
/// nested under `/api/v1` behind the auth middleware.
pub fn build_app(state: Arc<AppState>, cors: CorsLayer) -> Router {
    let api = Router::new()
        .route("/auth/me", get(handlers::auth_me))
        .route("/admin/orgs", get(handlers::list_orgs).post(handlers::create_org))
        .route("/admin/admin-tokens", post(handlers::create_admin_token))
        .route(
            "/admin/orgs/{org}/nodes",
            get(handlers::list_nodes).post(handlers::create_node),
        )
        .route(
            "/admin/orgs/{org}/nodes/{node}",
            get(handlers::get_node)
                .patch(handlers::update_node)
                .delete(handlers::delete_node),
        )
        .route(
            "/admin/orgs/{org}/nodes/{node}/effective",
            get(handlers::get_effective_config),
        )
        .route("/admin/orgs/{org}/nodes/{node}/raw", get(handlers::get_raw_config))
        .route("/admin/orgs/{org}/nodes/{node}/config", put(handlers::put_node_config))
        .route(
            "/admin/orgs/{org}/teams/{team}/tokens",
            get(handlers::list_tokens).post(handlers::issue_token),
        )
        .route(
            "/admin/orgs/{org}/teams/{team}/tokens/{id}/revoke",
            post(handlers::revoke_token),
        )
        .route("/admin/orgs/{org}/audit", get(handlers::list_audit))
        .route("/admin/orgs/{org}/audit/export", get(handlers::export_audit_csv))
        .route(
            "/admin/orgs/{org}/audit/agent-events",
            post(handlers::ingest_agent_event),
        )
        .route(
            "/admin/orgs/{org}/security-policies",
            get(handlers::get_security_policy).put(handlers::put_security_policy),
        )
        .route("/config/me/effective", get(handlers::get_my_effective_config))
        .route("/config/me/raw", get(handlers::get_my_raw_config))
        .route("/config/me", put(handlers::put_my_config))
        .route_layer(from_fn_with_state(state.clone(), auth::auth_middleware));

    Router::new()
        .route("/healthz", get(handlers::healthz))
        .nest("/api/v1", api)
        .layer(TimeoutLayer::new(REQUEST_DEADLINE))
        .layer(cors)
        .layer(from_fn(RequestLogger::layer))
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}
