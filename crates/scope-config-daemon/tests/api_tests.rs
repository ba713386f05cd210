// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end HTTP tests against a real Postgres instance.
//!
//! Every test connects with `DATABASE_URL` and is skipped (not failed) if
//! that variable is unset, the way a local `cargo test` run with no
//! database configured should behave rather than erroring out.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use scope_config_audit::AuditService;
use scope_config_core::SecurityPolicy;
use scope_config_crypto::EncryptionKeyring;
use scope_config_daemon::state::AppState;
use scope_config_daemon::{build_app, middleware::CorsConfig};
use scope_config_identity::{IdentityResolver, SsoKeyring};
use scope_config_storage::{connect, run_migrations, Repos};
use scope_config_tokens::TokenService;
use scope_config_tree::TreeService;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

const ADMIN_TOKEN: &str = "test-global-admin-token";

/// Builds a fresh `AppState` against `DATABASE_URL`, or `None` if the
/// variable isn't set.
async fn test_state() -> Option<Arc<AppState>> {
    let database_url = std::env::var("DATABASE_URL").ok()?;
    let pool = connect(&database_url, 5).await.expect("connect test pool");
    run_migrations(&pool).await.expect("run migrations");

    let repos = Repos::new(pool);
    let tree = TreeService::new(repos.nodes.clone(), repos.configs.clone());
    let token_pepper = b"test-pepper-0123456789abcdef".to_vec();
    let tokens = Arc::new(TokenService::new(repos.tokens.clone(), token_pepper.clone()));
    let identity = Arc::new(IdentityResolver::new(
        repos.tokens.clone(),
        SsoKeyring::new(),
        token_pepper.clone(),
        Some(ADMIN_TOKEN.to_string()),
    ));
    let audit = AuditService::new(repos.audit.clone());
    let keyring = Arc::new(EncryptionKeyring::new(*b"01234567890123456789012345678901").expect("keyring"));

    Some(Arc::new(AppState {
        repos,
        tree,
        tokens,
        identity,
        audit,
        keyring,
        sensitive_keys: Arc::new(scope_config_crypto::default_sensitive_keys()),
        token_pepper: Arc::new(token_pepper),
    }))
}

fn app(state: Arc<AppState>) -> axum::Router {
    let cors = CorsConfig {
        allowed_origins: vec!["*".to_string()],
        allowed_methods: vec!["GET".into(), "POST".into(), "PUT".into(), "PATCH".into(), "DELETE".into()],
        allowed_headers: vec!["authorization".into(), "content-type".into()],
    };
    build_app(state, cors.to_cors_layer())
}

fn admin_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {ADMIN_TOKEN}"))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(resp: axum::response::Response) -> Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Creates an org with a root node and one child `team` node, returning
/// their ids.
async fn seed_org(app: &axum::Router, org_id: &str) -> (String, String) {
    let resp = app
        .clone()
        .oneshot(admin_request("POST", "/api/v1/admin/orgs", json!({"org_id": org_id})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let root_id = format!("{org_id}-root");
    let resp = app
        .clone()
        .oneshot(admin_request(
            "POST",
            &format!("/api/v1/admin/orgs/{org_id}/nodes"),
            json!({"node_id": root_id, "parent_id": null, "node_type": "org", "name": "root"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let team_id = format!("{org_id}-team");
    let resp = app
        .clone()
        .oneshot(admin_request(
            "POST",
            &format!("/api/v1/admin/orgs/{org_id}/nodes"),
            json!({"node_id": team_id, "parent_id": root_id, "node_type": "team", "name": "team"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    (root_id, team_id)
}

#[tokio::test]
async fn healthz_has_no_auth_requirement() {
    let Some(state) = test_state().await else { return };
    let resp = app(state)
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["status"], "ok");
}

/// Config written at the root is inherited by a descendant node that has no
/// local override, and a local override at the child wins for the keys it
/// sets while leaving inherited keys from the root untouched.
#[tokio::test]
async fn effective_config_inherits_then_overrides() {
    let Some(state) = test_state().await else { return };
    let router = app(state);
    let org_id = format!("org-{}", Uuid::new_v4());
    let (root_id, team_id) = seed_org(&router, &org_id).await;

    let resp = router
        .clone()
        .oneshot(admin_request(
            "PUT",
            &format!("/api/v1/admin/orgs/{org_id}/nodes/{root_id}/config"),
            json!({"timeout_seconds": 30, "retries": 3}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = router
        .clone()
        .oneshot(admin_request(
            "PUT",
            &format!("/api/v1/admin/orgs/{org_id}/nodes/{team_id}/config"),
            json!({"retries": 5}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = router
        .clone()
        .oneshot(admin_request(
            "GET",
            &format!("/api/v1/admin/orgs/{org_id}/nodes/{team_id}/effective"),
            Value::Null,
        ))
        .await
        .unwrap();
    let effective = json_body(resp).await;
    assert_eq!(effective["timeout_seconds"], 30);
    assert_eq!(effective["retries"], 5);
}

/// A `null` value in a config diff deletes the key from the merged result
/// instead of being stored as a literal JSON null.
#[tokio::test]
async fn null_diff_value_deletes_the_key() {
    let Some(state) = test_state().await else { return };
    let router = app(state);
    let org_id = format!("org-{}", Uuid::new_v4());
    let (root_id, _team_id) = seed_org(&router, &org_id).await;

    router
        .clone()
        .oneshot(admin_request(
            "PUT",
            &format!("/api/v1/admin/orgs/{org_id}/nodes/{root_id}/config"),
            json!({"feature_x": true, "feature_y": false}),
        ))
        .await
        .unwrap();

    let resp = router
        .clone()
        .oneshot(admin_request(
            "PUT",
            &format!("/api/v1/admin/orgs/{org_id}/nodes/{root_id}/config"),
            json!({"feature_x": null}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let merged = json_body(resp).await;
    assert!(merged.get("feature_x").is_none());
    assert_eq!(merged["feature_y"], false);
}

/// Moving a node under its own descendant is rejected rather than admitted
/// as a cycle that later corrupts lineage/effective-config traversal.
#[tokio::test]
async fn reparenting_into_a_cycle_is_rejected() {
    let Some(state) = test_state().await else { return };
    let router = app(state);
    let org_id = format!("org-{}", Uuid::new_v4());
    let (root_id, team_id) = seed_org(&router, &org_id).await;

    let resp = router
        .clone()
        .oneshot(admin_request(
            "PATCH",
            &format!("/api/v1/admin/orgs/{org_id}/nodes/{root_id}"),
            json!({"parent_id": team_id}),
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

/// Deleting a node with children is refused rather than silently cascading
/// the whole subtree away.
#[tokio::test]
async fn delete_node_with_children_is_rejected() {
    let Some(state) = test_state().await else { return };
    let router = app(state);
    let org_id = format!("org-{}", Uuid::new_v4());
    let (root_id, _team_id) = seed_org(&router, &org_id).await;

    let resp = router
        .clone()
        .oneshot(admin_request(
            "DELETE",
            &format!("/api/v1/admin/orgs/{org_id}/nodes/{root_id}"),
            Value::Null,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

/// Deleting a leaf team node revokes its active tokens through the audited
/// path before the node itself (and its now-revoked tokens) are removed —
/// a revoked token can never be used again even once its node is gone.
#[tokio::test]
async fn deleting_a_team_node_revokes_its_tokens() {
    let Some(state) = test_state().await else { return };
    let router = app(state);
    let org_id = format!("org-{}", Uuid::new_v4());
    let (_root_id, team_id) = seed_org(&router, &org_id).await;

    let resp = router
        .clone()
        .oneshot(admin_request(
            "POST",
            &format!("/api/v1/admin/orgs/{org_id}/teams/{team_id}/tokens"),
            json!({"expiry_days": 30}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let issued = json_body(resp).await;
    let secret = issued["token"].as_str().unwrap().to_string();

    let resp = router
        .clone()
        .oneshot(admin_request(
            "DELETE",
            &format!("/api/v1/admin/orgs/{org_id}/nodes/{team_id}"),
            Value::Null,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/config/me/effective")
                .header("authorization", format!("Bearer {secret}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

/// A token can be issued, used to read the team's own effective config, and
/// then revoked so that same token no longer authenticates.
#[tokio::test]
async fn token_lifecycle_issue_use_revoke() {
    let Some(state) = test_state().await else { return };
    let router = app(state);
    let org_id = format!("org-{}", Uuid::new_v4());
    let (_root_id, team_id) = seed_org(&router, &org_id).await;

    let resp = router
        .clone()
        .oneshot(admin_request(
            "POST",
            &format!("/api/v1/admin/orgs/{org_id}/teams/{team_id}/tokens"),
            json!({"expiry_days": 30}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let issued = json_body(resp).await;
    let token_id = issued["token_id"].as_str().unwrap().to_string();
    let secret = issued["token"].as_str().unwrap().to_string();

    let resp = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/config/me/effective")
                .header("authorization", format!("Bearer {secret}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = router
        .clone()
        .oneshot(admin_request(
            "POST",
            &format!("/api/v1/admin/orgs/{org_id}/teams/{team_id}/tokens/{token_id}/revoke"),
            json!({"reason": "test"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/config/me/effective")
                .header("authorization", format!("Bearer {secret}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

/// A non-team node (the org root) cannot have a token issued against it.
#[tokio::test]
async fn issuing_a_token_against_a_non_team_node_is_rejected() {
    let Some(state) = test_state().await else { return };
    let router = app(state);
    let org_id = format!("org-{}", Uuid::new_v4());
    let (root_id, _team_id) = seed_org(&router, &org_id).await;

    let resp = router
        .clone()
        .oneshot(admin_request(
            "POST",
            &format!("/api/v1/admin/orgs/{org_id}/teams/{root_id}/tokens"),
            json!({"expiry_days": 30}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

/// Writing to a locked path is rejected with no config mutation and no
/// "applied" audit event, only a policy-violation trail.
#[tokio::test]
async fn locked_path_write_is_rejected() {
    let Some(state) = test_state().await else { return };
    let router = app(state);
    let org_id = format!("org-{}", Uuid::new_v4());
    let (root_id, _team_id) = seed_org(&router, &org_id).await;

    let mut policy = SecurityPolicy::default_for(org_id.clone());
    policy.locked_paths = vec!["secrets".to_string()];
    let resp = router
        .clone()
        .oneshot(admin_request(
            "PUT",
            &format!("/api/v1/admin/orgs/{org_id}/security-policies"),
            serde_json::to_value(&policy).unwrap(),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = router
        .clone()
        .oneshot(admin_request(
            "PUT",
            &format!("/api/v1/admin/orgs/{org_id}/nodes/{root_id}/config"),
            json!({"secrets": {"api_key": "nope"}}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

/// A write gated by `require_approval_for_prompts` comes back `202
/// Accepted` with the offending paths instead of being applied or rejected
/// outright.
#[tokio::test]
async fn prompt_write_requiring_approval_is_pending_not_applied() {
    let Some(state) = test_state().await else { return };
    let router = app(state);
    let org_id = format!("org-{}", Uuid::new_v4());
    let (root_id, _team_id) = seed_org(&router, &org_id).await;

    let mut policy = SecurityPolicy::default_for(org_id.clone());
    policy.require_approval_for_prompts = true;
    router
        .clone()
        .oneshot(admin_request(
            "PUT",
            &format!("/api/v1/admin/orgs/{org_id}/security-policies"),
            serde_json::to_value(&policy).unwrap(),
        ))
        .await
        .unwrap();

    let resp = router
        .clone()
        .oneshot(admin_request(
            "PUT",
            &format!("/api/v1/admin/orgs/{org_id}/nodes/{root_id}/config"),
            json!({"agents": {"writer": {"prompt": {"system": "be nice"}}}}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let body = json_body(resp).await;
    assert_eq!(body["status"], "pending");
    assert!(!body["paths"].as_array().unwrap().is_empty());

    let resp = router
        .clone()
        .oneshot(admin_request(
            "GET",
            &format!("/api/v1/admin/orgs/{org_id}/nodes/{root_id}/effective"),
            Value::Null,
        ))
        .await
        .unwrap();
    let effective = json_body(resp).await;
    assert!(effective.get("agents").is_none());
}
