// SPDX-License-Identifier: MIT OR Apache-2.0
//! Route handlers. Each binds to exactly one component operation; handlers
//! decode the request, delegate to the owning service, and encode the
//! response — no business logic lives here beyond permission checks and
//! request/response shaping.

use crate::auth::{principal_of, require_admin_for_org, require_global_admin, require_team_for_org};
use crate::error::{ApiError, ApiResult};
use crate::pagination::{Page, PageQuery};
use crate::state::AppState;
use axum::extract::{Path, Query, Request, State};
use axum::http::{header::HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use scope_config_core::{AuditSource, NodeType, SecurityPolicy};
use scope_config_crypto::envelope::looks_like_envelope;
use scope_config_error::ScopeConfigError;
use scope_config_identity::Principal;
use scope_config_storage::AuditFilter;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

const CORRELATION_HEADER: &str = "x-correlation-id";

fn correlation_header(headers: &HeaderMap) -> Option<&str> {
    headers.get(CORRELATION_HEADER).and_then(|v| v.to_str().ok())
}

/// A short identity string recorded as `actor` on audit events and node
/// config writes — not a credential, just a readable trail.
fn actor_of(principal: &Principal) -> String {
    match principal {
        Principal::Admin { org_id: None, .. } => "admin:global".to_string(),
        Principal::Admin { org_id: Some(org), .. } => format!("admin:{org}"),
        Principal::Team { team_node_id, .. } => format!("team:{team_node_id}"),
        Principal::Viewer { .. } => "viewer".to_string(),
    }
}

// ---------------------------------------------------------------------------
// GET /healthz
// ---------------------------------------------------------------------------

/// Liveness probe. No auth, not versioned under `/api/v1`.
pub async fn healthz() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "time": Utc::now().to_rfc3339(),
    }))
}

// ---------------------------------------------------------------------------
// GET /auth/me
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct AuthMeResponse {
    role: &'static str,
    auth_kind: &'static str,
    org_id: Option<String>,
    team_node_id: Option<String>,
    permissions: Vec<String>,
    can_write: bool,
}

pub async fn auth_me(req: Request) -> ApiResult<Json<AuthMeResponse>> {
    let principal = principal_of(&req)?;
    let permissions = match principal {
        Principal::Admin { permissions, .. }
        | Principal::Team { permissions, .. }
        | Principal::Viewer { permissions, .. } => permissions.clone(),
    };
    Ok(Json(AuthMeResponse {
        role: principal.role(),
        auth_kind: principal.auth_kind(),
        org_id: principal.org_id().map(str::to_string),
        team_node_id: principal.team_node_id().map(str::to_string),
        can_write: matches!(principal, Principal::Admin { .. }) || principal.team_node_id().is_some(),
        permissions,
    }))
}

// ---------------------------------------------------------------------------
// /admin/orgs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateOrgRequest {
    pub org_id: String,
}

/// Not a §6 route, but a necessary counterpart to `OrgRepo::{create,list}`:
/// every org referenced by the node/token/audit routes must exist first.
pub async fn list_orgs(State(state): State<Arc<AppState>>, req: Request) -> ApiResult<impl IntoResponse> {
    let principal = principal_of(&req)?;
    if !matches!(principal, Principal::Admin { .. }) {
        return Err(ApiError(ScopeConfigError::PermissionDenied {
            required: "admin:*".to_string(),
        }));
    }
    let orgs = state.repos.orgs.list().await?;
    Ok(Json(orgs))
}

pub async fn create_org(
    State(state): State<Arc<AppState>>,
    req: Request,
    Json(body): Json<CreateOrgRequest>,
) -> ApiResult<impl IntoResponse> {
    let principal = principal_of(&req)?;
    if !matches!(principal, Principal::Admin { org_id: None, .. }) {
        return Err(ApiError(ScopeConfigError::PermissionDenied {
            required: "admin:*".to_string(),
        }));
    }
    let org = state.repos.orgs.create(&body.org_id, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(org)))
}

// ---------------------------------------------------------------------------
// /admin/orgs/{org}/nodes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateNodeRequest {
    pub node_id: String,
    pub parent_id: Option<String>,
    pub node_type: NodeType,
    pub name: String,
}

pub async fn list_nodes(
    State(state): State<Arc<AppState>>,
    Path(org): Path<String>,
    req: Request,
) -> ApiResult<impl IntoResponse> {
    let principal = principal_of(&req)?;
    require_admin_for_org(principal, &org)?;
    let nodes = state.tree.list_nodes(&org).await?;
    let total = nodes.len() as i64;
    Ok(Json(Page::items(nodes, total, total.max(1), 0)))
}

pub async fn create_node(
    State(state): State<Arc<AppState>>,
    Path(org): Path<String>,
    req: Request,
    Json(body): Json<CreateNodeRequest>,
) -> ApiResult<impl IntoResponse> {
    let principal = principal_of(&req)?;
    require_admin_for_org(principal, &org)?;

    let existing = state.tree.list_nodes(&org).await.unwrap_or_default();
    match (body.parent_id.as_deref(), body.node_type) {
        (None, NodeType::Org) if existing.iter().any(|n| n.is_root()) => {
            return Err(ApiError(ScopeConfigError::invalid_input(
                "organization already has a root node",
            )));
        }
        (None, other) if other != NodeType::Org => {
            return Err(ApiError(ScopeConfigError::invalid_input(
                "a node with no parent must be node_type 'org'",
            )));
        }
        (Some(_), NodeType::Org) => {
            return Err(ApiError(ScopeConfigError::invalid_input(
                "only the org root may have node_type 'org'",
            )));
        }
        _ => {}
    }

    let now = Utc::now();
    let actor = actor_of(principal);
    let node = state
        .tree
        .create_node(&org, &body.node_id, body.parent_id.as_deref(), body.node_type, &body.name, now, &actor)
        .await?;

    let event = scope_config_audit::new_event(
        &org,
        AuditSource::Config,
        "node_created",
        &actor,
        Some(node.node_id.clone()),
        format!("created node '{}'", node.node_id),
        serde_json::json!({"node_id": node.node_id, "node_type": node.node_type, "parent_id": node.parent_id}),
    );
    state.audit.record(event, None).await.ok();

    Ok((StatusCode::CREATED, Json(node)))
}

pub async fn get_node(
    State(state): State<Arc<AppState>>,
    Path((org, node)): Path<(String, String)>,
    req: Request,
) -> ApiResult<impl IntoResponse> {
    let principal = principal_of(&req)?;
    require_admin_for_org(principal, &org)?;
    let record = state.repos.nodes.get(&org, &node).await?;
    Ok(Json(record))
}

#[derive(Debug, Deserialize)]
pub struct UpdateNodeRequest {
    pub name: Option<String>,
    pub parent_id: Option<String>,
}

pub async fn update_node(
    State(state): State<Arc<AppState>>,
    Path((org, node)): Path<(String, String)>,
    req: Request,
    Json(body): Json<UpdateNodeRequest>,
) -> ApiResult<impl IntoResponse> {
    let principal = principal_of(&req)?;
    require_admin_for_org(principal, &org)?;
    let now = Utc::now();
    state
        .tree
        .update_node(&org, &node, body.name.as_deref(), body.parent_id.as_deref(), now)
        .await?;

    let event = scope_config_audit::new_event(
        &org,
        AuditSource::Config,
        "node_updated",
        actor_of(principal),
        Some(node.clone()),
        format!("updated node '{node}'"),
        serde_json::json!({"name": body.name, "parent_id": body.parent_id}),
    );
    state.audit.record(event, None).await.ok();

    let updated = state.repos.nodes.get(&org, &node).await?;
    Ok(Json(updated))
}

pub async fn delete_node(
    State(state): State<Arc<AppState>>,
    Path((org, node)): Path<(String, String)>,
    req: Request,
) -> ApiResult<impl IntoResponse> {
    let principal = principal_of(&req)?;
    require_admin_for_org(principal, &org)?;
    let actor = actor_of(principal);
    let now = Utc::now();

    let target = state.repos.nodes.get(&org, &node).await?;
    if target.node_type.is_team() {
        let active: Vec<_> = state
            .repos
            .tokens
            .list_for_team(&node)
            .await?
            .into_iter()
            .filter(|t| t.revoked_at.is_none())
            .collect();
        if !active.is_empty() {
            let mut tx = state
                .repos
                .tokens
                .pool()
                .begin()
                .await
                .map_err(|e| ScopeConfigError::Transient { reason: e.to_string() })?;
            for token in &active {
                scope_config_storage::TokenRepo::revoke_tx(&mut tx, token.token_id, "team_node_deleted", now).await?;
                let mut event = scope_config_audit::new_event(
                    &org,
                    AuditSource::Token,
                    "token_revoked",
                    &actor,
                    Some(node.clone()),
                    format!("revoked token '{}' (team node deleted)", token.token_id),
                    serde_json::json!({"token_id": token.token_id, "reason": "team_node_deleted"}),
                );
                event.correlation_id = Some(scope_config_audit::resolve_correlation_id(correlation_header(req.headers())));
                scope_config_storage::AuditRepo::insert_tx(&mut tx, &event).await?;
            }
            tx.commit().await.map_err(|e| ScopeConfigError::Transient { reason: e.to_string() })?;
        }
    }

    state.tree.delete_node(&org, &node).await?;

    let event = scope_config_audit::new_event(
        &org,
        AuditSource::Config,
        "node_deleted",
        actor_of(principal),
        Some(node.clone()),
        format!("deleted node '{node}'"),
        serde_json::json!({}),
    );
    state.audit.record(event, None).await.ok();

    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_effective_config(
    State(state): State<Arc<AppState>>,
    Path((org, node)): Path<(String, String)>,
    req: Request,
) -> ApiResult<impl IntoResponse> {
    let principal = principal_of(&req)?;
    require_admin_for_org(principal, &org)?;
    let effective = state.tree.effective_config(&org, &node, &state.keyring).await?;
    Ok(Json(effective))
}

fn redact_subtree(value: &Value) -> Value {
    match value {
        Value::String(s) if looks_like_envelope(s) => Value::String("[redacted]".to_string()),
        Value::Object(map) => Value::Object(map.iter().map(|(k, v)| (k.clone(), redact_subtree(v))).collect()),
        Value::Array(items) => Value::Array(items.iter().map(redact_subtree).collect()),
        other => other.clone(),
    }
}

pub async fn get_raw_config(
    State(state): State<Arc<AppState>>,
    Path((org, node)): Path<(String, String)>,
    req: Request,
) -> ApiResult<impl IntoResponse> {
    let principal = principal_of(&req)?;
    require_admin_for_org(principal, &org)?;
    let record = state.tree.raw_config(&org, &node).await?;

    let config = if principal.has_permission("admin:*") {
        scope_config_crypto::decrypt_subtree(&record.config, &state.keyring)?
    } else {
        redact_subtree(&record.config)
    };

    Ok(Json(serde_json::json!({
        "org_id": record.org_id,
        "node_id": record.node_id,
        "config": config,
        "updated_at": record.updated_at,
        "updated_by": record.updated_by,
    })))
}

#[derive(Debug, Serialize)]
struct PendingResponse {
    status: &'static str,
    paths: Vec<String>,
}

pub async fn put_node_config(
    State(state): State<Arc<AppState>>,
    Path((org, node)): Path<(String, String)>,
    headers: HeaderMap,
    req_parts: Request,
    Json(diff): Json<Value>,
) -> ApiResult<axum::response::Response> {
    let principal = principal_of(&req_parts)?;
    require_admin_for_org(principal, &org)?;
    apply_config_write(&state, &org, &node, principal, &diff, &headers).await
}

async fn apply_config_write(
    state: &Arc<AppState>,
    org: &str,
    node: &str,
    principal: &Principal,
    diff: &Value,
    headers: &HeaderMap,
) -> ApiResult<axum::response::Response> {
    let policy = state.repos.policy.get(org).await?;
    let engine = scope_config_policy::PolicyEngine::new(&policy)?;
    match engine.evaluate(diff)? {
        scope_config_policy::PolicyOutcome::Pending { paths } => {
            let event = scope_config_audit::new_event(
                org,
                AuditSource::Config,
                "config_write_pending",
                actor_of(principal),
                Some(node.to_string()),
                format!("config write to '{node}' queued for approval"),
                serde_json::json!({"paths": paths}),
            );
            state.audit.record(event, correlation_header(headers)).await.ok();
            return Ok((
                StatusCode::ACCEPTED,
                Json(PendingResponse { status: "pending", paths }),
            )
                .into_response());
        }
        scope_config_policy::PolicyOutcome::Apply => {}
    }

    let current = state.tree.raw_config(org, node).await?;
    let decrypted = scope_config_crypto::decrypt_subtree(&current.config, &state.keyring)?;
    let merged = scope_config_tree::merge(decrypted, diff.clone());
    let encrypted = scope_config_crypto::encrypt_subtree(&merged, &state.sensitive_keys, &state.keyring)?;

    let now = Utc::now();
    let actor = actor_of(principal);
    let mut event = scope_config_audit::new_event(
        org,
        AuditSource::Config,
        "config_written",
        &actor,
        Some(node.to_string()),
        format!("config written to '{node}'"),
        serde_json::json!({"diff": diff}),
    );
    event.correlation_id = Some(scope_config_audit::resolve_correlation_id(correlation_header(headers)));

    // The config write and its audit row commit atomically: a crash between
    // the two must roll both back rather than leave an unaudited change.
    let pool = state.repos.configs.pool();
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| ScopeConfigError::Transient { reason: e.to_string() })?;
    scope_config_storage::ConfigRepo::put_tx(&mut tx, org, node, &encrypted, now, &actor).await?;
    scope_config_storage::AuditRepo::insert_tx(&mut tx, &event).await?;
    tx.commit()
        .await
        .map_err(|e| ScopeConfigError::Transient { reason: e.to_string() })?;

    Ok(Json(merged).into_response())
}

// ---------------------------------------------------------------------------
// /admin/orgs/{org}/teams/{team}/tokens
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct IssueTokenRequest {
    pub expiry_days: Option<u32>,
}

#[derive(Debug, Serialize)]
struct IssueTokenResponse {
    token_id: Uuid,
    token: String,
}

#[derive(Debug, Serialize)]
struct TokenSummary {
    token_id: Uuid,
    org_id: String,
    team_node_id: String,
    issued_at: DateTime<Utc>,
    issued_by: String,
    last_used_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    revoked_at: Option<DateTime<Utc>>,
    revoked_reason: Option<String>,
}

impl From<scope_config_core::Token> for TokenSummary {
    fn from(t: scope_config_core::Token) -> Self {
        Self {
            token_id: t.token_id,
            org_id: t.org_id,
            team_node_id: t.team_node_id,
            issued_at: t.issued_at,
            issued_by: t.issued_by,
            last_used_at: t.last_used_at,
            expires_at: t.expires_at,
            revoked_at: t.revoked_at,
            revoked_reason: t.revoked_reason,
        }
    }
}

pub async fn list_tokens(
    State(state): State<Arc<AppState>>,
    Path((org, team)): Path<(String, String)>,
    req: Request,
) -> ApiResult<impl IntoResponse> {
    let principal = principal_of(&req)?;
    require_admin_for_org(principal, &org)?;
    let tokens = state.tokens.list_for_team(&team).await?;
    let total = tokens.len() as i64;
    let summaries: Vec<TokenSummary> = tokens.into_iter().map(Into::into).collect();
    Ok(Json(Page::items(summaries, total, total.max(1), 0)))
}

pub async fn issue_token(
    State(state): State<Arc<AppState>>,
    Path((org, team)): Path<(String, String)>,
    req: Request,
    Json(body): Json<IssueTokenRequest>,
) -> ApiResult<impl IntoResponse> {
    let principal = principal_of(&req)?;
    require_admin_for_org(principal, &org)?;
    let target = state.repos.nodes.get(&org, &team).await?;
    if !target.node_type.is_team() {
        return Err(ScopeConfigError::invalid_input(format!(
            "node '{team}' is not a team; tokens may only be issued against team nodes"
        ))
        .into());
    }
    let actor = actor_of(principal);
    let now = Utc::now();

    let secret = scope_config_tokens::generate_secret();
    let token = scope_config_core::Token {
        token_id: Uuid::new_v4(),
        org_id: org.clone(),
        team_node_id: team.clone(),
        token_hash: scope_config_tokens::hash_secret(&secret, &state.token_pepper),
        issued_at: now,
        issued_by: actor.clone(),
        last_used_at: None,
        expires_at: body
            .expiry_days
            .map(|d| now + chrono::Duration::days(i64::from(d))),
        revoked_at: None,
        revoked_reason: None,
    };

    let mut event = scope_config_audit::new_event(
        &org,
        AuditSource::Token,
        "token_issued",
        &actor,
        Some(team.clone()),
        format!("issued token for team '{team}'"),
        serde_json::json!({"token_id": token.token_id}),
    );
    event.correlation_id = Some(scope_config_audit::resolve_correlation_id(correlation_header(req.headers())));

    let mut tx = state
        .repos
        .tokens
        .pool()
        .begin()
        .await
        .map_err(|e| ScopeConfigError::Transient { reason: e.to_string() })?;
    scope_config_storage::TokenRepo::issue_tx(&mut tx, &token).await?;
    scope_config_storage::AuditRepo::insert_tx(&mut tx, &event).await?;
    tx.commit()
        .await
        .map_err(|e| ScopeConfigError::Transient { reason: e.to_string() })?;

    Ok((
        StatusCode::CREATED,
        Json(IssueTokenResponse {
            token_id: token.token_id,
            token: secret,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct RevokeTokenRequest {
    pub reason: Option<String>,
}

pub async fn revoke_token(
    State(state): State<Arc<AppState>>,
    Path((org, _team, token_id)): Path<(String, String, Uuid)>,
    req: Request,
    Json(body): Json<RevokeTokenRequest>,
) -> ApiResult<impl IntoResponse> {
    let principal = principal_of(&req)?;
    require_admin_for_org(principal, &org)?;
    let reason = body.reason.unwrap_or_else(|| "operator_revoked".to_string());
    let now = Utc::now();

    let mut event = scope_config_audit::new_event(
        &org,
        AuditSource::Token,
        "token_revoked",
        actor_of(principal),
        None,
        format!("revoked token '{token_id}'"),
        serde_json::json!({"token_id": token_id, "reason": reason}),
    );
    event.correlation_id = Some(scope_config_audit::resolve_correlation_id(correlation_header(req.headers())));

    let mut tx = state
        .repos
        .tokens
        .pool()
        .begin()
        .await
        .map_err(|e| ScopeConfigError::Transient { reason: e.to_string() })?;
    scope_config_storage::TokenRepo::revoke_tx(&mut tx, token_id, &reason, now).await?;
    scope_config_storage::AuditRepo::insert_tx(&mut tx, &event).await?;
    tx.commit()
        .await
        .map_err(|e| ScopeConfigError::Transient { reason: e.to_string() })?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct CreateAdminTokenRequest {
    /// `None` mints a global admin token spanning every org.
    pub org_id: Option<String>,
    /// Dotted permission strings to grant (e.g. `["admin:*"]`).
    pub scopes: Vec<String>,
}

#[derive(Debug, Serialize)]
struct CreateAdminTokenResponse {
    token_id: Uuid,
    token: String,
}

/// Mint a new admin token. Restricted to existing global admins — an
/// org-scoped admin cannot mint further admin tokens, even for its own org.
pub async fn create_admin_token(
    State(state): State<Arc<AppState>>,
    req: Request,
    Json(body): Json<CreateAdminTokenRequest>,
) -> ApiResult<impl IntoResponse> {
    let principal = principal_of(&req)?;
    require_global_admin(principal)?;
    let actor = actor_of(principal);
    let now = Utc::now();

    let secret = scope_config_tokens::generate_secret();
    let token = scope_config_core::AdminToken {
        token_id: Uuid::new_v4(),
        org_id: body.org_id.clone(),
        token_hash: scope_config_tokens::hash_secret(&secret, &state.token_pepper),
        scopes: body.scopes,
        issued_at: now,
        revoked_at: None,
    };
    state.repos.tokens.create_admin(&token, &actor).await?;

    let org_label = token.org_id.clone().unwrap_or_else(|| "global".to_string());
    let mut event = scope_config_audit::new_event(
        &org_label,
        AuditSource::Token,
        "admin_token_created",
        &actor,
        None,
        format!("created admin token '{}'", token.token_id),
        serde_json::json!({"token_id": token.token_id, "org_id": token.org_id, "scopes": token.scopes}),
    );
    event.correlation_id = Some(scope_config_audit::resolve_correlation_id(correlation_header(req.headers())));
    state.audit.record(event, None).await.ok();

    Ok((
        StatusCode::CREATED,
        Json(CreateAdminTokenResponse {
            token_id: token.token_id,
            token: secret,
        }),
    ))
}

// ---------------------------------------------------------------------------
// /admin/orgs/{org}/audit
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub source: Option<String>,
    pub team_node_id: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub correlation_id: Option<String>,
    pub search: Option<String>,
    #[serde(flatten)]
    pub page: PageQuery,
}

fn parse_source(s: &str) -> ApiResult<AuditSource> {
    match s {
        "token" => Ok(AuditSource::Token),
        "config" => Ok(AuditSource::Config),
        "agent" => Ok(AuditSource::Agent),
        other => Err(ApiError(ScopeConfigError::invalid_input(format!(
            "unknown audit source '{other}'"
        )))),
    }
}

pub async fn list_audit(
    State(state): State<Arc<AppState>>,
    Path(org): Path<String>,
    Query(q): Query<AuditQuery>,
    req: Request,
) -> ApiResult<impl IntoResponse> {
    let principal = principal_of(&req)?;
    require_admin_for_org(principal, &org)?;

    let filter = AuditFilter {
        source: q.source.as_deref().map(parse_source).transpose()?,
        team_node_id: q.team_node_id,
        since: q.since,
        until: q.until,
        correlation_id: q.correlation_id,
        search: q.search,
    };
    let (limit, offset) = q.page.resolved();
    let (events, total) = state.audit.query(&org, &filter, limit, offset).await?;
    Ok(Json(Page::events(events, total, limit, offset)))
}

pub async fn export_audit_csv(
    State(state): State<Arc<AppState>>,
    Path(org): Path<String>,
    Query(q): Query<AuditQuery>,
    req: Request,
) -> ApiResult<impl IntoResponse> {
    let principal = principal_of(&req)?;
    require_admin_for_org(principal, &org)?;

    let filter = AuditFilter {
        source: q.source.as_deref().map(parse_source).transpose()?,
        team_node_id: q.team_node_id,
        since: q.since,
        until: q.until,
        correlation_id: q.correlation_id,
        search: q.search,
    };

    let mut buf = Vec::new();
    state.audit.export_csv(&org, &filter, &mut buf).await?;

    Ok((
        [
            ("content-type", "text/csv"),
            ("content-disposition", "attachment; filename=\"audit.csv\""),
        ],
        buf,
    ))
}

#[derive(Debug, Deserialize)]
pub struct IngestAgentEventRequest {
    pub event_type: String,
    pub team_node_id: Option<String>,
    pub summary: String,
    #[serde(default)]
    pub details: Value,
}

/// `POST /admin/orgs/{org}/audit/agent-events` — orchestrator-sourced `agent`
/// events, ingested through a dedicated endpoint rather than the generic
/// write path since their origin is outside this service.
pub async fn ingest_agent_event(
    State(state): State<Arc<AppState>>,
    Path(org): Path<String>,
    headers: HeaderMap,
    req: Request,
    Json(body): Json<IngestAgentEventRequest>,
) -> ApiResult<impl IntoResponse> {
    let principal = principal_of(&req)?;
    require_admin_for_org(principal, &org)?;

    let event = scope_config_audit::new_event(
        &org,
        AuditSource::Agent,
        body.event_type,
        actor_of(principal),
        body.team_node_id,
        body.summary,
        body.details,
    );
    let recorded = state.audit.record(event, correlation_header(&headers)).await?;
    Ok((StatusCode::CREATED, Json(recorded)))
}

// ---------------------------------------------------------------------------
// /admin/orgs/{org}/security-policies
// ---------------------------------------------------------------------------

pub async fn get_security_policy(
    State(state): State<Arc<AppState>>,
    Path(org): Path<String>,
    req: Request,
) -> ApiResult<impl IntoResponse> {
    let principal = principal_of(&req)?;
    require_admin_for_org(principal, &org)?;
    let policy = state.repos.policy.get(&org).await?;
    Ok(Json(policy))
}

pub async fn put_security_policy(
    State(state): State<Arc<AppState>>,
    Path(org): Path<String>,
    req: Request,
    Json(mut policy): Json<SecurityPolicy>,
) -> ApiResult<impl IntoResponse> {
    let principal = principal_of(&req)?;
    require_admin_for_org(principal, &org)?;
    policy.org_id = org.clone();
    // Validate the policy compiles (locked-path globs, approval patterns)
    // before persisting a policy no write could ever satisfy.
    scope_config_policy::PolicyEngine::new(&policy)?;
    state.repos.policy.put(&policy, Utc::now()).await?;

    let event = scope_config_audit::new_event(
        &org,
        AuditSource::Config,
        "security_policy_updated",
        actor_of(principal),
        None,
        "security policy replaced",
        serde_json::json!({}),
    );
    state.audit.record(event, None).await.ok();

    Ok(Json(policy))
}

// ---------------------------------------------------------------------------
// /config/me/*
// ---------------------------------------------------------------------------

pub async fn get_my_effective_config(
    State(state): State<Arc<AppState>>,
    req: Request,
) -> ApiResult<impl IntoResponse> {
    let principal = principal_of(&req)?;
    let org = principal
        .org_id()
        .ok_or(ScopeConfigError::Unauthenticated)?
        .to_string();
    let team_node_id = require_team_for_org(principal, &org)?.to_string();
    let effective = state.tree.effective_config(&org, &team_node_id, &state.keyring).await?;
    Ok(Json(effective))
}

pub async fn get_my_raw_config(
    State(state): State<Arc<AppState>>,
    req: Request,
) -> ApiResult<impl IntoResponse> {
    let principal = principal_of(&req)?;
    let org = principal
        .org_id()
        .ok_or(ScopeConfigError::Unauthenticated)?
        .to_string();
    let team_node_id = require_team_for_org(principal, &org)?.to_string();

    let record = state.tree.raw_config(&org, &team_node_id).await?;
    let config = scope_config_crypto::decrypt_subtree(&record.config, &state.keyring)?;
    let lineage = state.tree.lineage(&org, &team_node_id).await?;

    Ok(Json(serde_json::json!({
        "org_id": record.org_id,
        "node_id": record.node_id,
        "config": config,
        "updated_at": record.updated_at,
        "updated_by": record.updated_by,
        "lineage": lineage,
    })))
}

pub async fn put_my_config(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    req: Request,
    Json(diff): Json<Value>,
) -> ApiResult<axum::response::Response> {
    let principal = principal_of(&req)?.clone();
    let org = principal
        .org_id()
        .ok_or(ScopeConfigError::Unauthenticated)?
        .to_string();
    let team_node_id = require_team_for_org(&principal, &org)?.to_string();
    apply_config_write(&state, &org, &team_node_id, &principal, &diff, &headers).await
}
