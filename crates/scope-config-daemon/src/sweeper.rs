// SPDX-License-Identifier: MIT OR Apache-2.0
//! Background token sweep: periodically revokes expired and inactive tokens
//! across every organization, idempotently and safely across replicas (the
//! row locking lives in `TokenRepo::claim_sweep_candidates`, not here).

use scope_config_audit::{new_event, AuditService};
use scope_config_core::AuditSource;
use scope_config_storage::Repos;
use scope_config_tokens::TokenService;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Tokens revoked per organization per sweep transaction (§5).
const SWEEP_BATCH_SIZE: i64 = 256;

/// Runs [`sweep_once`] on `interval` until the process exits. Intended to be
/// spawned once at startup alongside [`scope_config_tokens::LastUsedCoalescer::spawn_flush_loop`].
pub async fn run(repos: Repos, tokens: Arc<TokenService>, audit: AuditService, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        if let Err(err) = sweep_once(&repos, &tokens, &audit).await {
            warn!(error = %err, "token sweep pass failed");
        }
    }
}

/// One sweep pass: every organization's security policy is fetched fresh so a
/// policy change (tightened `token_expiry_days`, say) takes effect on the
/// next tick without a daemon restart.
async fn sweep_once(
    repos: &Repos,
    tokens: &Arc<TokenService>,
    audit: &AuditService,
) -> Result<(), scope_config_error::ScopeConfigError> {
    let orgs = repos.orgs.list().await?;
    let now = chrono::Utc::now();

    for org in orgs {
        let policy = repos.policy.get(&org.org_id).await?;
        let revoked = tokens.sweep_once(&policy, now, SWEEP_BATCH_SIZE).await?;
        if revoked.is_empty() {
            continue;
        }
        info!(org_id = %org.org_id, count = revoked.len(), "swept tokens");
        for (token_id, reason) in revoked {
            let event = new_event(
                &org.org_id,
                AuditSource::Token,
                "token_revoked",
                "sweeper",
                None,
                format!("token '{token_id}' revoked by sweep ({reason})"),
                serde_json::json!({"token_id": token_id, "reason": reason}),
            );
            if let Err(err) = audit.record(event, None).await {
                warn!(error = %err, %token_id, "failed to record sweep audit event");
            }
        }
    }

    Ok(())
}
