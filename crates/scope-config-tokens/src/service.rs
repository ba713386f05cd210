//! Token issuance, resolution, revocation, and the expiry/inactivity sweep.

use crate::hashing::{generate_secret, hash_secret};
use crate::touch::LastUsedCoalescer;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use scope_config_core::{SecurityPolicy, Token};
use scope_config_error::ScopeConfigError;
use scope_config_storage::TokenRepo;
use tracing::instrument;
use uuid::Uuid;

/// Token lifecycle operations over [`scope_config_storage::TokenRepo`].
#[derive(Clone)]
pub struct TokenService {
    repo: TokenRepo,
    pepper: Vec<u8>,
    coalescer: LastUsedCoalescer,
}

impl TokenService {
    /// Build a service over `repo`, hashing with `pepper` (the
    /// `TOKEN_PEPPER` process secret).
    #[must_use]
    pub fn new(repo: TokenRepo, pepper: Vec<u8>) -> Self {
        Self {
            repo,
            pepper,
            coalescer: LastUsedCoalescer::new(),
        }
    }

    /// The coalesced `last_used_at` writer, for wiring a background flush
    /// loop at process startup.
    #[must_use]
    pub fn coalescer(&self) -> &LastUsedCoalescer {
        &self.coalescer
    }

    /// Issue a token scoped to `team_node_id`, returning the stored record
    /// and the plaintext secret (shown to the caller exactly once).
    #[instrument(skip(self), name = "issue_token")]
    pub async fn issue(
        &self,
        org_id: &str,
        team_node_id: &str,
        issued_by: &str,
        now: DateTime<Utc>,
        expiry_days: Option<u32>,
    ) -> Result<(Token, String), ScopeConfigError> {
        let secret = generate_secret();
        let token_hash = hash_secret(&secret, &self.pepper);
        let token = Token {
            token_id: Uuid::new_v4(),
            org_id: org_id.to_string(),
            team_node_id: team_node_id.to_string(),
            token_hash,
            issued_at: now,
            issued_by: issued_by.to_string(),
            last_used_at: None,
            expires_at: expiry_days.map(|d| now + ChronoDuration::days(i64::from(d))),
            revoked_at: None,
            revoked_reason: None,
        };
        self.repo.issue(&token).await?;
        Ok((token, secret))
    }

    /// Resolve a presented plaintext secret to its active [`Token`], and
    /// record a (coalesced) `last_used_at` touch.
    ///
    /// # Errors
    ///
    /// [`ScopeConfigError::Unauthenticated`] if the secret does not hash to
    /// a known, active token.
    #[instrument(skip(self, secret), name = "resolve_token")]
    pub async fn resolve(&self, secret: &str, now: DateTime<Utc>) -> Result<Token, ScopeConfigError> {
        let token_hash = hash_secret(secret, &self.pepper);
        let token = self
            .repo
            .resolve(&token_hash)
            .await
            .map_err(|_| ScopeConfigError::Unauthenticated)?;
        if !token.is_active(now) {
            return Err(ScopeConfigError::Unauthenticated);
        }
        self.coalescer.record(token.token_id, now);
        Ok(token)
    }

    /// Revoke a token immediately, with an operator-supplied reason.
    pub async fn revoke(&self, token_id: Uuid, reason: &str, now: DateTime<Utc>) -> Result<(), ScopeConfigError> {
        self.repo.revoke(token_id, reason, now).await
    }

    /// Every token scoped to a team.
    pub async fn list_for_team(&self, team_node_id: &str) -> Result<Vec<Token>, ScopeConfigError> {
        self.repo.list_for_team(team_node_id).await
    }

    /// Every token issued within an org.
    pub async fn list_for_org(&self, org_id: &str) -> Result<Vec<Token>, ScopeConfigError> {
        self.repo.list_for_org(org_id).await
    }

    /// Run one sweep pass under `policy`'s expiry/inactivity settings,
    /// revoking and returning `(token_id, reason)` pairs for whatever this
    /// replica claimed. Safe to call concurrently from every replica; see
    /// [`scope_config_storage::TokenRepo::claim_sweep_candidates`] for the
    /// row-locking that makes that safe.
    #[instrument(skip(self, policy), name = "sweep_tokens_once")]
    pub async fn sweep_once(&self, policy: &SecurityPolicy, now: DateTime<Utc>, batch_size: i64) -> Result<Vec<(Uuid, &'static str)>, ScopeConfigError> {
        let expiry_cutoff = policy
            .token_expiry_days
            .map_or(DateTime::<Utc>::MIN_UTC, |_| now);
        let inactivity_cutoff = match policy.token_revoke_inactive_days {
            Some(days) => now - ChronoDuration::days(i64::from(days)),
            None => DateTime::<Utc>::MIN_UTC,
        };
        self.repo.claim_sweep_candidates(expiry_cutoff, inactivity_cutoff, batch_size).await
    }
}
