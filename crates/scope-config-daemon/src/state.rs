// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared application state handed to every handler via [`axum::extract::State`].

use scope_config_audit::AuditService;
use scope_config_crypto::EncryptionKeyring;
use scope_config_identity::IdentityResolver;
use scope_config_storage::Repos;
use scope_config_tokens::TokenService;
use scope_config_tree::TreeService;
use std::sync::Arc;

/// Everything a handler needs, built once at startup in `main.rs` and shared
/// behind an [`Arc`].
#[derive(Clone)]
pub struct AppState {
    /// Raw repositories, for operations with no richer service wrapper
    /// (organizations, security policies).
    pub repos: Repos,
    /// Scope tree operations: node CRUD, lineage, effective config.
    pub tree: TreeService,
    /// Token lifecycle: issuance, resolution, revocation, sweep.
    pub tokens: Arc<TokenService>,
    /// Bearer credential resolution.
    pub identity: Arc<IdentityResolver>,
    /// Audit recording, query, and CSV export.
    pub audit: AuditService,
    /// Active/retired AEAD keys for field-level encryption.
    pub keyring: Arc<EncryptionKeyring>,
    /// The configured sensitive-key set (default or `SENSITIVE_KEYS` override).
    pub sensitive_keys: Arc<Vec<String>>,
    /// HMAC pepper for token hashing, needed by handlers that issue tokens
    /// transactionally rather than through [`TokenService::issue`].
    pub token_pepper: Arc<Vec<u8>>,
}
