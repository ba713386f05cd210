// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! PostgreSQL persistence for the scope-config service.
//!
//! Each module exposes one repository over a shared [`sqlx::PgPool`].
//! Repositories return [`scope_config_error::ScopeConfigError`] rather than
//! [`sqlx::Error`] directly, mapping "no rows" to `NotFound` and everything
//! else to `Transient` so callers never match on driver-level error types.

pub mod audit;
pub mod node;
pub mod org;
pub mod pool;
pub mod policy;
pub mod token;

pub use audit::AuditRepo;
pub use node::{ConfigRepo, NodeRepo};
pub use org::OrgRepo;
pub use policy::PolicyRepo;
pub use pool::{connect, run_migrations};
pub use token::TokenRepo;

use sqlx::PgPool;

/// Map a [`sqlx::Error`] into a [`scope_config_error::ScopeConfigError`].
fn map_db_err(what: &str, err: sqlx::Error) -> scope_config_error::ScopeConfigError {
    match err {
        sqlx::Error::RowNotFound => scope_config_error::ScopeConfigError::not_found(what),
        other => {
            tracing::error!(error = %other, what, "database operation failed");
            scope_config_error::ScopeConfigError::Transient {
                reason: other.to_string(),
            }
        }
    }
}

/// Shared handle bundling all repositories over one pool, handed to
/// `scope-config-daemon`'s application state.
#[derive(Clone)]
pub struct Repos {
    /// Organization repository.
    pub orgs: OrgRepo,
    /// Node tree repository.
    pub nodes: NodeRepo,
    /// Per-node config repository.
    pub configs: ConfigRepo,
    /// Token repository.
    pub tokens: TokenRepo,
    /// Audit event repository.
    pub audit: AuditRepo,
    /// Security policy repository.
    pub policy: PolicyRepo,
}

impl Repos {
    /// Build the repository bundle over a connected pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            orgs: OrgRepo::new(pool.clone()),
            nodes: NodeRepo::new(pool.clone()),
            configs: ConfigRepo::new(pool.clone()),
            tokens: TokenRepo::new(pool.clone()),
            audit: AuditRepo::new(pool.clone()),
            policy: PolicyRepo::new(pool),
        }
    }
}
