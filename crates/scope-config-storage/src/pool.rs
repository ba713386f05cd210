//! Pool construction and embedded migrations.

use scope_config_error::ScopeConfigError;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Connect to Postgres with the given pool size.
///
/// The daemon opens two pools against the same database: a larger one for
/// request handling (`pool_size` from `ProcessConfig`, default 20) and a
/// small dedicated one for the background sweeper (default 2) so a burst of
/// concurrent requests can never starve the sweep loop of a connection.
///
/// # Errors
///
/// Returns [`ScopeConfigError::Transient`] if the pool cannot be established.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, ScopeConfigError> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .map_err(|e| ScopeConfigError::Transient {
            reason: format!("failed to connect to database: {e}"),
        })
}

/// Apply embedded migrations. Safe to call on every startup; already-applied
/// migrations are skipped.
///
/// # Errors
///
/// Returns [`ScopeConfigError::Transient`] if a migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<(), ScopeConfigError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| ScopeConfigError::Transient {
            reason: format!("migration failed: {e}"),
        })
}
