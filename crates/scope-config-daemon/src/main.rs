// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

use anyhow::{Context, Result};
use clap::Parser;
use scope_config_audit::AuditService;
use scope_config_config::ProcessConfig;
use scope_config_daemon::middleware::CorsConfig;
use scope_config_daemon::state::AppState;
use scope_config_daemon::{build_app, sweeper};
use scope_config_identity::{IdentityResolver, SsoKeyring};
use scope_config_storage::{connect, run_migrations, Repos};
use scope_config_tokens::TokenService;
use scope_config_tree::TreeService;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "scope-config-daemon", version, about = "Multi-tenant scope config control plane")]
struct Args {
    /// Bind address.
    #[arg(long, default_value = "0.0.0.0:8088")]
    bind: String,

    /// Optional local-development TOML overlay (non-secret fields only).
    #[arg(long)]
    config_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = ProcessConfig::load(args.config_file.as_deref())
        .map_err(|e| anyhow::anyhow!(e.to_string()))
        .context("load process configuration")?;

    let filter = EnvFilter::new(format!("scope_config={},tower_http=info", config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let pool = connect(&config.database_url, config.pool_size)
        .await
        .context("connect primary pool")?;
    run_migrations(&pool).await.context("run migrations")?;

    let sweeper_pool = connect(&config.database_url, config.sweeper_pool_size)
        .await
        .context("connect sweeper pool")?;

    let repos = Repos::new(pool);
    let sweeper_repos = Repos::new(sweeper_pool);

    let tree = TreeService::new(repos.nodes.clone(), repos.configs.clone()).with_max_depth(config.max_tree_depth);

    let token_service = Arc::new(TokenService::new(repos.tokens.clone(), config.token_pepper.clone()));

    let identity = Arc::new(IdentityResolver::new(
        repos.tokens.clone(),
        SsoKeyring::new(),
        config.token_pepper.clone(),
        config.admin_token.clone(),
    ));

    let audit = AuditService::new(repos.audit.clone());
    let keyring = Arc::new(config.keyring);
    let sensitive_keys = Arc::new(config.sensitive_keys);
    let token_pepper = Arc::new(config.token_pepper.clone());

    let state = Arc::new(AppState {
        repos,
        tree,
        tokens: token_service.clone(),
        identity,
        audit: audit.clone(),
        keyring,
        sensitive_keys,
        token_pepper,
    });

    let coalescer_repo = state.repos.tokens.clone();
    Arc::new(state.tokens.coalescer().clone())
        .spawn_flush_loop(coalescer_repo, std::time::Duration::from_secs(30));

    tokio::spawn(sweeper::run(
        sweeper_repos.clone(),
        token_service,
        audit,
        config.sweep_interval,
    ));

    let cors = CorsConfig {
        allowed_origins: vec!["*".to_string()],
        allowed_methods: vec!["GET".into(), "POST".into(), "PUT".into(), "PATCH".into(), "DELETE".into()],
        allowed_headers: vec!["authorization".into(), "content-type".into(), "x-correlation-id".into()],
    }
    .to_cors_layer();

    let app = build_app(state.clone(), cors);

    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("bind {}", args.bind))?;
    info!(bind = %args.bind, "scope-config-daemon listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await
        .context("serve")
}

/// Waits for Ctrl-C, then flushes the coalesced `last_used_at` buffer one
/// final time before the server stops accepting connections.
async fn shutdown_signal(state: Arc<AppState>) {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received, flushing pending token touches");
    if let Err(err) = state.tokens.coalescer().flush(&state.repos.tokens).await {
        tracing::warn!(error = %err, "failed to flush token touches during shutdown");
    }
}
