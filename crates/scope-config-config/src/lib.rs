// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-wide configuration, loaded once at startup from environment
//! variables with an optional TOML file layered underneath for local
//! development. Every other crate receives its piece of this struct through
//! explicit constructor parameters rather than reading the environment
//! itself.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use base64::Engine;
use chrono::Utc;
use scope_config_crypto::{default_sensitive_keys, key_id_for, EncryptionKey, EncryptionKeyring};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 300;
const DEFAULT_MAX_TREE_DEPTH: usize = 32;
const DEFAULT_POOL_SIZE: u32 = 20;
const DEFAULT_SWEEPER_POOL_SIZE: u32 = 2;
const DEFAULT_LOG_LEVEL: &str = "info";

/// Errors that can occur while assembling [`ProcessConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable was not set.
    #[error("missing required environment variable: {var}")]
    MissingRequired {
        /// Name of the missing variable.
        var: String,
    },
    /// An environment variable was set but failed validation.
    #[error("invalid value for {var}: {reason}")]
    Invalid {
        /// Name of the offending variable.
        var: String,
        /// Human-readable reason.
        reason: String,
    },
    /// The optional TOML overlay file could not be read or parsed.
    #[error("failed to load config file: {reason}")]
    FileError {
        /// Human-readable detail.
        reason: String,
    },
}

/// Non-secret fields `ProcessConfig` will accept from a local-development
/// TOML file. Secrets (`TOKEN_PEPPER`, `ENCRYPTION_KEY`, `ADMIN_TOKEN`) are
/// never read from this file; environment variables always win over it.
#[derive(Debug, Clone, Default, Deserialize)]
struct FileOverlay {
    log_level: Option<String>,
    sweep_interval_seconds: Option<u64>,
    max_tree_depth: Option<usize>,
    pool_size: Option<u32>,
    sweeper_pool_size: Option<u32>,
    sensitive_keys: Option<Vec<String>>,
}

/// Validated, process-wide runtime configuration. Built once at startup via
/// [`ProcessConfig::from_env`] or [`ProcessConfig::load`].
pub struct ProcessConfig {
    /// Primary store connection string (`DATABASE_URL`).
    pub database_url: String,
    /// HMAC pepper for token hashing (`TOKEN_PEPPER`), at least 32 bytes.
    pub token_pepper: Vec<u8>,
    /// Active + retired AEAD keyring (`ENCRYPTION_KEY` / `ENCRYPTION_KEYS_RETIRED`).
    pub keyring: EncryptionKeyring,
    /// Optional break-glass admin token (`ADMIN_TOKEN`).
    pub admin_token: Option<String>,
    /// Sensitive-key override set (`SENSITIVE_KEYS`), or the crypto crate's default.
    pub sensitive_keys: Vec<String>,
    /// Background sweeper cadence (`SWEEP_INTERVAL_SECONDS`, default 300s).
    pub sweep_interval: Duration,
    /// Scope tree ancestry depth guard (`MAX_TREE_DEPTH`, default 32).
    pub max_tree_depth: usize,
    /// Diagnostics verbosity (`LOG_LEVEL`, default `"info"`).
    pub log_level: String,
    /// Primary connection pool size (default 20).
    pub pool_size: u32,
    /// Dedicated sweeper connection pool size (default 2).
    pub sweeper_pool_size: u32,
}

impl ProcessConfig {
    /// Load configuration from environment variables only.
    ///
    /// # Errors
    /// [`ConfigError::MissingRequired`] if `DATABASE_URL`, `TOKEN_PEPPER`, or
    /// `ENCRYPTION_KEY` is unset; [`ConfigError::Invalid`] if the pepper is
    /// under 32 bytes or key material is not valid base64-encoded 32 bytes.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Load configuration from environment variables, optionally layering a
    /// local-development TOML file underneath for the non-secret fields.
    /// Environment variables always take precedence over the file.
    pub fn load(toml_path: Option<&Path>) -> Result<Self, ConfigError> {
        let overlay = load_overlay(toml_path)?;

        let database_url = require_env("DATABASE_URL")?;

        let pepper = require_env("TOKEN_PEPPER")?;
        let token_pepper = pepper.into_bytes();
        if token_pepper.len() < 32 {
            return Err(ConfigError::Invalid {
                var: "TOKEN_PEPPER".into(),
                reason: "must be at least 32 bytes".into(),
            });
        }

        let keyring = build_keyring()?;

        let admin_token = non_empty_env("ADMIN_TOKEN");

        let sensitive_keys = env_csv("SENSITIVE_KEYS")
            .or(overlay.sensitive_keys)
            .unwrap_or_else(default_sensitive_keys);

        let sweep_interval_seconds = env_u64("SWEEP_INTERVAL_SECONDS")?
            .or(overlay.sweep_interval_seconds)
            .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECONDS);

        let max_tree_depth = env_usize("MAX_TREE_DEPTH")?
            .or(overlay.max_tree_depth)
            .unwrap_or(DEFAULT_MAX_TREE_DEPTH);

        let log_level = non_empty_env("LOG_LEVEL")
            .or(overlay.log_level)
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

        let pool_size = overlay.pool_size.unwrap_or(DEFAULT_POOL_SIZE);
        let sweeper_pool_size = overlay.sweeper_pool_size.unwrap_or(DEFAULT_SWEEPER_POOL_SIZE);

        Ok(Self {
            database_url,
            token_pepper,
            keyring,
            admin_token,
            sensitive_keys,
            sweep_interval: Duration::from_secs(sweep_interval_seconds),
            max_tree_depth,
            log_level,
            pool_size,
            sweeper_pool_size,
        })
    }
}

fn load_overlay(toml_path: Option<&Path>) -> Result<FileOverlay, ConfigError> {
    let Some(path) = toml_path else {
        return Ok(FileOverlay::default());
    };
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileError {
        reason: format!("reading {}: {e}", path.display()),
    })?;
    toml::from_str(&content).map_err(|e| ConfigError::FileError { reason: e.to_string() })
}

/// Build the active/retired keyring from `ENCRYPTION_KEY` and
/// `ENCRYPTION_KEYS_RETIRED`. Key ids are derived deterministically from the
/// key material itself ([`key_id_for`]) rather than minted at random, so the
/// same env value maps to the same id across process restarts and envelopes
/// written before a restart stay decryptable.
fn build_keyring() -> Result<EncryptionKeyring, ConfigError> {
    let active_material = decode_key("ENCRYPTION_KEY", &require_env("ENCRYPTION_KEY")?)?;
    let active_id = key_id_for(&active_material);
    let now = Utc::now();

    let mut keys = vec![EncryptionKey {
        key_id: active_id.clone(),
        material: active_material,
        created_at: now,
        retired_at: None,
    }];

    for entry in env_csv("ENCRYPTION_KEYS_RETIRED").into_iter().flatten() {
        let material = decode_key("ENCRYPTION_KEYS_RETIRED", &entry)?;
        let key_id = key_id_for(&material);
        if key_id == active_id {
            continue;
        }
        keys.push(EncryptionKey {
            key_id,
            material,
            created_at: now,
            retired_at: Some(now),
        });
    }

    EncryptionKeyring::from_keys(active_id, keys).map_err(|e| ConfigError::Invalid {
        var: "ENCRYPTION_KEY".into(),
        reason: e.to_string(),
    })
}

fn require_env(var: &str) -> Result<String, ConfigError> {
    std::env::var(var).map_err(|_| ConfigError::MissingRequired { var: var.to_string() })
}

fn non_empty_env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.is_empty())
}

fn env_csv(var: &str) -> Option<Vec<String>> {
    non_empty_env(var).map(|v| v.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect())
}

fn env_u64(var: &str) -> Result<Option<u64>, ConfigError> {
    match non_empty_env(var) {
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { var: var.to_string(), reason: "must be a positive integer".into() }),
        None => Ok(None),
    }
}

fn env_usize(var: &str) -> Result<Option<usize>, ConfigError> {
    match non_empty_env(var) {
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { var: var.to_string(), reason: "must be a positive integer".into() }),
        None => Ok(None),
    }
}

fn decode_key(var: &str, b64: &str) -> Result<[u8; 32], ConfigError> {
    let bytes = base64::engine::general_purpose::STANDARD.decode(b64.trim()).map_err(|e| ConfigError::Invalid {
        var: var.to_string(),
        reason: format!("invalid base64: {e}"),
    })?;
    bytes.try_into().map_err(|_| ConfigError::Invalid {
        var: var.to_string(),
        reason: "must decode to exactly 32 bytes".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Env vars are process-global; serialize tests that touch them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn valid_key_b64() -> String {
        base64::engine::general_purpose::STANDARD.encode([7u8; 32])
    }

    fn clear_env() {
        for var in [
            "DATABASE_URL",
            "TOKEN_PEPPER",
            "ENCRYPTION_KEY",
            "ENCRYPTION_KEYS_RETIRED",
            "ADMIN_TOKEN",
            "SENSITIVE_KEYS",
            "SWEEP_INTERVAL_SECONDS",
            "MAX_TREE_DEPTH",
            "LOG_LEVEL",
        ] {
            std::env::remove_var(var);
        }
    }

    fn set_minimal_required_env() {
        std::env::set_var("DATABASE_URL", "postgres://localhost/scope_config");
        std::env::set_var("TOKEN_PEPPER", "x".repeat(32));
        std::env::set_var("ENCRYPTION_KEY", valid_key_b64());
    }

    #[test]
    fn missing_database_url_is_a_missing_required_error() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        std::env::set_var("TOKEN_PEPPER", "x".repeat(32));
        std::env::set_var("ENCRYPTION_KEY", valid_key_b64());
        let err = ProcessConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired { var } if var == "DATABASE_URL"));
        clear_env();
    }

    #[test]
    fn short_pepper_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        std::env::set_var("DATABASE_URL", "postgres://localhost/scope_config");
        std::env::set_var("TOKEN_PEPPER", "too-short");
        std::env::set_var("ENCRYPTION_KEY", valid_key_b64());
        let err = ProcessConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var, .. } if var == "TOKEN_PEPPER"));
        clear_env();
    }

    #[test]
    fn malformed_encryption_key_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        std::env::set_var("DATABASE_URL", "postgres://localhost/scope_config");
        std::env::set_var("TOKEN_PEPPER", "x".repeat(32));
        std::env::set_var("ENCRYPTION_KEY", "not-valid-base64!!!");
        let err = ProcessConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var, .. } if var == "ENCRYPTION_KEY"));
        clear_env();
    }

    #[test]
    fn minimal_env_yields_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        set_minimal_required_env();
        let cfg = ProcessConfig::from_env().unwrap();
        assert_eq!(cfg.sweep_interval, Duration::from_secs(300));
        assert_eq!(cfg.max_tree_depth, 32);
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.pool_size, 20);
        assert_eq!(cfg.sweeper_pool_size, 2);
        assert!(cfg.admin_token.is_none());
        assert!(!cfg.sensitive_keys.is_empty());
        clear_env();
    }

    #[test]
    fn encryption_key_id_is_stable_across_loads() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        set_minimal_required_env();
        let first = ProcessConfig::from_env().unwrap();
        let second = ProcessConfig::from_env().unwrap();
        assert_eq!(first.keyring.active_key().key_id, second.keyring.active_key().key_id);
        clear_env();
    }

    #[test]
    fn retired_keys_are_resolvable_and_distinct_from_active() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        set_minimal_required_env();
        let retired_b64 = base64::engine::general_purpose::STANDARD.encode([9u8; 32]);
        std::env::set_var("ENCRYPTION_KEYS_RETIRED", &retired_b64);
        let cfg = ProcessConfig::from_env().unwrap();
        let retired_id = key_id_for(&[9u8; 32]);
        assert_ne!(retired_id, cfg.keyring.active_key().key_id);
        assert!(cfg.keyring.key(&retired_id).is_some());
        clear_env();
    }

    #[test]
    fn sensitive_keys_env_override_replaces_the_default_set() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        set_minimal_required_env();
        std::env::set_var("SENSITIVE_KEYS", "only_this_one, and_this");
        let cfg = ProcessConfig::from_env().unwrap();
        assert_eq!(cfg.sensitive_keys, vec!["only_this_one".to_string(), "and_this".to_string()]);
        clear_env();
    }

    #[test]
    fn toml_overlay_supplies_non_secret_defaults_but_env_wins() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        set_minimal_required_env();
        std::env::set_var("MAX_TREE_DEPTH", "8");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scope-config.toml");
        std::fs::write(&path, "log_level = \"debug\"\nmax_tree_depth = 64\nsweep_interval_seconds = 120\n").unwrap();

        let cfg = ProcessConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.max_tree_depth, 8, "env MAX_TREE_DEPTH must win over the file");
        assert_eq!(cfg.sweep_interval, Duration::from_secs(120));
        clear_env();
    }

    #[test]
    fn invalid_integer_env_var_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        set_minimal_required_env();
        std::env::set_var("MAX_TREE_DEPTH", "not-a-number");
        let err = ProcessConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var, .. } if var == "MAX_TREE_DEPTH"));
        clear_env();
    }
}
