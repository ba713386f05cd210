//! Recursive JSON subtree encryption against a sensitive-key predicate.

use crate::envelope::{decrypt, encrypt, looks_like_envelope};
use crate::keyring::EncryptionKeyring;
use scope_config_error::ScopeConfigError;
use serde_json::Value;

/// The built-in sensitive-key set (case-insensitive exact match).
pub const DEFAULT_SENSITIVE_KEYS: &[&str] = &[
    "api_key",
    "bot_token",
    "client_secret",
    "password",
    "token",
    "webhook_url",
    "secret",
    "access_key",
    "private_key",
];

/// Clone of [`DEFAULT_SENSITIVE_KEYS`] as owned strings, the shape
/// `scope-config-config` hands back after applying the `SENSITIVE_KEYS`
/// environment override.
#[must_use]
pub fn default_sensitive_keys() -> Vec<String> {
    DEFAULT_SENSITIVE_KEYS.iter().map(|s| s.to_string()).collect()
}

/// Case-insensitive exact match of `key` against `sensitive_keys`.
#[must_use]
pub fn is_sensitive_key(key: &str, sensitive_keys: &[String]) -> bool {
    sensitive_keys.iter().any(|s| s.eq_ignore_ascii_case(key))
}

/// Recursively walk `value`, replacing scalar values under sensitive keys
/// with encryption envelopes.
///
/// - Objects recurse key-wise; a key matching `sensitive_keys` has its
///   scalar value encrypted, or (if an array) each scalar element
///   encrypted individually.
/// - Non-sensitive keys pass their value through [`encrypt_subtree`]
///   recursively (so nested objects anywhere still get walked).
/// - Arrays under a non-sensitive key are walked element-wise for object
///   elements; scalar elements pass through unchanged.
///
/// # Errors
///
/// Propagates [`ScopeConfigError::Transient`] from [`encrypt`] if the
/// active key is malformed.
pub fn encrypt_subtree(value: &Value, sensitive_keys: &[String], keyring: &EncryptionKeyring) -> Result<Value, ScopeConfigError> {
    match value {
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                let encrypted = if is_sensitive_key(k, sensitive_keys) {
                    encrypt_sensitive_value(v, keyring)?
                } else {
                    encrypt_subtree(v, sensitive_keys, keyring)?
                };
                out.insert(k.clone(), encrypted);
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(encrypt_subtree(item, sensitive_keys, keyring)?);
            }
            Ok(Value::Array(out))
        }
        other => Ok(other.clone()),
    }
}

fn encrypt_sensitive_value(value: &Value, keyring: &EncryptionKeyring) -> Result<Value, ScopeConfigError> {
    match value {
        Value::String(s) => Ok(Value::String(encrypt(s, keyring)?)),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(encrypt_sensitive_value(item, keyring)?);
            }
            Ok(Value::Array(out))
        }
        Value::Object(_) => encrypt_subtree(value, &default_sensitive_keys(), keyring),
        other => Ok(other.clone()),
    }
}

/// Inverse of [`encrypt_subtree`]: recursively decrypts every envelope
/// string found anywhere in `value`, regardless of which key it sits
/// under (envelopes are self-describing, so no sensitive-key list is
/// needed for the inverse walk).
///
/// # Errors
///
/// Propagates [`ScopeConfigError::KeyUnknown`] or
/// [`ScopeConfigError::TamperDetected`] from [`decrypt`].
pub fn decrypt_subtree(value: &Value, keyring: &EncryptionKeyring) -> Result<Value, ScopeConfigError> {
    match value {
        Value::String(s) if looks_like_envelope(s) => Ok(Value::String(decrypt(s, keyring)?)),
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), decrypt_subtree(v, keyring)?);
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(decrypt_subtree(item, keyring)?);
            }
            Ok(Value::Array(out))
        }
        other => Ok(other.clone()),
    }
}
