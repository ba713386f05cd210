//! The envelope wire format and its AEAD encrypt/decrypt operations.

use crate::keyring::EncryptionKeyring;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use rand::RngCore;
use scope_config_error::ScopeConfigError;

/// Versioned scheme tag for the current envelope format.
const SCHEME: &str = "aesgcm256";

const DELIM: char = ':';
const NONCE_LEN: usize = 12;

fn b64() -> base64::engine::GeneralPurpose {
    base64::engine::general_purpose::STANDARD
}

/// Encrypt `plaintext` under the keyring's active key, producing an
/// envelope string `<scheme>:<key_id>:<nonce_b64>:<ct_b64>:<tag_b64>`.
///
/// A fresh random 96-bit nonce is drawn for every call, so the same
/// plaintext never produces the same ciphertext twice.
///
/// # Errors
///
/// Returns [`ScopeConfigError::Transient`] if the active key material is
/// malformed (should never happen for a keyring built via
/// [`EncryptionKeyring::new`], which validates key length up front).
pub fn encrypt(plaintext: &str, keyring: &EncryptionKeyring) -> Result<String, ScopeConfigError> {
    let key = keyring.active_key();
    let cipher = Aes256Gcm::new_from_slice(&key.material).map_err(|e| ScopeConfigError::Transient {
        reason: format!("cipher init: {e}"),
    })?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    // AEAD encryption failures are a startup-time concern (bad key length),
    // which `EncryptionKeyring::new` already rejects; treat any remaining
    // failure here as fatal-for-the-call rather than guess at recovery.
    let ct_and_tag = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|e| ScopeConfigError::Transient {
            reason: format!("encryption failed: {e}"),
        })?;

    // aes-gcm appends the 16-byte tag to the ciphertext; split it back out
    // so the envelope carries ciphertext and tag as distinct fields.
    let tag_start = ct_and_tag.len().saturating_sub(16);
    let (ct, tag) = ct_and_tag.split_at(tag_start);

    Ok(format!(
        "{SCHEME}{DELIM}{}{DELIM}{}{DELIM}{}{DELIM}{}",
        key.key_id,
        b64().encode(nonce_bytes),
        b64().encode(ct),
        b64().encode(tag),
    ))
}

/// Decrypt an envelope produced by [`encrypt`].
///
/// # Errors
///
/// - [`ScopeConfigError::InvalidInput`] if the envelope is malformed.
/// - [`ScopeConfigError::KeyUnknown`] if `key_id` is neither active nor retired.
/// - [`ScopeConfigError::TamperDetected`] if AEAD authentication fails.
pub fn decrypt(envelope: &str, keyring: &EncryptionKeyring) -> Result<String, ScopeConfigError> {
    let parts: Vec<&str> = envelope.splitn(5, DELIM).collect();
    let [scheme, key_id, nonce_b64, ct_b64, tag_b64] = parts[..] else {
        return Err(ScopeConfigError::invalid_input("malformed envelope"));
    };
    if scheme != SCHEME {
        return Err(ScopeConfigError::invalid_input(format!(
            "unsupported envelope scheme '{scheme}'"
        )));
    }

    let key = keyring
        .key(key_id)
        .ok_or_else(|| ScopeConfigError::KeyUnknown {
            key_id: key_id.to_string(),
        })?;

    let nonce_bytes = b64()
        .decode(nonce_b64)
        .map_err(|_| ScopeConfigError::invalid_input("malformed nonce"))?;
    let ct = b64()
        .decode(ct_b64)
        .map_err(|_| ScopeConfigError::invalid_input("malformed ciphertext"))?;
    let tag = b64()
        .decode(tag_b64)
        .map_err(|_| ScopeConfigError::invalid_input("malformed tag"))?;

    if nonce_bytes.len() != NONCE_LEN {
        return Err(ScopeConfigError::invalid_input("wrong nonce length"));
    }

    let mut ct_and_tag = ct;
    ct_and_tag.extend_from_slice(&tag);

    let cipher = Aes256Gcm::new_from_slice(&key.material).map_err(|e| ScopeConfigError::Transient {
        reason: format!("cipher init: {e}"),
    })?;
    let nonce = Nonce::from_slice(&nonce_bytes);

    let plaintext = cipher
        .decrypt(nonce, ct_and_tag.as_ref())
        .map_err(|_| ScopeConfigError::TamperDetected {
            key_id: key_id.to_string(),
        })?;

    String::from_utf8(plaintext).map_err(|_| ScopeConfigError::TamperDetected {
        key_id: key_id.to_string(),
    })
}

/// `true` if `s` looks like an envelope produced by [`encrypt`] (five
/// `:`-delimited fields with the current scheme tag). Used by
/// [`crate::subtree::decrypt_subtree`] to distinguish envelopes from plain
/// scalar values it should pass through untouched.
#[must_use]
pub fn looks_like_envelope(s: &str) -> bool {
    let mut parts = s.splitn(5, DELIM);
    parts.next() == Some(SCHEME) && parts.clone().count() == 4
}
