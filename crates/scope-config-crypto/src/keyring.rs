//! Active/retired AEAD key material for encryption and decrypt-only rotation.

use chrono_shim::{DateTime, Utc};
use scope_config_error::ScopeConfigError;
use std::collections::HashMap;
use uuid::Uuid;

/// Derive a stable key id from key material, so the same `ENCRYPTION_KEY`
/// env value always resolves to the same `key_id` across restarts (the
/// active key's id must be stable, or envelopes written before a restart
/// would reference an id the new keyring never generated).
#[must_use]
pub fn key_id_for(material: &[u8; 32]) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(material);
    digest.iter().take(8).map(|b| format!("{b:02x}")).collect()
}

/// A single symmetric key: 32 bytes of AES-256-GCM key material.
#[derive(Debug, Clone)]
pub struct EncryptionKey {
    /// Identifier embedded in every envelope encrypted under this key.
    pub key_id: String,
    /// 32 bytes of key material. Never logged, never serialized.
    pub material: [u8; 32],
    /// When this key was installed.
    pub created_at: DateTime<Utc>,
    /// When this key was retired (decrypt-only from then on), if ever.
    pub retired_at: Option<DateTime<Utc>>,
}

/// Holds one active key plus zero or more retired keys, addressable by
/// `key_id`. New data is always encrypted under the active key; decryption
/// accepts any key still present (active or retired).
#[derive(Debug, Clone)]
pub struct EncryptionKeyring {
    active_key_id: String,
    keys: HashMap<String, EncryptionKey>,
}

impl EncryptionKeyring {
    /// Build a keyring with a single active key, generating its id.
    ///
    /// # Errors
    ///
    /// Never fails today (key length is fixed by the `[u8; 32]` parameter),
    /// but returns `Result` because `from_env` composition needs a fallible
    /// constructor and callers should not assume key validation can never
    /// grow stricter.
    pub fn new(material: [u8; 32]) -> Result<Self, ScopeConfigError> {
        let key_id = Uuid::new_v4().to_string();
        let key = EncryptionKey {
            key_id: key_id.clone(),
            material,
            created_at: chrono_shim::now(),
            retired_at: None,
        };
        let mut keys = HashMap::new();
        keys.insert(key_id.clone(), key);
        Ok(Self {
            active_key_id: key_id,
            keys,
        })
    }

    /// Construct a keyring from an explicit active key id plus key map,
    /// used when hydrating from `scope-config-config`'s parsed environment.
    pub fn from_keys(active_key_id: String, keys: Vec<EncryptionKey>) -> Result<Self, ScopeConfigError> {
        if !keys.iter().any(|k| k.key_id == active_key_id) {
            return Err(ScopeConfigError::invalid_input(
                "active_key_id not present among configured keys",
            ));
        }
        let keys = keys.into_iter().map(|k| (k.key_id.clone(), k)).collect();
        Ok(Self { active_key_id, keys })
    }

    /// The key new data is encrypted under.
    #[must_use]
    pub fn active_key(&self) -> &EncryptionKey {
        self.keys
            .get(&self.active_key_id)
            .expect("active_key_id always present by construction")
    }

    /// Look up a key (active or retired) by id, for decryption.
    #[must_use]
    pub fn key(&self, key_id: &str) -> Option<&EncryptionKey> {
        self.keys.get(key_id)
    }

    /// Install a new active key, retiring the previous active key in place.
    ///
    /// Retired keys remain decrypt-capable; no re-encryption pass happens
    /// automatically (see the re-keying open question in the design notes).
    pub fn rotate(&mut self, new_material: [u8; 32]) -> String {
        if let Some(prev) = self.keys.get_mut(&self.active_key_id) {
            prev.retired_at = Some(chrono_shim::now());
        }
        let key_id = Uuid::new_v4().to_string();
        self.keys.insert(
            key_id.clone(),
            EncryptionKey {
                key_id: key_id.clone(),
                material: new_material,
                created_at: chrono_shim::now(),
                retired_at: None,
            },
        );
        self.active_key_id = key_id.clone();
        key_id
    }
}

/// Thin re-export shim so this module doesn't need a direct `chrono`
/// dependency declaration duplicated across every call site.
mod chrono_shim {
    pub use chrono::{DateTime, Utc};

    pub fn now() -> DateTime<Utc> {
        Utc::now()
    }
}
