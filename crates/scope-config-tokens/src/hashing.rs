//! Peppered HMAC-SHA256 token hashing and secret generation.

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Generate a fresh opaque bearer secret: 32 random bytes, hex-encoded, with
/// a short human-recognizable prefix so leaked-secret scanners can flag it.
#[must_use]
pub fn generate_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    let mut hex = String::with_capacity(bytes.len() * 2);
    use std::fmt::Write;
    for b in bytes {
        write!(hex, "{b:02x}").expect("writing to a String never fails");
    }
    format!("sct_{hex}")
}

/// HMAC-SHA256(pepper, secret). Stored in place of the plaintext secret so a
/// database leak alone never recovers a usable credential.
///
/// # Panics
///
/// Never — `Hmac::new_from_slice` accepts any key length.
#[must_use]
pub fn hash_secret(secret: &str, pepper: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(pepper).expect("HMAC accepts any key length");
    mac.update(secret.as_bytes());
    mac.finalize().into_bytes().to_vec()
}
