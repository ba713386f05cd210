// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Transparent field-level encryption for configuration values.
//!
//! Encryption happens at the repository boundary: callers above
//! `scope-config-storage` never see an [envelope](envelope) except through
//! explicit diagnostic endpoints. See [`envelope`] for the wire format,
//! [`keyring`] for key rotation, and [`subtree`] for the recursive JSON walk.

pub mod envelope;
pub mod keyring;
pub mod subtree;

pub use envelope::{decrypt, encrypt};
pub use keyring::{key_id_for, EncryptionKey, EncryptionKeyring};
pub use subtree::{decrypt_subtree, default_sensitive_keys, encrypt_subtree, is_sensitive_key};
