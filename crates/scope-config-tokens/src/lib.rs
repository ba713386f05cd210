// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bearer token lifecycle: issuance, resolution, coalesced `last_used_at`
//! writes, revocation, and the expiry/inactivity sweep.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod hashing;
pub mod service;
pub mod touch;

pub use hashing::{generate_secret, hash_secret};
pub use service::TokenService;
pub use touch::LastUsedCoalescer;
