// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bearer credential resolution for the scope-config service.
//!
//! [`IdentityResolver`] implements the fixed precedence order (env admin
//! override, DB admin token, team token, SSO JWT) and returns a tagged
//! [`Principal`] that every authorization decision pattern-matches on.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod jwt;
pub mod principal;
pub mod resolver;

pub use jwt::{JwtAuth, SsoClaims, SsoKeyring};
pub use principal::Principal;
pub use resolver::IdentityResolver;
