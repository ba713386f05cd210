// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Shared domain types for the scope-config service.
//!
//! This crate has no behavior of its own — it is the one shared contract
//! every other `scope-config-*` crate builds on.

pub mod audit;
pub mod node;
pub mod org;
pub mod policy;
pub mod token;

pub use audit::{AuditEvent, AuditSource};
pub use node::{Node, NodeConfig, NodeType};
pub use org::Organization;
pub use policy::SecurityPolicy;
pub use token::{AdminToken, SsoConfig, Token};

/// Ancestry depth beyond which a tree is treated as a data-integrity fault.
///
/// Overridable per deployment via `MAX_TREE_DEPTH` (see `scope-config-config`).
pub const DEFAULT_MAX_TREE_DEPTH: usize = 32;
