// SPDX-License-Identifier: MIT OR Apache-2.0

//! Unified audit pipeline: correlation id handling on top of
//! `scope-config-storage`'s transactional insert and filtered query, plus
//! streaming CSV export.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod correlation;
pub mod service;

pub use correlation::resolve_correlation_id;
pub use service::{new_event, AuditService};
