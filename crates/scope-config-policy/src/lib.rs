// SPDX-License-Identifier: MIT OR Apache-2.0

//! Security policy enforcement over proposed config writes: locked-path
//! prefix checks, per-path numeric ceilings, and approval gates for
//! `agents.*.prompt.*` / `agents.*.tools.*`.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod engine;
pub mod paths;

pub use engine::{PolicyEngine, PolicyOutcome};
