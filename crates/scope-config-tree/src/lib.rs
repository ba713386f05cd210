// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! The scope tree: deep-merge semantics and the node operations built on top
//! of them (create/update/delete, lineage, effective config).

pub mod merge;
pub mod service;

pub use merge::{merge, merge_chain};
pub use service::{new_node_id, TreeService};
