// SPDX-License-Identifier: MIT OR Apache-2.0
//! The `{items|events, total, limit, offset, has_more}` pagination envelope
//! shared by every listing route.

use serde::{Deserialize, Serialize};

/// Query parameters accepted by paginated list routes.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageQuery {
    /// Page size. Defaults to 50, capped at 500.
    pub limit: Option<i64>,
    /// Offset into the result set. Defaults to 0.
    pub offset: Option<i64>,
}

impl PageQuery {
    /// Resolve to a concrete `(limit, offset)` pair within sane bounds.
    #[must_use]
    pub fn resolved(&self) -> (i64, i64) {
        let limit = self.limit.unwrap_or(50).clamp(1, 500);
        let offset = self.offset.unwrap_or(0).max(0);
        (limit, offset)
    }
}

/// A generic pagination envelope. `key` names the payload field
/// (`"items"` or `"events"` per §6's response shape conventions).
#[derive(Debug, Serialize)]
pub struct Page<T: Serialize> {
    #[serde(flatten)]
    pub payload: PagePayload<T>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub has_more: bool,
}

/// The named payload field, flattened into [`Page`]'s JSON body.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum PagePayload<T: Serialize> {
    Items { items: Vec<T> },
    Events { events: Vec<T> },
}

impl<T: Serialize> Page<T> {
    /// Build an `items`-keyed page.
    #[must_use]
    pub fn items(items: Vec<T>, total: i64, limit: i64, offset: i64) -> Self {
        let has_more = offset + items.len() as i64 < total;
        Self {
            payload: PagePayload::Items { items },
            total,
            limit,
            offset,
            has_more,
        }
    }

    /// Build an `events`-keyed page.
    #[must_use]
    pub fn events(events: Vec<T>, total: i64, limit: i64, offset: i64) -> Self {
        let has_more = offset + events.len() as i64 < total;
        Self {
            payload: PagePayload::Events { events },
            total,
            limit,
            offset,
            has_more,
        }
    }
}
