//! Organization — the root of tenant isolation.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The root of tenant isolation. Every other entity is tenanted by `org_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Organization {
    /// Opaque, caller-chosen identifier. Primary key.
    pub org_id: String,
    /// When the organization was created.
    pub created_at: DateTime<Utc>,
}

impl Organization {
    /// Construct a new organization, stamping `created_at` to `now`.
    #[must_use]
    pub fn new(org_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            org_id: org_id.into(),
            created_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_stamps_created_at() {
        let now = Utc::now();
        let org = Organization::new("acme", now);
        assert_eq!(org.org_id, "acme");
        assert_eq!(org.created_at, now);
    }
}
