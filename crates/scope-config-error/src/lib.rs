// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Unified error taxonomy for the scope-config service.
//!
//! Every fallible operation across the crypto, storage, scope-tree, token,
//! identity, and policy layers returns [`ScopeConfigError`]. The HTTP layer
//! (`scope-config-daemon`) maps each variant to a status code and JSON body
//! at the boundary; no inner layer knows about HTTP.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The error taxonomy.
///
/// Variant order mirrors the table in the error-handling design: callers
/// that need only the HTTP status can call [`ScopeConfigError::http_status`]
/// without matching on the full enum.
#[derive(Debug, thiserror::Error)]
pub enum ScopeConfigError {
    /// No or invalid bearer credential.
    #[error("unauthenticated")]
    Unauthenticated,

    /// Authenticated, but lacking the required permission.
    #[error("permission denied: requires '{required}'")]
    PermissionDenied {
        /// The dotted permission string that was missing.
        required: String,
    },

    /// The target entity does not exist (or is hidden from this caller).
    #[error("not found: {what}")]
    NotFound {
        /// What was being looked up (e.g. `"node sre"`, `"token abc"`).
        what: String,
    },

    /// A uniqueness, cycle, or duplicate-creation conflict.
    #[error("conflict: {reason}")]
    Conflict {
        /// Human-readable conflict reason.
        reason: String,
    },

    /// Malformed request body, invalid `node_type`, or a structurally
    /// invalid operation (e.g. issuing a token against a non-team node).
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// Human-readable validation failure.
        reason: String,
    },

    /// The security policy engine rejected a proposed write.
    #[error("policy violation at '{path}': {reason}")]
    PolicyViolation {
        /// The dotted config path that triggered the rejection.
        path: String,
        /// Human-readable rejection reason.
        reason: String,
    },

    /// AEAD authentication failed while decrypting an envelope.
    #[error("tamper detected decrypting key '{key_id}'")]
    TamperDetected {
        /// The envelope's claimed key id (never the plaintext).
        key_id: String,
    },

    /// An envelope references a key id that is neither active nor retired.
    #[error("unknown encryption key '{key_id}'")]
    KeyUnknown {
        /// The envelope's claimed key id.
        key_id: String,
    },

    /// A retry-eligible store error (connection drop, pool exhaustion).
    #[error("transient store error: {reason}")]
    Transient {
        /// Human-readable detail.
        reason: String,
    },

    /// The request's deadline elapsed before completion.
    #[error("deadline exceeded")]
    Deadline,
}

impl ScopeConfigError {
    /// A stable, lowercase, machine-readable tag for this error kind.
    ///
    /// Used as the `"error"` field of the HTTP error body and as the audit
    /// `event_type` suffix for failed operations that are still audited.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ScopeConfigError::Unauthenticated => "unauthenticated",
            ScopeConfigError::PermissionDenied { .. } => "permission_denied",
            ScopeConfigError::NotFound { .. } => "not_found",
            ScopeConfigError::Conflict { .. } => "conflict",
            ScopeConfigError::InvalidInput { .. } => "invalid_input",
            ScopeConfigError::PolicyViolation { .. } => "policy_violation",
            ScopeConfigError::TamperDetected { .. } => "tamper_detected",
            ScopeConfigError::KeyUnknown { .. } => "key_unknown",
            ScopeConfigError::Transient { .. } => "transient",
            ScopeConfigError::Deadline => "deadline",
        }
    }

    /// The HTTP status code this error kind maps to.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            ScopeConfigError::Unauthenticated => 401,
            ScopeConfigError::PermissionDenied { .. } => 403,
            ScopeConfigError::NotFound { .. } => 404,
            ScopeConfigError::Conflict { .. } => 409,
            ScopeConfigError::InvalidInput { .. } => 400,
            ScopeConfigError::PolicyViolation { .. } => 422,
            ScopeConfigError::TamperDetected { .. } => 500,
            ScopeConfigError::KeyUnknown { .. } => 500,
            ScopeConfigError::Transient { .. } => 503,
            ScopeConfigError::Deadline => 504,
        }
    }

    /// `true` for the two error kinds that are operator-visible (alerting)
    /// rather than ordinary client-facing failures.
    #[must_use]
    pub fn is_operator_visible(&self) -> bool {
        matches!(
            self,
            ScopeConfigError::TamperDetected { .. } | ScopeConfigError::KeyUnknown { .. }
        )
    }

    /// Convenience constructor for [`ScopeConfigError::NotFound`].
    #[must_use]
    pub fn not_found(what: impl Into<String>) -> Self {
        ScopeConfigError::NotFound { what: what.into() }
    }

    /// Convenience constructor for [`ScopeConfigError::Conflict`].
    #[must_use]
    pub fn conflict(reason: impl Into<String>) -> Self {
        ScopeConfigError::Conflict {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for [`ScopeConfigError::InvalidInput`].
    #[must_use]
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        ScopeConfigError::InvalidInput {
            reason: reason.into(),
        }
    }
}

/// A JSON-serializable snapshot of an error, matching the HTTP error body
/// shape `{"error": "<kind>", "detail": "<human>", "path"?: "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    /// Stable machine-readable kind tag (see [`ScopeConfigError::kind`]).
    pub error: String,
    /// Human-readable detail, safe to show to the caller.
    pub detail: String,
    /// The offending dotted config path, present only for [`ScopeConfigError::PolicyViolation`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl From<&ScopeConfigError> for ErrorBody {
    fn from(err: &ScopeConfigError) -> Self {
        let path = match err {
            ScopeConfigError::PolicyViolation { path, .. } => Some(path.clone()),
            _ => None,
        };
        ErrorBody {
            error: err.kind().to_string(),
            detail: err.to_string(),
            path,
        }
    }
}

impl fmt::Display for ErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error, self.detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_KINDS: &[&str] = &[
        "unauthenticated",
        "permission_denied",
        "not_found",
        "conflict",
        "invalid_input",
        "policy_violation",
        "tamper_detected",
        "key_unknown",
        "transient",
        "deadline",
    ];

    fn sample_errors() -> Vec<ScopeConfigError> {
        vec![
            ScopeConfigError::Unauthenticated,
            ScopeConfigError::PermissionDenied {
                required: "admin:*".into(),
            },
            ScopeConfigError::not_found("node sre"),
            ScopeConfigError::conflict("node_id exists"),
            ScopeConfigError::invalid_input("bad node_type"),
            ScopeConfigError::PolicyViolation {
                path: "model.name".into(),
                reason: "locked path".into(),
            },
            ScopeConfigError::TamperDetected {
                key_id: "k1".into(),
            },
            ScopeConfigError::KeyUnknown { key_id: "k2".into() },
            ScopeConfigError::Transient {
                reason: "pool exhausted".into(),
            },
            ScopeConfigError::Deadline,
        ]
    }

    #[test]
    fn every_kind_is_unique_and_matches_the_catalog() {
        let kinds: Vec<&str> = sample_errors().iter().map(|e| e.kind()).collect();
        assert_eq!(kinds, ALL_KINDS);
    }

    #[test]
    fn http_status_mapping_matches_the_design_table() {
        let expected = [401, 403, 404, 409, 400, 422, 500, 500, 503, 504];
        let actual: Vec<u16> = sample_errors()
            .iter()
            .map(ScopeConfigError::http_status_code)
            .collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn only_tamper_and_key_unknown_are_operator_visible() {
        for err in sample_errors() {
            let expected = matches!(
                err,
                ScopeConfigError::TamperDetected { .. } | ScopeConfigError::KeyUnknown { .. }
            );
            assert_eq!(err.is_operator_visible(), expected, "{err:?}");
        }
    }

    #[test]
    fn policy_violation_carries_path_in_error_body() {
        let err = ScopeConfigError::PolicyViolation {
            path: "model.name".into(),
            reason: "locked".into(),
        };
        let body = ErrorBody::from(&err);
        assert_eq!(body.error, "policy_violation");
        assert_eq!(body.path.as_deref(), Some("model.name"));
    }

    #[test]
    fn non_policy_violation_has_no_path() {
        let err = ScopeConfigError::not_found("x");
        let body = ErrorBody::from(&err);
        assert!(body.path.is_none());
    }

    #[test]
    fn error_body_serializes_without_path_when_absent() {
        let err = ScopeConfigError::Unauthenticated;
        let body = ErrorBody::from(&err);
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("path").is_none());
    }

    #[test]
    fn tamper_detected_message_never_contains_word_plaintext() {
        let err = ScopeConfigError::TamperDetected {
            key_id: "k1".into(),
        };
        assert!(!err.to_string().to_lowercase().contains("plaintext"));
        assert!(err.to_string().contains("k1"));
    }
}
