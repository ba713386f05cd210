//! Correlation id handling: reuse a caller-supplied `X-Correlation-Id`, or
//! mint a fresh one.

use uuid::Uuid;

/// Resolve the correlation id to record on an [`scope_config_core::AuditEvent`].
///
/// Returns `header_value` verbatim if present and non-empty (trimmed);
/// otherwise mints a fresh UUID v4.
#[must_use]
pub fn resolve_correlation_id(header_value: Option<&str>) -> String {
    match header_value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => Uuid::new_v4().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reuses_a_supplied_correlation_id() {
        assert_eq!(resolve_correlation_id(Some("req-123")), "req-123");
    }

    #[test]
    fn trims_whitespace_around_a_supplied_id() {
        assert_eq!(resolve_correlation_id(Some("  req-123  ")), "req-123");
    }

    #[test]
    fn mints_a_fresh_id_when_absent() {
        let id = resolve_correlation_id(None);
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn mints_a_fresh_id_when_empty() {
        let id = resolve_correlation_id(Some("   "));
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn two_minted_ids_differ() {
        assert_ne!(resolve_correlation_id(None), resolve_correlation_id(None));
    }
}
