//! The field-name redaction list shared by the audit pipeline and the
//! redacted logger, so the two never drift apart on what counts as secret.

/// Field names (case-insensitive, substring match) that must never appear
/// verbatim in an audit event's `details` map or in a log line.
pub const REDACTED_FIELD_NAMES: &[&str] = &["api_key", "password", "dek", "token", "secret"];

pub const REDACTED_PLACEHOLDER: &str = "[REDACTED]";

/// True if `field_name` matches one of the redaction patterns.
pub fn is_redacted_field(field_name: &str) -> bool {
    let lower = field_name.to_ascii_lowercase();
    REDACTED_FIELD_NAMES.iter().any(|pattern| lower.contains(pattern))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_case_insensitively_and_as_substring() {
        assert!(is_redacted_field("API_Key"));
        assert!(is_redacted_field("encrypted_dek"));
        assert!(is_redacted_field("client_secret"));
        assert!(!is_redacted_field("description"));
    }
}
