//! Assembles a single [`AuditEvent`] from a business operation's outcome:
//! sanitizes `details`, derives `security_level` from the resource's
//! classification, and computes the tamper-evidence checksum.

use chrono::Utc;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use error_common::sanitization::{is_redacted_field, REDACTED_PLACEHOLDER};
use persistence::{AuditActor, AuditEvent, AuditOutcome, AuditResource};

/// Replaces any object field whose name matches the shared redaction list
/// with the redaction placeholder; recurses into nested objects and
/// arrays so a secret can't hide behind a layer of nesting.
pub fn sanitize_details(details: Value) -> Value {
    match details {
        Value::Object(map) => {
            let sanitized = map
                .into_iter()
                .map(|(key, value)| {
                    if is_redacted_field(&key) {
                        (key, Value::String(REDACTED_PLACEHOLDER.to_string()))
                    } else {
                        (key, sanitize_details(value))
                    }
                })
                .collect();
            Value::Object(sanitized)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize_details).collect()),
        other => other,
    }
}

/// `classification` follows the resource's own sensitivity label
/// (`public`, `internal`, `confidential`, `restricted`); anything
/// unrecognized is treated as the most sensitive level.
fn security_level_for(classification: &str) -> &'static str {
    match classification {
        "public" => "low",
        "internal" => "medium",
        "confidential" => "high",
        _ => "critical",
    }
}

fn checksum_for(id: Uuid, timestamp_unix: i64, event_type: &str, action: &str, result: &AuditOutcome, security_level: &str) -> String {
    let canonical = json!({
        "id": id.to_string(),
        "timestamp": timestamp_unix,
        "event_type": event_type,
        "action": action,
        "result": result.to_string(),
        "security_level": security_level,
    });
    let canonical_bytes = serde_json::to_vec(&canonical).expect("json values always serialize");

    let mut hasher = Sha256::new();
    hasher.update(&canonical_bytes);
    hex::encode(hasher.finalize())
}

pub struct AuditEventBuilder {
    event_type: String,
    action: String,
    result: AuditOutcome,
    actor: AuditActor,
    resource: AuditResource,
    details: Value,
}

impl AuditEventBuilder {
    pub fn new(event_type: impl Into<String>, action: impl Into<String>, result: AuditOutcome, actor: AuditActor, resource: AuditResource) -> Self {
        Self { event_type: event_type.into(), action: action.into(), result, actor, resource, details: Value::Null }
    }

    pub fn details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    pub fn build(self) -> AuditEvent {
        let id = Uuid::new_v4();
        let timestamp = Utc::now();
        let security_level = security_level_for(&self.resource.classification).to_string();
        let checksum = checksum_for(id, timestamp.timestamp(), &self.event_type, &self.action, &self.result, &security_level);

        AuditEvent {
            id,
            timestamp,
            event_type: self.event_type,
            action: self.action,
            result: self.result,
            actor: self.actor,
            resource: self.resource,
            details: sanitize_details(self.details),
            security_level,
            checksum,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn actor() -> AuditActor {
        AuditActor { user_id: Some("user-1".to_string()), client_ip: None, user_agent: None, session_id: None, tier: None }
    }

    fn resource(classification: &str) -> AuditResource {
        AuditResource { resource_type: "key".to_string(), id: "key-1".to_string(), classification: classification.to_string() }
    }

    #[test]
    fn sanitize_redacts_matching_fields_including_nested() {
        let details = json!({"api_key": "shh", "nested": {"password": "hunter2"}, "description": "fine"});
        let sanitized = sanitize_details(details);
        assert_eq!(sanitized["api_key"], json!("[REDACTED]"));
        assert_eq!(sanitized["nested"]["password"], json!("[REDACTED]"));
        assert_eq!(sanitized["description"], json!("fine"));
    }

    #[test]
    fn build_produces_a_nonempty_checksum() {
        let event = AuditEventBuilder::new("key.create", "CreateKey", AuditOutcome::Success, actor(), resource("confidential")).build();
        assert_eq!(event.security_level, "high");
        assert_eq!(event.checksum.len(), 64);
    }

    #[test]
    fn unrecognized_classification_maps_to_critical() {
        let event = AuditEventBuilder::new("key.create", "CreateKey", AuditOutcome::Success, actor(), resource("weird")).build();
        assert_eq!(event.security_level, "critical");
    }
}
