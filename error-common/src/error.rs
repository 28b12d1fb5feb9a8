use crate::kind::ErrorKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// The error type threaded from library crates up to the `server` crate's
/// error-translation interceptor.
///
/// A `PolykeyError` never carries its cause verbatim where that cause might
/// be sensitive (SQL text, KMS response bodies, raw DEK bytes); callers
/// attach a `detail` string for the log and a `message` safe to put on the
/// wire.
#[derive(Error, Debug, Serialize, Deserialize)]
pub struct PolykeyError {
    pub kind: ErrorKind,
    /// Message safe to return to the caller.
    pub message: String,
    /// Additional key/value context, also wire-safe.
    pub context: HashMap<String, String>,
    /// Correlation id logged in full alongside `detail`; the only thing an
    /// `Internal` error exposes to the caller.
    pub error_id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// True if `message`/`context` must be scrubbed before leaving the process.
    pub is_sensitive: bool,
    #[serde(skip)]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl PolykeyError {
    pub fn builder(kind: ErrorKind) -> ErrorBuilder {
        ErrorBuilder::new(kind)
    }

    pub fn authn<S: Into<String>>(message: S) -> Self {
        ErrorBuilder::new(ErrorKind::Authn).with_message(message).build()
    }

    pub fn authz<S: Into<String>>(message: S) -> Self {
        ErrorBuilder::new(ErrorKind::Authz).with_message(message).build()
    }

    pub fn not_found<S: Into<String>>(message: S) -> Self {
        ErrorBuilder::new(ErrorKind::NotFound).with_message(message).build()
    }

    pub fn conflict<S: Into<String>>(message: S) -> Self {
        ErrorBuilder::new(ErrorKind::Conflict).with_message(message).build()
    }

    pub fn exhausted<S: Into<String>>(message: S) -> Self {
        ErrorBuilder::new(ErrorKind::Exhausted).with_message(message).build()
    }

    pub fn invalid<S: Into<String>>(message: S) -> Self {
        ErrorBuilder::new(ErrorKind::Invalid).with_message(message).build()
    }

    /// Build an `Internal` error whose real cause is logged under
    /// `error_id` but never serialized to the wire.
    pub fn internal<E: std::error::Error + Send + Sync + 'static>(source: E) -> Self {
        ErrorBuilder::new(ErrorKind::Internal)
            .with_message("internal_error")
            .with_source(source)
            .sensitive()
            .build()
    }

    /// View suitable for serializing straight onto the wire: the sensitive
    /// message/context are replaced, everything else is preserved.
    pub fn sanitized(&self) -> PolykeyError {
        let mut sanitized = PolykeyError {
            kind: self.kind,
            message: self.message.clone(),
            context: self.context.clone(),
            error_id: self.error_id,
            timestamp: self.timestamp,
            is_sensitive: self.is_sensitive,
            source: None,
        };
        if self.is_sensitive {
            sanitized.message = format!("internal error (correlation id {})", self.error_id);
            sanitized.context.clear();
        }
        sanitized
    }

    /// Log this error at full fidelity, including its source chain.
    pub fn log(&self) {
        if let Some(src) = &self.source {
            tracing::error!(error_id = %self.error_id, kind = %self.kind, cause = %src, "{}", self.message);
        } else {
            tracing::warn!(error_id = %self.error_id, kind = %self.kind, "{}", self.message);
        }
    }
}

impl fmt::Display for PolykeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} (id={})", self.kind, self.message, self.error_id)
    }
}

pub struct ErrorBuilder {
    kind: ErrorKind,
    message: Option<String>,
    context: HashMap<String, String>,
    is_sensitive: bool,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ErrorBuilder {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            context: HashMap::new(),
            is_sensitive: false,
            source: None,
        }
    }

    pub fn with_message<S: Into<String>>(mut self, message: S) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_context<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.is_sensitive = true;
        self
    }

    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn build(self) -> PolykeyError {
        PolykeyError {
            kind: self.kind,
            message: self.message.unwrap_or_else(|| "an error occurred".to_string()),
            context: self.context,
            error_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            is_sensitive: self.is_sensitive,
            source: self.source,
        }
    }
}

pub type PolykeyResult<T> = Result<T, PolykeyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitized_hides_message_when_sensitive() {
        let err = PolykeyError::builder(ErrorKind::Internal)
            .with_message("raw sqlx connection string leaked")
            .sensitive()
            .build();
        let sanitized = err.sanitized();
        assert!(!sanitized.message.contains("sqlx"));
        assert!(sanitized.context.is_empty());
    }

    #[test]
    fn non_sensitive_errors_pass_through() {
        let err = PolykeyError::not_found("key not found");
        let sanitized = err.sanitized();
        assert_eq!(sanitized.message, "key not found");
    }

    #[test]
    fn wire_status_mapping_matches_spec_table() {
        assert_eq!(ErrorKind::Authn.wire_status(), "UNAUTHENTICATED");
        assert_eq!(ErrorKind::Conflict.wire_status(), "ABORTED");
        assert_eq!(ErrorKind::Exhausted.wire_status(), "RESOURCE_EXHAUSTED");
    }
}
