//! Structured logging with automatic secret redaction.
//!
//! Two independent redaction passes run on every log line:
//!
//! - **Field-name redaction**: any tracing field whose name matches
//!   [`error_common::sanitization::is_redacted_field`] (`api_key`,
//!   `password`, `dek`, `token`, `secret`, ...) is replaced wholesale,
//!   regardless of what it contains.
//! - **Pattern redaction**: everything else is scanned by [`PiiRedactor`]
//!   for incidentally-sensitive content (emails, phone numbers, IPs) that
//!   ended up in a message or an unlisted field.
//!
//! # Example
//!
//! ```ignore
//! use logger_redacted::{init, LoggerConfig};
//!
//! init(&LoggerConfig::default())?;
//! tracing::info!(token = "abc123", "issued credential"); // token is redacted
//! ```

pub mod config;
pub mod formatter;
pub mod init;
pub mod macros;
pub mod redactor;

pub use config::LoggerConfig;
pub use formatter::RedactedFormatter;
pub use init::init;
pub use redactor::{PiiRedactor, RedactionConfig};
