//! Common error taxonomy and wire-status mapping for polykey.
//!
//! Every crate in the workspace returns [`PolykeyResult`] from its fallible
//! operations instead of rolling its own error enum. This keeps the
//! `server` crate's error-translation interceptor as the single place that
//! knows how a [`kind::ErrorKind`] becomes a transport status, and keeps
//! sensitive detail (SQL text, KMS response bodies, raw key material) from
//! leaking onto the wire by construction rather than by caller discipline.
//!
//! # Key Features
//!
//! - **Error taxonomy**: a closed set of seven kinds ([`kind::ErrorKind`])
//!   that every crate maps its failures onto.
//! - **Context preservation**: [`context::ErrorContext`] carries
//!   request/session/trace ids alongside an error for logging.
//! - **Sanitization**: [`sanitization`] holds the field-name redaction list
//!   shared by the audit pipeline and the redacted logger, and
//!   [`error::PolykeyError::sanitized`] scrubs sensitive errors before they
//!   reach a caller.
//! - **Reporting**: [`reporting::report`] logs an error and flags whether it
//!   warrants paging.
//!
//! # Example
//!
//! ```rust
//! use error_common::{PolykeyError, PolykeyResult};
//!
//! fn load_key(id: &str) -> PolykeyResult<String> {
//!     if id.is_empty() {
//!         return Err(PolykeyError::invalid("key id must not be empty"));
//!     }
//!     Ok(id.to_string())
//! }
//! ```

pub mod context;
pub mod error;
pub mod kind;
pub mod reporting;
pub mod sanitization;
pub mod tier;

pub use context::ErrorContext;
pub use error::{ErrorBuilder, PolykeyError, PolykeyResult};
pub use kind::ErrorKind;
pub use reporting::report;
pub use tier::{StorageProfile, Tier};
