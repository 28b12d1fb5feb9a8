//! Audit event assembly and asynchronous batched persistence for polykey.
//!
//! [`AuditLogger`] sanitizes and checksums each event, emits it to the
//! structured logger synchronously, and enqueues it on a bounded channel
//! drained by a pool of workers that batch inserts through
//! [`persistence::AuditRepository`] with retry-with-backoff.

pub mod builder;
pub mod config;
pub mod error;
pub mod logger;
pub mod pipeline;

pub use builder::AuditEventBuilder;
pub use config::AuditPipelineConfig;
pub use error::{AuditError, AuditResult};
pub use logger::AuditLogger;
pub use pipeline::AuditPipeline;
