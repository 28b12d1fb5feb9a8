//! Versioned key store and append-only audit repository for polykey.
//!
//! `PgKeyRepository` is the single writer of the `keys` table and is where
//! the version-monotonicity and single-active-row invariants are
//! enforced; `PgAuditRepository` only ever appends.

pub mod audit_repository;
pub mod connection;
pub mod error;
pub mod key_repository;
pub mod models;
pub mod pagination;

pub use audit_repository::{AuditRepository, PgAuditRepository};
pub use connection::{DbPool, PoolConfig};
pub use error::{PersistenceError, PersistenceResult};
pub use key_repository::{KeyRepository, PgKeyRepository};
pub use models::{
    AuditActor, AuditEvent, AuditOutcome, AuditResource, Key, KeyMetadata, KeyStatus,
    MetadataPatch,
};
pub use pagination::PageToken;
