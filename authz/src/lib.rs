//! Principal and resource authorization for polykey.
//!
//! [`Authorizer`] runs the two-step decision (permission check, then
//! per-key ACL check), memoizing the outcome in a [`cache::TtlCache`] keyed
//! on `(user_id, operation, key_id)`, and separately gates the storage
//! profile a caller's tier may request.

pub mod authorizer;
pub mod error;
pub mod models;

pub use authorizer::{Authorizer, AuthzAuditSink, KeyContextLookup, NoopAuditSink};
pub use error::{AuthzError, AuthzResult};
pub use models::{AuthenticatedUser, AuthorizationRequest, KeyResourceContext};
