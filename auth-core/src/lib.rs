//! Client credential store and bearer-token issuance/verification for
//! polykey.
//!
//! - [`credential_store::ClientCredentialStore`] (C4) is the immutable
//!   client_id -> permissions map, loaded once from YAML at startup.
//! - [`token_manager::TokenManager`] (C5) issues and verifies RS256
//!   bearer tokens, backed by a [`cache::TtlCache`] revocation set.

pub mod config;
pub mod credential_store;
pub mod error;
pub mod models;
pub mod token_manager;

pub use config::TokenManagerConfig;
pub use credential_store::ClientCredentialStore;
pub use error::{AuthError, AuthResult};
pub use models::{Claims, ClientRecord, WILDCARD_PERMISSION};
pub use token_manager::{NoopEventSink, TokenEventSink, TokenManager};
