use std::collections::HashSet;

use error_common::{StorageProfile, Tier};

/// The authenticated caller, as established by the interceptor chain (C9)
/// from a verified bearer token's claims.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: String,
    pub permissions: Vec<String>,
    pub tier: Tier,
}

impl AuthenticatedUser {
    pub fn has_permission(&self, operation: &str) -> bool {
        self.permissions.iter().any(|p| p == "*" || p == operation)
    }
}

/// A single authorization request: principal, the operation token being
/// exercised, and — for operations that target an existing key — the key's
/// id and its current authorized contexts.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest<'a> {
    pub user: &'a AuthenticatedUser,
    pub operation: &'a str,
    pub key_id: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct KeyResourceContext {
    pub authorized_contexts: HashSet<String>,
}

pub fn storage_profile_gate(tier: Tier, requested: StorageProfile) -> bool {
    tier.permits_storage_profile(requested)
}
