//! Two-step authorization decision: a principal check against a claim
//! set, then a second resource-ACL check for per-resource permissions.

use std::sync::Arc;

use async_trait::async_trait;

use cache::TtlCache;
use error_common::{StorageProfile, Tier};

use crate::error::{AuthzError, AuthzResult};
use crate::models::AuthenticatedUser;

/// Supplies a key's authorized contexts without authz depending on the
/// persistence crate directly; `key-service` implements this over its
/// `KeyRepository`.
#[async_trait]
pub trait KeyContextLookup: Send + Sync {
    async fn authorized_contexts(&self, key_id: &str) -> AuthzResult<std::collections::HashSet<String>>;
}

/// Notified of every negative `authorize()` outcome, so a denial shows up
/// in the audit trail even though the caller short-circuits on `?` before
/// ever reaching a domain operation's own audit emission. Implemented by
/// the composition root and wired to the audit pipeline; `authz` itself
/// doesn't depend on `audit-engine` to avoid a dependency cycle.
pub trait AuthzAuditSink: Send + Sync {
    fn record_denied(&self, user: &AuthenticatedUser, operation: &str, key_id: Option<&str>, reason: &str);
}

/// A sink that does nothing; used where no audit pipeline is wired
/// (tests, standalone tools).
pub struct NoopAuditSink;

impl AuthzAuditSink for NoopAuditSink {
    fn record_denied(&self, _user: &AuthenticatedUser, _operation: &str, _key_id: Option<&str>, _reason: &str) {}
}

pub struct Authorizer {
    decision_cache: Arc<TtlCache<String, bool>>,
    key_context: Arc<dyn KeyContextLookup>,
    audit: Arc<dyn AuthzAuditSink>,
}

fn decision_cache_key(user_id: &str, operation: &str, key_id: Option<&str>) -> String {
    format!("{}|{}|{}", user_id, operation, key_id.unwrap_or(""))
}

impl Authorizer {
    pub fn new(
        decision_cache: Arc<TtlCache<String, bool>>,
        key_context: Arc<dyn KeyContextLookup>,
        audit: Arc<dyn AuthzAuditSink>,
    ) -> Self {
        Self { decision_cache, key_context, audit }
    }

    /// Allows `create`/`list`-style operations that never target a
    /// specific key to skip the resource check.
    pub async fn authorize(
        &self,
        user: &AuthenticatedUser,
        operation: &str,
        key_id: Option<&str>,
    ) -> AuthzResult<()> {
        let cache_key = decision_cache_key(&user.id, operation, key_id);
        if let Some(allowed) = self.decision_cache.get(&cache_key) {
            if allowed {
                return Ok(());
            }
            let err = denial_for(operation, key_id);
            self.audit.record_denied(user, operation, key_id, &err.to_string());
            return Err(err);
        }

        let decision = self.decide(user, operation, key_id).await;
        self.decision_cache.set(cache_key, decision.is_ok(), None);
        if let Err(ref err) = decision {
            self.audit.record_denied(user, operation, key_id, &err.to_string());
        }
        decision
    }

    async fn decide(&self, user: &AuthenticatedUser, operation: &str, key_id: Option<&str>) -> AuthzResult<()> {
        if !user.has_permission(operation) {
            return Err(AuthzError::OperationNotAllowed(operation.to_string()));
        }

        let Some(key_id) = key_id else {
            return Ok(());
        };

        let authorized_contexts = self.key_context.authorized_contexts(key_id).await?;
        if authorized_contexts.contains(&user.id) {
            Ok(())
        } else {
            Err(AuthzError::InsufficientKeyPermissions)
        }
    }

    /// Drops every memoized decision that references `key_id`, per the
    /// spec's "invalidated on any write to the referenced key" rule.
    pub fn invalidate_key(&self, key_id: &str) {
        let suffix = format!("|{key_id}");
        self.decision_cache.invalidate_if(|k| k.ends_with(&suffix));
    }

    pub fn check_storage_profile(&self, tier: Tier, requested: StorageProfile) -> AuthzResult<()> {
        if tier.permits_storage_profile(requested) {
            Ok(())
        } else {
            Err(AuthzError::TierNotPermitted(tier.to_string(), requested.to_string()))
        }
    }
}

fn denial_for(operation: &str, key_id: Option<&str>) -> AuthzError {
    if key_id.is_some() {
        AuthzError::InsufficientKeyPermissions
    } else {
        AuthzError::OperationNotAllowed(operation.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cache::CacheConfig;
    use std::collections::HashSet;

    struct FixedContext(HashSet<String>);

    #[async_trait]
    impl KeyContextLookup for FixedContext {
        async fn authorized_contexts(&self, _key_id: &str) -> AuthzResult<HashSet<String>> {
            Ok(self.0.clone())
        }
    }

    struct RecordingSink(std::sync::Mutex<Vec<String>>);

    impl RecordingSink {
        fn new() -> Self {
            Self(std::sync::Mutex::new(Vec::new()))
        }
    }

    impl AuthzAuditSink for RecordingSink {
        fn record_denied(&self, user: &AuthenticatedUser, operation: &str, key_id: Option<&str>, _reason: &str) {
            self.0.lock().unwrap().push(format!("{}|{}|{}", user.id, operation, key_id.unwrap_or("")));
        }
    }

    fn authorizer(authorized: &[&str]) -> Authorizer {
        authorizer_with_sink(authorized, Arc::new(NoopAuditSink))
    }

    fn authorizer_with_sink(authorized: &[&str], audit: Arc<dyn AuthzAuditSink>) -> Authorizer {
        let contexts: HashSet<String> = authorized.iter().map(|s| s.to_string()).collect();
        Authorizer::new(
            Arc::new(TtlCache::new(CacheConfig::default())),
            Arc::new(FixedContext(contexts)),
            audit,
        )
    }

    fn user(id: &str, permissions: &[&str]) -> AuthenticatedUser {
        AuthenticatedUser {
            id: id.to_string(),
            permissions: permissions.iter().map(|s| s.to_string()).collect(),
            tier: Tier::Free,
        }
    }

    #[tokio::test]
    async fn wildcard_permission_allows_any_operation() {
        let authz = authorizer(&[]);
        let u = user("user-1", &["*"]);
        assert!(authz.authorize(&u, "keys:create", None).await.is_ok());
    }

    #[tokio::test]
    async fn missing_operation_permission_is_denied() {
        let authz = authorizer(&[]);
        let u = user("user-1", &["keys:read"]);
        let result = authz.authorize(&u, "keys:create", None).await;
        assert!(matches!(result, Err(AuthzError::OperationNotAllowed(_))));
    }

    #[tokio::test]
    async fn create_and_list_skip_the_resource_check() {
        let authz = authorizer(&["someone-else"]);
        let u = user("user-1", &["keys:create"]);
        assert!(authz.authorize(&u, "keys:create", None).await.is_ok());
    }

    #[tokio::test]
    async fn resource_check_denies_a_caller_outside_authorized_contexts() {
        let authz = authorizer(&["someone-else"]);
        let u = user("user-1", &["keys:rotate"]);
        let result = authz.authorize(&u, "keys:rotate", Some("key-a")).await;
        assert!(matches!(result, Err(AuthzError::InsufficientKeyPermissions)));
    }

    #[tokio::test]
    async fn resource_check_allows_a_caller_inside_authorized_contexts() {
        let authz = authorizer(&["user-1"]);
        let u = user("user-1", &["keys:rotate"]);
        assert!(authz.authorize(&u, "keys:rotate", Some("key-a")).await.is_ok());
    }

    #[tokio::test]
    async fn a_denied_decision_records_an_audit_event() {
        let sink = Arc::new(RecordingSink::new());
        let authz = authorizer_with_sink(&["someone-else"], sink.clone());
        let u = user("user-1", &["keys:rotate"]);
        authz.authorize(&u, "keys:rotate", Some("key-a")).await.unwrap_err();
        assert_eq!(sink.0.lock().unwrap().as_slice(), &["user-1|keys:rotate|key-a".to_string()]);
    }

    #[tokio::test]
    async fn a_cached_denial_records_an_audit_event_every_time() {
        let sink = Arc::new(RecordingSink::new());
        let authz = authorizer_with_sink(&["someone-else"], sink.clone());
        let u = user("user-1", &["keys:rotate"]);
        authz.authorize(&u, "keys:rotate", Some("key-a")).await.unwrap_err();
        authz.authorize(&u, "keys:rotate", Some("key-a")).await.unwrap_err();
        assert_eq!(sink.0.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn invalidate_key_clears_memoized_decisions_for_that_key() {
        let authz = authorizer(&["user-1"]);
        let u = user("user-1", &["keys:rotate"]);
        authz.authorize(&u, "keys:rotate", Some("key-a")).await.unwrap();
        authz.invalidate_key("key-a");
        assert_eq!(authz.decision_cache.len(), 0);
    }

    #[test]
    fn storage_profile_gate_rejects_free_tier_requesting_hardened() {
        let authz = authorizer(&[]);
        let result = authz.check_storage_profile(Tier::Free, StorageProfile::Hardened);
        assert!(matches!(result, Err(AuthzError::TierNotPermitted(_, _))));
    }
}
