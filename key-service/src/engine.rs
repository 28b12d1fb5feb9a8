//! Envelope engine: implements the business contract for
//! each key operation on top of the authorizer, KMS registry, and key
//! repository.

use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use authz::{AuthenticatedUser, Authorizer};
use crypto::aes_gcm::Aes256GcmEncryptor;
use crypto::dek_pool::DekBufferPool;
use crypto::kms::{KeyHandle, KmsRegistry};
use persistence::{
    AuditActor, AuditOutcome, AuditResource, Key, KeyMetadata, KeyRepository, KeyStatus,
    MetadataPatch,
};

use crate::error::{KeyServiceError, KeyServiceResult};
use crate::models::{BatchItemResult, CreateKeyRequest, RotationOutcome};
use crate::rotation_pipeline::RotationPipeline;

pub struct KeyService {
    key_repository: Arc<dyn KeyRepository>,
    kms: Arc<KmsRegistry>,
    dek_pool: Arc<DekBufferPool>,
    authorizer: Arc<Authorizer>,
    audit: Arc<audit_engine::AuditLogger>,
    rotation: RotationPipeline,
}

fn actor_for(user: &AuthenticatedUser) -> AuditActor {
    AuditActor {
        user_id: Some(user.id.clone()),
        client_ip: None,
        user_agent: None,
        session_id: None,
        tier: Some(user.tier),
    }
}

fn key_resource(id: &str, classification: &str) -> AuditResource {
    AuditResource { resource_type: "key".to_string(), id: id.to_string(), classification: classification.to_string() }
}

/// A revoked key stays readable until `revoked_at + grace_period_seconds`,
/// if a grace window was ever requested for it.
fn within_grace_window(key: &Key) -> bool {
    let (Some(revoked_at), Some(grace_period_seconds)) = (key.revoked_at, key.grace_period_seconds) else {
        return false;
    };
    chrono::Utc::now() < revoked_at + chrono::Duration::seconds(grace_period_seconds)
}

impl KeyService {
    pub fn new(
        key_repository: Arc<dyn KeyRepository>,
        kms: Arc<KmsRegistry>,
        dek_pool: Arc<DekBufferPool>,
        authorizer: Arc<Authorizer>,
        audit: Arc<audit_engine::AuditLogger>,
        rotation: RotationPipeline,
    ) -> Self {
        Self { key_repository, kms, dek_pool, authorizer, audit, rotation }
    }

    pub async fn create_key(&self, requester: &AuthenticatedUser, request: CreateKeyRequest) -> KeyServiceResult<Key> {
        self.authorizer.authorize(requester, "keys:create", None).await?;
        self.authorizer.check_storage_profile(requester.tier, request.storage_profile)?;

        let id = Uuid::new_v4();
        let mut dek = self.dek_pool.acquire(&request.key_type);
        dek.copy_from_slice(&Aes256GcmEncryptor::generate_key());

        let handle = KeyHandle::new(id.to_string());
        let wrap_result = self.kms.wrap(request.tier, &dek[..], &handle).await;
        self.dek_pool.release(&request.key_type, dek);
        let ciphertext = wrap_result?;

        let metadata = KeyMetadata {
            description: request.description,
            tags: request.tags,
            authorized_contexts: request.initial_authorized_contexts,
            storage_profile: request.storage_profile,
            tier: request.tier,
        };

        let key = self.key_repository.create_key(id, &request.key_type, ciphertext, metadata).await;
        self.emit(requester, "key.create", "CreateKey", &id.to_string(), &key);
        Ok(key?)
    }

    pub async fn get_key(&self, requester: &AuthenticatedUser, id: Uuid) -> KeyServiceResult<Key> {
        self.authorizer.authorize(requester, "keys:read", Some(&id.to_string())).await?;
        let key = self.key_repository.get_key(id).await?;
        if key.status == KeyStatus::Revoked {
            if !within_grace_window(&key) {
                return Err(KeyServiceError::KeyRevoked(id.to_string()));
            }
            self.audit.record(
                "key.grace_window_read",
                "GetKey",
                AuditOutcome::Success,
                actor_for(requester),
                key_resource(&id.to_string(), "confidential"),
                json!({ "reason": "revoked key read within its grace window" }),
            );
        }
        Ok(key)
    }

    pub async fn rotate_key(
        &self,
        requester: &AuthenticatedUser,
        id: Uuid,
        grace_period_seconds: Option<i64>,
    ) -> KeyServiceResult<RotationOutcome> {
        self.authorizer.authorize(requester, "keys:rotate", Some(&id.to_string())).await?;
        let outcome = self.rotation.submit(id, requester.tier, grace_period_seconds).await;
        self.authorizer.invalidate_key(&id.to_string());
        outcome
    }

    pub async fn update_metadata(&self, requester: &AuthenticatedUser, id: Uuid, patch: MetadataPatch) -> KeyServiceResult<Key> {
        self.authorizer.authorize(requester, "keys:update", Some(&id.to_string())).await?;
        let key = self.key_repository.update_metadata(id, patch).await;
        self.emit(requester, "key.update_metadata", "UpdateKeyMetadata", &id.to_string(), &key);
        self.authorizer.invalidate_key(&id.to_string());
        Ok(key?)
    }

    pub async fn revoke_key(&self, requester: &AuthenticatedUser, id: Uuid) -> KeyServiceResult<Key> {
        self.authorizer.authorize(requester, "keys:revoke", Some(&id.to_string())).await?;
        let key = self.key_repository.revoke_key(id).await;
        self.emit(requester, "key.revoke", "RevokeKey", &id.to_string(), &key);
        self.authorizer.invalidate_key(&id.to_string());
        Ok(key?)
    }

    pub async fn list_keys(
        &self,
        requester: &AuthenticatedUser,
        page_token: Option<&str>,
        page_size: u32,
    ) -> KeyServiceResult<(Vec<Key>, Option<String>)> {
        self.authorizer.authorize(requester, "keys:list", None).await?;
        Ok(self.key_repository.list_keys(page_token, page_size).await?)
    }

    /// Items are processed in order with no cross-item transactionality;
    /// a per-item failure becomes a per-item error rather than failing
    /// the whole batch.
    pub async fn batch_create_keys(
        &self,
        requester: &AuthenticatedUser,
        requests: Vec<CreateKeyRequest>,
    ) -> Vec<BatchItemResult<Key>> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            results.push(BatchItemResult::from_result(self.create_key(requester, request).await));
        }
        results
    }

    pub async fn batch_get_keys(&self, requester: &AuthenticatedUser, ids: Vec<Uuid>) -> Vec<BatchItemResult<Key>> {
        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            results.push(BatchItemResult::from_result(self.get_key(requester, id).await));
        }
        results
    }

    pub async fn batch_rotate_keys(&self, requester: &AuthenticatedUser, ids: Vec<Uuid>) -> Vec<BatchItemResult<RotationOutcome>> {
        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            results.push(BatchItemResult::from_result(self.rotate_key(requester, id, None).await));
        }
        results
    }

    pub async fn batch_revoke_keys(&self, requester: &AuthenticatedUser, ids: Vec<Uuid>) -> Vec<BatchItemResult<Key>> {
        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            results.push(BatchItemResult::from_result(self.revoke_key(requester, id).await));
        }
        results
    }

    pub async fn batch_update_metadata(
        &self,
        requester: &AuthenticatedUser,
        patches: Vec<(Uuid, MetadataPatch)>,
    ) -> Vec<BatchItemResult<Key>> {
        let mut results = Vec::with_capacity(patches.len());
        for (id, patch) in patches {
            results.push(BatchItemResult::from_result(self.update_metadata(requester, id, patch).await));
        }
        results
    }

    fn emit(
        &self,
        requester: &AuthenticatedUser,
        event_type: &str,
        action: &str,
        key_id: &str,
        result: &persistence::PersistenceResult<Key>,
    ) {
        let outcome = if result.is_ok() { AuditOutcome::Success } else { AuditOutcome::Failure };
        let details = match result {
            Ok(_) => json!({}),
            Err(e) => json!({ "error": e.to_string() }),
        };
        self.audit.record(event_type, action, outcome, actor_for(requester), key_resource(key_id, "confidential"), details);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cache::{CacheConfig, TtlCache};
    use crypto::aes_gcm::Aes256GcmEncryptor;
    use crypto::kms::local::{LocalKmsProvider, LoggingFallbackSink};
    use error_common::{StorageProfile, Tier};
    use persistence::{AuditRepository, KeyMetadata, PersistenceError, PersistenceResult};
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    struct InMemoryKeyRepository {
        rows: Mutex<HashMap<Uuid, Vec<Key>>>,
    }

    impl InMemoryKeyRepository {
        fn new() -> Self {
            Self { rows: Mutex::new(HashMap::new()) }
        }
    }

    #[async_trait]
    impl KeyRepository for InMemoryKeyRepository {
        async fn create_key(&self, id: Uuid, key_type: &str, encrypted_dek: Vec<u8>, metadata: KeyMetadata) -> PersistenceResult<Key> {
            let mut rows = self.rows.lock().unwrap();
            if rows.contains_key(&id) {
                return Err(PersistenceError::KeyAlreadyExists(id.to_string()));
            }
            let now = chrono::Utc::now();
            let key = Key {
                id,
                version: 1,
                key_type: key_type.to_string(),
                encrypted_dek,
                status: KeyStatus::Active,
                metadata,
                created_at: now,
                updated_at: now,
                revoked_at: None,
                grace_period_seconds: None,
            };
            rows.insert(id, vec![key.clone()]);
            Ok(key)
        }

        async fn get_key(&self, id: Uuid) -> PersistenceResult<Key> {
            let rows = self.rows.lock().unwrap();
            let versions = rows.get(&id).ok_or_else(|| PersistenceError::KeyNotFound(id.to_string()))?;
            versions
                .iter()
                .find(|k| k.status == KeyStatus::Active)
                .or_else(|| versions.last())
                .cloned()
                .ok_or_else(|| PersistenceError::KeyNotFound(id.to_string()))
        }

        async fn get_key_version(&self, id: Uuid, version: i64) -> PersistenceResult<Key> {
            let rows = self.rows.lock().unwrap();
            rows.get(&id)
                .and_then(|versions| versions.iter().find(|k| k.version == version))
                .cloned()
                .ok_or(PersistenceError::KeyVersionNotFound(id.to_string(), version))
        }

        async fn rotate_key(&self, id: Uuid, new_ciphertext: Vec<u8>, grace_period_seconds: Option<i64>) -> PersistenceResult<Key> {
            let mut rows = self.rows.lock().unwrap();
            let versions = rows.get_mut(&id).ok_or_else(|| PersistenceError::KeyNotFound(id.to_string()))?;
            let current_index = versions
                .iter()
                .position(|k| k.status == KeyStatus::Active)
                .ok_or_else(|| PersistenceError::KeyNotRotatable(id.to_string()))?;
            versions[current_index].status = KeyStatus::Rotated;
            let mut new_key = versions[current_index].clone();
            new_key.version += 1;
            new_key.status = KeyStatus::Active;
            new_key.encrypted_dek = new_ciphertext;
            if grace_period_seconds.is_some() {
                new_key.grace_period_seconds = grace_period_seconds;
            }
            versions.push(new_key.clone());
            Ok(new_key)
        }

        async fn update_metadata(&self, id: Uuid, patch: persistence::MetadataPatch) -> PersistenceResult<Key> {
            let mut rows = self.rows.lock().unwrap();
            let versions = rows.get_mut(&id).ok_or_else(|| PersistenceError::KeyNotFound(id.to_string()))?;
            let current = versions
                .iter_mut()
                .find(|k| k.status == KeyStatus::Active)
                .ok_or_else(|| PersistenceError::KeyNotFound(id.to_string()))?;
            current.metadata.apply_patch(patch);
            Ok(current.clone())
        }

        async fn revoke_key(&self, id: Uuid) -> PersistenceResult<Key> {
            let mut rows = self.rows.lock().unwrap();
            let versions = rows.get_mut(&id).ok_or_else(|| PersistenceError::KeyNotFound(id.to_string()))?;
            if let Some(current) = versions.iter_mut().find(|k| k.status == KeyStatus::Active) {
                current.status = KeyStatus::Revoked;
                current.revoked_at = Some(chrono::Utc::now());
                return Ok(current.clone());
            }
            versions
                .iter()
                .find(|k| k.status == KeyStatus::Revoked)
                .cloned()
                .ok_or_else(|| PersistenceError::KeyNotFound(id.to_string()))
        }

        async fn list_keys(&self, _page_token: Option<&str>, page_size: u32) -> PersistenceResult<(Vec<Key>, Option<String>)> {
            let rows = self.rows.lock().unwrap();
            let mut active: Vec<Key> = rows.values().flatten().filter(|k| k.status == KeyStatus::Active).cloned().collect();
            active.truncate(page_size as usize);
            Ok((active, None))
        }
    }

    struct NoopAuditRepository;

    #[async_trait]
    impl AuditRepository for NoopAuditRepository {
        async fn insert_batch(&self, _events: &[persistence::AuditEvent]) -> PersistenceResult<()> {
            Ok(())
        }
    }

    struct FixedKeyContext;

    #[async_trait]
    impl authz::KeyContextLookup for FixedKeyContext {
        async fn authorized_contexts(&self, _key_id: &str) -> authz::AuthzResult<HashSet<String>> {
            Ok(HashSet::from(["user-1".to_string()]))
        }
    }

    fn test_service() -> KeyService {
        let key_repository: Arc<dyn KeyRepository> = Arc::new(InMemoryKeyRepository::new());

        let mut kms = KmsRegistry::new();
        kms.register(Arc::new(LocalKmsProvider::new(Aes256GcmEncryptor::generate_key(), false, Arc::new(LoggingFallbackSink))));
        let kms = Arc::new(kms);

        let dek_pool = Arc::new(DekBufferPool::new());
        let authorizer = Arc::new(Authorizer::new(
            Arc::new(TtlCache::new(CacheConfig::default())),
            Arc::new(FixedKeyContext),
            Arc::new(authz::NoopAuditSink),
        ));
        let audit = Arc::new(audit_engine::AuditLogger::new(Arc::new(NoopAuditRepository), audit_engine::AuditPipelineConfig::default()));
        let rotation = RotationPipeline::new(
            Arc::clone(&key_repository),
            Arc::clone(&kms),
            Arc::clone(&dek_pool),
            Arc::clone(&audit),
            crate::rotation_pipeline::RotationPipelineConfig::default(),
        );

        KeyService::new(key_repository, kms, dek_pool, authorizer, audit, rotation)
    }

    fn user(permissions: &[&str], tier: Tier) -> AuthenticatedUser {
        AuthenticatedUser { id: "user-1".to_string(), permissions: permissions.iter().map(|s| s.to_string()).collect(), tier }
    }

    fn create_request() -> CreateKeyRequest {
        CreateKeyRequest {
            key_type: "AES_256".to_string(),
            tier: Tier::Free,
            storage_profile: StorageProfile::Standard,
            initial_authorized_contexts: HashSet::from(["user-1".to_string()]),
            description: Some("test key".to_string()),
            tags: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let service = test_service();
        let requester = user(&["*"], Tier::Free);

        let created = service.create_key(&requester, create_request()).await.unwrap();
        let fetched = service.get_key(&requester, created.id).await.unwrap();
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.status, KeyStatus::Active);
    }

    #[tokio::test]
    async fn create_rejects_storage_profile_above_tier_ceiling() {
        let service = test_service();
        let requester = user(&["*"], Tier::Free);
        let mut request = create_request();
        request.storage_profile = StorageProfile::Hardened;

        let result = service.create_key(&requester, request).await;
        assert!(matches!(result, Err(KeyServiceError::Authz(_))));
    }

    #[tokio::test]
    async fn rotate_then_revoke_and_get_fails() {
        let service = test_service();
        let requester = user(&["*"], Tier::Free);

        let created = service.create_key(&requester, create_request()).await.unwrap();
        let rotated = service.rotate_key(&requester, created.id, None).await.unwrap();
        assert_eq!(rotated.previous_version, 1);
        assert_eq!(rotated.new_version, 2);

        service.revoke_key(&requester, created.id).await.unwrap();
        let result = service.get_key(&requester, created.id).await;
        assert!(matches!(result, Err(KeyServiceError::KeyRevoked(_))));
    }

    #[tokio::test]
    async fn a_grace_window_keeps_a_revoked_key_readable() {
        let service = test_service();
        let requester = user(&["*"], Tier::Free);

        let created = service.create_key(&requester, create_request()).await.unwrap();
        service.rotate_key(&requester, created.id, Some(60)).await.unwrap();
        service.revoke_key(&requester, created.id).await.unwrap();

        let fetched = service.get_key(&requester, created.id).await.unwrap();
        assert_eq!(fetched.status, KeyStatus::Revoked);
    }

    #[tokio::test]
    async fn missing_permission_is_denied() {
        let service = test_service();
        let requester = user(&["keys:read"], Tier::Free);

        let result = service.create_key(&requester, create_request()).await;
        assert!(matches!(result, Err(KeyServiceError::Authz(_))));
    }
}
