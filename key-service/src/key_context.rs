//! Bridges the authorizer's resource check to the key store without
//! `authz` depending on `persistence` directly (mirrors the
//! `TokenEventSink` injection pattern in `auth-core`).

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use authz::{AuthzError, AuthzResult, KeyContextLookup};
use persistence::KeyRepository;

pub struct RepositoryKeyContextLookup {
    repository: Arc<dyn KeyRepository>,
}

impl RepositoryKeyContextLookup {
    pub fn new(repository: Arc<dyn KeyRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl KeyContextLookup for RepositoryKeyContextLookup {
    async fn authorized_contexts(&self, key_id: &str) -> AuthzResult<HashSet<String>> {
        let id = Uuid::from_str(key_id)
            .map_err(|e| AuthzError::InternalError(anyhow::anyhow!(e)))?;
        let key = self
            .repository
            .get_key(id)
            .await
            .map_err(|e| AuthzError::InternalError(anyhow::anyhow!(e)))?;
        Ok(key.metadata.authorized_contexts)
    }
}
