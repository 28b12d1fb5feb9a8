use std::collections::HashMap;
use std::sync::Arc;

use error_common::Tier;
use zeroize::Zeroizing;

use crate::error::{CryptoError, CryptoResult};
use crate::kms::traits::{KeyHandle, KmsProvider, KMS_OPERATION_TIMEOUT};

/// Holds every configured [`KmsProvider`] by name and enforces tier gating
/// and the per-call timeout uniformly, so neither can be forgotten by a
/// call site or a new provider implementation.
pub struct KmsRegistry {
    providers: HashMap<&'static str, Arc<dyn KmsProvider>>,
}

impl KmsRegistry {
    pub fn new() -> Self {
        Self { providers: HashMap::new() }
    }

    pub fn register(&mut self, provider: Arc<dyn KmsProvider>) {
        self.providers.insert(provider.name(), provider);
    }

    /// Resolves the provider `tier` is permitted to use. Fails
    /// `ProviderUnavailable` if no provider is registered under the tier's
    /// assigned name at all, or `ProviderTierMismatch` if one is registered
    /// under that name but isn't configured to serve `tier`. Both map to
    /// `Internal` at the RPC boundary, but the distinction matters for logs
    /// and alerting: the first is a deployment gap, the second a config bug.
    fn provider_for(&self, tier: Tier) -> CryptoResult<&Arc<dyn KmsProvider>> {
        let name = tier.kms_provider_name();
        let provider = self
            .providers
            .get(name)
            .ok_or_else(|| CryptoError::ProviderUnavailable(name.to_string()))?;
        if !provider.supports_tier(tier) {
            return Err(CryptoError::ProviderTierMismatch { provider: name.to_string(), tier: tier.to_string() });
        }
        Ok(provider)
    }

    pub async fn wrap(&self, tier: Tier, plaintext_dek: &[u8], handle: &KeyHandle) -> CryptoResult<Vec<u8>> {
        let provider = self.provider_for(tier)?.clone();
        let name = provider.name();
        tokio::time::timeout(KMS_OPERATION_TIMEOUT, provider.wrap(plaintext_dek, handle))
            .await
            .map_err(|_| CryptoError::ProviderTimeout {
                provider: name.to_string(),
                elapsed_ms: KMS_OPERATION_TIMEOUT.as_millis() as u64,
            })?
    }

    pub async fn unwrap(&self, tier: Tier, ciphertext: &[u8], handle: &KeyHandle) -> CryptoResult<Zeroizing<Vec<u8>>> {
        let provider = self.provider_for(tier)?.clone();
        let name = provider.name();
        tokio::time::timeout(KMS_OPERATION_TIMEOUT, provider.unwrap(ciphertext, handle))
            .await
            .map_err(|_| CryptoError::ProviderTimeout {
                provider: name.to_string(),
                elapsed_ms: KMS_OPERATION_TIMEOUT.as_millis() as u64,
            })?
    }

    pub async fn health_check(&self, tier: Tier) -> CryptoResult<()> {
        let provider = self.provider_for(tier)?.clone();
        let name = provider.name();
        tokio::time::timeout(KMS_OPERATION_TIMEOUT, provider.health_check())
            .await
            .map_err(|_| CryptoError::ProviderTimeout {
                provider: name.to_string(),
                elapsed_ms: KMS_OPERATION_TIMEOUT.as_millis() as u64,
            })?
    }
}

impl Default for KmsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kms::local::{LocalKmsProvider, LoggingFallbackSink};
    use crate::kms::cloud::{CloudKmsConfig, CloudKmsProvider};
    use crate::aes_gcm::Aes256GcmEncryptor;

    #[tokio::test]
    async fn free_tier_resolves_to_local_provider() {
        let mut registry = KmsRegistry::new();
        registry.register(Arc::new(LocalKmsProvider::new(
            Aes256GcmEncryptor::generate_key(),
            false,
            Arc::new(LoggingFallbackSink),
        )));

        let handle = KeyHandle::new("key-1");
        let dek = Aes256GcmEncryptor::generate_key();
        let wrapped = registry.wrap(Tier::Free, &dek, &handle).await.unwrap();
        let unwrapped = registry.unwrap(Tier::Free, &wrapped, &handle).await.unwrap();
        assert_eq!(&dek[..], &unwrapped[..]);
    }

    #[tokio::test]
    async fn enterprise_tier_without_cloud_provider_registered_fails() {
        let mut registry = KmsRegistry::new();
        registry.register(Arc::new(LocalKmsProvider::new(
            Aes256GcmEncryptor::generate_key(),
            false,
            Arc::new(LoggingFallbackSink),
        )));

        let handle = KeyHandle::new("key-1");
        let dek = Aes256GcmEncryptor::generate_key();
        let result = registry.wrap(Tier::Enterprise, &dek, &handle).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn provider_registered_under_the_right_name_but_wrong_tier_is_a_mismatch_not_unavailable() {
        let mut registry = KmsRegistry::new();
        // Configured for Pro only; Enterprise also routes to "aws" by name.
        registry.register(Arc::new(CloudKmsProvider::new(CloudKmsConfig {
            provider_name: "aws",
            endpoint: "http://localhost".to_string(),
            key_arn: "arn:aws:kms:test".to_string(),
            tiers: vec![Tier::Pro],
        })));

        let handle = KeyHandle::new("key-1");
        let dek = Aes256GcmEncryptor::generate_key();
        let result = registry.wrap(Tier::Enterprise, &dek, &handle).await;

        assert!(matches!(result, Err(CryptoError::ProviderTierMismatch { .. })));
    }
}
