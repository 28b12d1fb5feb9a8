//! The local KMS provider: a KDF-derived AES-256-GCM wrap/unwrap, reproducible
//! bit-for-bit from a single base64-encoded master key.

use std::sync::Arc;

use async_trait::async_trait;
use zeroize::Zeroizing;

use crate::envelope::{unwrap_dek, wrap_dek};
use crate::error::{CryptoError, CryptoResult};
use crate::kdf::Kdf;
use crate::kms::traits::{KeyHandle, KmsProvider};
use error_common::Tier;

const SALT_PREFIX: &str = "polykey-salt:";

/// Notified when [`LocalKmsProvider`] falls back to decrypting with the raw
/// master key instead of the KDF-derived one. Implemented by the
/// composition root and wired to the audit pipeline — `crypto` itself
/// doesn't depend on `audit-engine` to avoid a dependency cycle.
pub trait LegacyFallbackSink: Send + Sync {
    fn record_legacy_fallback(&self, key_id: &str);
}

/// A sink that only logs; used where no audit pipeline is wired (tests,
/// standalone tools).
pub struct LoggingFallbackSink;

impl LegacyFallbackSink for LoggingFallbackSink {
    fn record_legacy_fallback(&self, key_id: &str) {
        tracing::warn!(key_id, event = "kms.legacy_fallback", "decrypted with raw master key");
    }
}

pub struct LocalKmsProvider {
    master_key: [u8; 32],
    /// Migration path for pre-KDF ciphertexts, disabled by default since
    /// it widens the decryption oracle indefinitely if left on.
    allow_legacy_fallback: bool,
    fallback_sink: Arc<dyn LegacyFallbackSink>,
}

impl LocalKmsProvider {
    pub fn new(master_key: [u8; 32], allow_legacy_fallback: bool, fallback_sink: Arc<dyn LegacyFallbackSink>) -> Self {
        Self { master_key, allow_legacy_fallback, fallback_sink }
    }

    fn derive_key(&self, key_id: &str) -> CryptoResult<[u8; 32]> {
        let salt = format!("{SALT_PREFIX}{key_id}");
        Kdf::derive_aes256_key(&self.master_key, salt.as_bytes(), key_id.as_bytes())
            .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))
    }
}

#[async_trait]
impl KmsProvider for LocalKmsProvider {
    fn name(&self) -> &'static str {
        "local"
    }

    fn supports_tier(&self, tier: Tier) -> bool {
        tier == Tier::Free
    }

    async fn wrap(&self, plaintext_dek: &[u8], handle: &KeyHandle) -> CryptoResult<Vec<u8>> {
        let derived = self.derive_key(&handle.key_id)?;
        wrap_dek(&derived, plaintext_dek)
    }

    async fn unwrap(&self, ciphertext: &[u8], handle: &KeyHandle) -> CryptoResult<Zeroizing<Vec<u8>>> {
        let derived = self.derive_key(&handle.key_id)?;
        match unwrap_dek(&derived, ciphertext) {
            Ok(dek) => Ok(dek),
            Err(_) if self.allow_legacy_fallback => {
                let result = unwrap_dek(&self.master_key, ciphertext);
                if result.is_ok() {
                    self.fallback_sink.record_legacy_fallback(&handle.key_id);
                }
                result
            }
            Err(e) => Err(e),
        }
    }

    async fn health_check(&self) -> CryptoResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aes_gcm::Aes256GcmEncryptor;

    fn provider(allow_legacy_fallback: bool) -> LocalKmsProvider {
        LocalKmsProvider::new(
            Aes256GcmEncryptor::generate_key(),
            allow_legacy_fallback,
            Arc::new(LoggingFallbackSink),
        )
    }

    #[tokio::test]
    async fn wrap_then_unwrap_round_trips() {
        let provider = provider(false);
        let handle = KeyHandle::new("key-1");
        let dek = Aes256GcmEncryptor::generate_key();

        let wrapped = provider.wrap(&dek, &handle).await.unwrap();
        let unwrapped = provider.unwrap(&wrapped, &handle).await.unwrap();

        assert_eq!(&dek[..], &unwrapped[..]);
    }

    #[tokio::test]
    async fn different_key_ids_derive_different_keys() {
        let provider = provider(false);
        let dek = Aes256GcmEncryptor::generate_key();

        let wrapped = provider.wrap(&dek, &KeyHandle::new("key-1")).await.unwrap();
        let result = provider.unwrap(&wrapped, &KeyHandle::new("key-2")).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn legacy_fallback_disabled_by_default_rejects_raw_master_key_ciphertext() {
        let master_key = Aes256GcmEncryptor::generate_key();
        let provider = LocalKmsProvider::new(master_key, false, Arc::new(LoggingFallbackSink));
        let dek = Aes256GcmEncryptor::generate_key();

        // Ciphertext produced against the raw master key, bypassing the KDF,
        // as a pre-migration row would have been.
        let legacy_ciphertext = crate::envelope::wrap_dek(&master_key, &dek).unwrap();

        let result = provider.unwrap(&legacy_ciphertext, &KeyHandle::new("key-1")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn legacy_fallback_enabled_decrypts_pre_kdf_ciphertext() {
        let master_key = Aes256GcmEncryptor::generate_key();
        let provider = LocalKmsProvider::new(master_key, true, Arc::new(LoggingFallbackSink));
        let dek = Aes256GcmEncryptor::generate_key();

        let legacy_ciphertext = crate::envelope::wrap_dek(&master_key, &dek).unwrap();

        let unwrapped = provider.unwrap(&legacy_ciphertext, &KeyHandle::new("key-1")).await.unwrap();
        assert_eq!(&dek[..], &unwrapped[..]);
    }
}
