use crate::error::CryptoResult;
use async_trait::async_trait;
use error_common::Tier;
use std::time::Duration;
use zeroize::Zeroizing;

/// Identifies which concrete key a wrap/unwrap call is for, so a provider
/// can derive or look up the right key-encryption key.
#[derive(Debug, Clone)]
pub struct KeyHandle {
    pub key_id: String,
}

impl KeyHandle {
    pub fn new(key_id: impl Into<String>) -> Self {
        Self { key_id: key_id.into() }
    }
}

/// Hard ceiling every provider call is wrapped in.
pub const KMS_OPERATION_TIMEOUT: Duration = Duration::from_secs(1);

/// A pluggable DEK wrap/unwrap endpoint, keyed by provider name in
/// [`crate::kms::registry::KmsRegistry`].
///
/// Implementors should NOT apply their own timeout; [`crate::kms::registry`]
/// wraps every call in [`KMS_OPERATION_TIMEOUT`] uniformly so the timeout
/// can't be forgotten by a new provider.
#[async_trait]
pub trait KmsProvider: Send + Sync {
    /// Registry key this provider answers to (`"local"`, `"aws"`, ...).
    fn name(&self) -> &'static str;

    /// Whether this provider serves `tier`. Checked by the registry after
    /// name resolution, so a provider registered under the right name but
    /// configured for the wrong tiers fails `ProviderTierMismatch` instead
    /// of silently handling traffic it shouldn't.
    fn supports_tier(&self, tier: Tier) -> bool;

    /// Encrypts `plaintext_dek` under the key identified by `handle`. The
    /// returned ciphertext's layout is opaque to callers.
    async fn wrap(&self, plaintext_dek: &[u8], handle: &KeyHandle) -> CryptoResult<Vec<u8>>;

    /// Inverse of [`Self::wrap`]. Fails with `CryptoError::DecryptionFailed`
    /// (via `decrypt` errors) if ciphertext or handle don't match.
    async fn unwrap(&self, ciphertext: &[u8], handle: &KeyHandle) -> CryptoResult<Zeroizing<Vec<u8>>>;

    /// Liveness probe; cheap, side-effect free.
    async fn health_check(&self) -> CryptoResult<()>;
}
