use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("encryption failed")]
    EncryptionFailed,

    #[error("decryption failed")]
    DecryptionFailed,

    #[error("invalid key")]
    InvalidKey,

    #[error("invalid key length: expected {expected}, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    #[error("invalid wrapped-key format")]
    InvalidFormat,

    #[error("key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("kms provider {provider} timed out after {elapsed_ms}ms")]
    ProviderTimeout { provider: String, elapsed_ms: u64 },

    #[error("kms provider {0} is unavailable")]
    ProviderUnavailable(String),

    #[error("kms provider {provider} does not serve tier {tier}")]
    ProviderTierMismatch { provider: String, tier: String },

    #[error("internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub type CryptoResult<T> = Result<T, CryptoError>;
