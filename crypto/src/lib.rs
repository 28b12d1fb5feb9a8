//! Envelope encryption and KMS provider registry for polykey.
//!
//! # Key Features
//!
//! - **Envelope encryption**: [`envelope::wrap_dek`]/[`envelope::unwrap_dek`]
//!   wrap a data-encryption key under a key-encryption key.
//! - **KMS Provider Registry**: [`kms::KmsRegistry`] dispatches to a named
//!   provider ([`kms::LocalKmsProvider`], [`kms::CloudKmsProvider`]) gated
//!   on caller tier, under a uniform 1-second timeout.
//! - **DEK buffer pool**: [`dek_pool::DekBufferPool`] reuses pre-zeroed
//!   32-byte buffers instead of allocating fresh ones per key generation.
//! - **Constant-time comparison** ([`constant_time`]) and **memory
//!   locking** ([`memory_security`]) for handling key material safely.
//!
//! # Example
//!
//! ```ignore
//! use crypto::kms::{KmsRegistry, KeyHandle, LocalKmsProvider};
//! use error_common::Tier;
//!
//! let mut registry = KmsRegistry::new();
//! registry.register(Arc::new(local_provider));
//! let wrapped = registry.wrap(Tier::Free, &dek, &KeyHandle::new("key-1")).await?;
//! ```

pub mod aes_gcm;
pub mod constant_time;
pub mod dek_pool;
pub mod envelope;
pub mod error;
pub mod kdf;
pub mod kms;
pub mod memory_security;

pub use dek_pool::DekBufferPool;
pub use error::{CryptoError, CryptoResult};
