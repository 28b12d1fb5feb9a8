//! Envelope encryption engine and key rotation pipeline for polykey.
//!
//! [`KeyService`] implements the business contract for each key
//! operation — authorize, generate/wrap a DEK via [`crypto::kms::KmsRegistry`],
//! persist via [`persistence::KeyRepository`], audit — and owns the
//! [`RotationPipeline`] that serializes rotation through a bounded worker
//! pool.

pub mod engine;
pub mod error;
pub mod key_context;
pub mod models;
pub mod rotation_pipeline;

pub use engine::KeyService;
pub use error::{KeyServiceError, KeyServiceResult};
pub use key_context::RepositoryKeyContextLookup;
pub use models::{BatchItemResult, CreateKeyRequest, RotationOutcome};
pub use rotation_pipeline::{RotationPipeline, RotationPipelineConfig};
