use std::collections::{HashMap, HashSet};

use error_common::{StorageProfile, Tier};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct CreateKeyRequest {
    pub key_type: String,
    pub tier: Tier,
    pub storage_profile: StorageProfile,
    pub initial_authorized_contexts: HashSet<String>,
    pub description: Option<String>,
    pub tags: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct RotationOutcome {
    pub key_id: Uuid,
    pub previous_version: i64,
    pub new_version: i64,
}

/// The unit of work the rotation pipeline queues and distributes across
/// its worker pool.
pub(crate) struct RotationJob {
    pub key_id: Uuid,
    pub tier: Tier,
    pub grace_period_seconds: Option<i64>,
    pub respond_to: tokio::sync::oneshot::Sender<crate::error::KeyServiceResult<RotationOutcome>>,
}

/// Per-item outcome for a batch operation; the batch call itself succeeds
/// once authenticated/authorized, with individual failures surfaced here.
#[derive(Debug, Clone)]
pub enum BatchItemResult<T> {
    Ok(T),
    Err { message: String },
}

impl<T> BatchItemResult<T> {
    pub fn from_result<E: std::fmt::Display>(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => BatchItemResult::Ok(value),
            Err(err) => BatchItemResult::Err { message: err.to_string() },
        }
    }
}
