//! Key rotation pipeline: a bounded queue of rotation
//! requests drained by N worker coroutines, each returning its result on
//! a request-scoped oneshot channel. Grounded on the audit pipeline's
//! shared-receiver worker pool, generalized from fire-and-forget batching
//! to request/response with backpressure on enqueue instead of on drain.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::{mpsc, oneshot, Mutex};
use uuid::Uuid;

use crypto::aes_gcm::Aes256GcmEncryptor;
use crypto::dek_pool::DekBufferPool;
use crypto::kms::{KeyHandle, KmsRegistry};
use error_common::Tier;
use persistence::{AuditActor, AuditOutcome, AuditResource, KeyRepository};

use crate::error::{KeyServiceError, KeyServiceResult};
use crate::models::{RotationJob, RotationOutcome};

#[derive(Debug, Clone, Copy)]
pub struct RotationPipelineConfig {
    pub queue_capacity: usize,
    pub worker_count: usize,
}

impl Default for RotationPipelineConfig {
    fn default() -> Self {
        Self { queue_capacity: 256, worker_count: 4 }
    }
}

pub struct RotationPipeline {
    sender: mpsc::Sender<RotationJob>,
}

impl RotationPipeline {
    pub fn new(
        key_repository: Arc<dyn KeyRepository>,
        kms: Arc<KmsRegistry>,
        dek_pool: Arc<DekBufferPool>,
        audit: Arc<audit_engine::AuditLogger>,
        config: RotationPipelineConfig,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity);
        let receiver = Arc::new(Mutex::new(receiver));

        for _ in 0..config.worker_count.max(1) {
            let receiver = Arc::clone(&receiver);
            let key_repository = Arc::clone(&key_repository);
            let kms = Arc::clone(&kms);
            let dek_pool = Arc::clone(&dek_pool);
            let audit = Arc::clone(&audit);
            tokio::spawn(worker_loop(receiver, key_repository, kms, dek_pool, audit));
        }

        Self { sender }
    }

    /// Enqueues a rotation and awaits its result. Returns
    /// `BackpressureExceeded` immediately, without blocking, if the queue
    /// is full.
    pub async fn submit(
        &self,
        key_id: Uuid,
        tier: Tier,
        grace_period_seconds: Option<i64>,
    ) -> KeyServiceResult<RotationOutcome> {
        let (respond_to, receiver) = oneshot::channel();
        self.sender
            .try_send(RotationJob { key_id, tier, grace_period_seconds, respond_to })
            .map_err(|_| KeyServiceError::BackpressureExceeded)?;

        receiver.await.map_err(|_| KeyServiceError::RotationCancelled)?
    }
}

async fn worker_loop(
    receiver: Arc<Mutex<mpsc::Receiver<RotationJob>>>,
    key_repository: Arc<dyn KeyRepository>,
    kms: Arc<KmsRegistry>,
    dek_pool: Arc<DekBufferPool>,
    audit: Arc<audit_engine::AuditLogger>,
) {
    loop {
        let job = {
            let mut guard = receiver.lock().await;
            guard.recv().await
        };
        let Some(job) = job else { return };

        let result = rotate_once(&job, &key_repository, &kms, &dek_pool).await;

        audit.record(
            "key.rotate",
            "RotateKey",
            if result.is_ok() { AuditOutcome::Success } else { AuditOutcome::Failure },
            AuditActor { user_id: None, client_ip: None, user_agent: None, session_id: None, tier: Some(job.tier) },
            AuditResource { resource_type: "key".to_string(), id: job.key_id.to_string(), classification: "confidential".to_string() },
            json!({}),
        );

        // Cancellation of the caller only drops the receiver; the rotation
        // above has already committed or rolled back atomically.
        let _ = job.respond_to.send(result);
    }
}

async fn rotate_once(
    job: &RotationJob,
    key_repository: &Arc<dyn KeyRepository>,
    kms: &Arc<KmsRegistry>,
    dek_pool: &Arc<DekBufferPool>,
) -> KeyServiceResult<RotationOutcome> {
    let current = key_repository.get_key(job.key_id).await?;

    let mut dek = dek_pool.acquire(&current.key_type);
    dek.copy_from_slice(&Aes256GcmEncryptor::generate_key());

    let handle = KeyHandle::new(job.key_id.to_string());
    let wrap_result = kms.wrap(job.tier, &dek[..], &handle).await;
    dek_pool.release(&current.key_type, dek);
    let ciphertext = wrap_result?;

    let rotated = key_repository.rotate_key(job.key_id, ciphertext, job.grace_period_seconds).await?;

    Ok(RotationOutcome {
        key_id: job.key_id,
        previous_version: rotated.version - 1,
        new_version: rotated.version,
    })
}
