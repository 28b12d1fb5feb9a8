//! Asynchronous batched persistence for audit events.
//! Grounded on the retry/backoff shape in `persistence::key_repository`'s
//! rotation loop, generalized from a single conditional update to a
//! batch-insert-with-retry.
//!
//! The producer side never blocks: [`AuditPipeline::submit`] uses
//! `try_send` and drops the event on a full channel rather than apply
//! backpressure to the caller's RPC.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rand::Rng;
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;

use persistence::{AuditEvent, AuditRepository};

use crate::config::AuditPipelineConfig;

const BASE_BACKOFF_MS: u64 = 50;
const JITTER_CEILING_MS: u64 = 100;

pub struct AuditPipeline {
    sender: mpsc::Sender<AuditEvent>,
    dropped_count: Arc<AtomicU64>,
}

impl AuditPipeline {
    pub fn new(repository: Arc<dyn AuditRepository>, config: AuditPipelineConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.channel_capacity);
        let receiver = Arc::new(Mutex::new(receiver));
        let dropped_count = Arc::new(AtomicU64::new(0));

        for worker_id in 0..config.worker_count.max(1) {
            let receiver = Arc::clone(&receiver);
            let repository = Arc::clone(&repository);
            tokio::spawn(worker_loop(worker_id, receiver, repository, config));
        }

        Self { sender, dropped_count }
    }

    /// Emits to the structured logger synchronously, then enqueues for
    /// batched persistence. Never blocks: on a full channel the event is
    /// dropped and `dropped_count` is incremented.
    pub fn submit(&self, event: AuditEvent) {
        tracing::info!(
            event_id = %event.id,
            event_type = %event.event_type,
            action = %event.action,
            result = %event.result,
            security_level = %event.security_level,
            "audit.emit"
        );

        if self.sender.try_send(event).is_err() {
            self.dropped_count.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(event = "audit.channel_full", "dropping audit event, persistence channel at capacity");
        }
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }
}

async fn worker_loop(
    worker_id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<AuditEvent>>>,
    repository: Arc<dyn AuditRepository>,
    config: AuditPipelineConfig,
) {
    loop {
        let batch = collect_batch(&receiver, &config).await;
        match batch {
            Some(events) if !events.is_empty() => {
                persist_with_retry(worker_id, repository.as_ref(), &events, &config).await;
            }
            Some(_) => continue,
            None => return,
        }
    }
}

/// Accumulates events until `batch_size` is reached or `batch_timeout`
/// elapses, whichever first. Returns `None` once the channel has closed
/// and drained.
async fn collect_batch(
    receiver: &Arc<Mutex<mpsc::Receiver<AuditEvent>>>,
    config: &AuditPipelineConfig,
) -> Option<Vec<AuditEvent>> {
    let mut batch = Vec::with_capacity(config.batch_size);
    let deadline = Instant::now() + config.batch_timeout;

    loop {
        if batch.len() >= config.batch_size {
            return Some(batch);
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Some(batch);
        }

        let mut guard = receiver.lock().await;
        match tokio::time::timeout(remaining, guard.recv()).await {
            Ok(Some(event)) => {
                drop(guard);
                batch.push(event);
            }
            Ok(None) => {
                drop(guard);
                return if batch.is_empty() { None } else { Some(batch) };
            }
            Err(_elapsed) => {
                drop(guard);
                return Some(batch);
            }
        }
    }
}

async fn persist_with_retry(
    worker_id: usize,
    repository: &dyn AuditRepository,
    events: &[AuditEvent],
    config: &AuditPipelineConfig,
) {
    for attempt in 1..=config.max_retry_attempts {
        match repository.insert_batch(events).await {
            Ok(()) => return,
            Err(err) if attempt < config.max_retry_attempts => {
                let backoff_ms = BASE_BACKOFF_MS * 2u64.pow(attempt - 1)
                    + rand::thread_rng().gen_range(0..JITTER_CEILING_MS);
                tracing::warn!(
                    worker_id,
                    attempt,
                    batch_size = events.len(),
                    error = %err,
                    "audit.batch_retry"
                );
                tokio::time::sleep(std::time::Duration::from_millis(backoff_ms)).await;
            }
            Err(err) => {
                tracing::error!(
                    worker_id,
                    attempts = attempt,
                    batch_size = events.len(),
                    error = %err,
                    "audit.batch_dropped"
                );
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use persistence::{AuditActor, AuditOutcome, AuditResource, PersistenceResult};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use uuid::Uuid;

    struct RecordingRepository {
        received: Arc<std::sync::Mutex<Vec<AuditEvent>>>,
        failures_remaining: AtomicUsize,
    }

    #[async_trait]
    impl AuditRepository for RecordingRepository {
        async fn insert_batch(&self, events: &[AuditEvent]) -> PersistenceResult<()> {
            if self.failures_remaining.load(Ordering::SeqCst) > 0 {
                self.failures_remaining.fetch_sub(1, Ordering::SeqCst);
                return Err(persistence::PersistenceError::ConnectionFailed("simulated".to_string()));
            }
            self.received.lock().unwrap().extend_from_slice(events);
            Ok(())
        }
    }

    fn sample_event() -> AuditEvent {
        AuditEvent {
            id: Uuid::new_v4(),
            timestamp: chrono::Utc::now(),
            event_type: "key.create".to_string(),
            action: "CreateKey".to_string(),
            result: AuditOutcome::Success,
            actor: AuditActor { user_id: Some("user-1".to_string()), client_ip: None, user_agent: None, session_id: None, tier: None },
            resource: AuditResource { resource_type: "key".to_string(), id: "key-1".to_string(), classification: "internal".to_string() },
            details: serde_json::Value::Null,
            security_level: "medium".to_string(),
            checksum: "deadbeef".to_string(),
        }
    }

    #[tokio::test]
    async fn submitted_events_eventually_reach_the_repository() {
        let received = Arc::new(std::sync::Mutex::new(Vec::new()));
        let repository = Arc::new(RecordingRepository { received: Arc::clone(&received), failures_remaining: AtomicUsize::new(0) });
        let config = AuditPipelineConfig {
            channel_capacity: 16,
            worker_count: 1,
            batch_size: 4,
            batch_timeout: Duration::from_millis(20),
            max_retry_attempts: 3,
        };
        let pipeline = AuditPipeline::new(repository, config);
        pipeline.submit(sample_event());
        pipeline.submit(sample_event());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(received.lock().unwrap().len(), 2);
        assert_eq!(pipeline.dropped_count(), 0);
    }

    #[tokio::test]
    async fn full_channel_drops_without_blocking() {
        let received = Arc::new(std::sync::Mutex::new(Vec::new()));
        let repository = Arc::new(RecordingRepository { received: Arc::clone(&received), failures_remaining: AtomicUsize::new(0) });
        let config = AuditPipelineConfig {
            channel_capacity: 1,
            worker_count: 0,
            batch_size: 1,
            batch_timeout: Duration::from_millis(10),
            max_retry_attempts: 1,
        };
        let pipeline = AuditPipeline::new(repository, config);
        pipeline.submit(sample_event());
        pipeline.submit(sample_event());
        pipeline.submit(sample_event());

        assert!(pipeline.dropped_count() >= 1);
    }

    #[tokio::test]
    async fn a_failing_batch_retries_then_succeeds() {
        let received = Arc::new(std::sync::Mutex::new(Vec::new()));
        let repository = Arc::new(RecordingRepository { received: Arc::clone(&received), failures_remaining: AtomicUsize::new(2) });
        let config = AuditPipelineConfig {
            channel_capacity: 16,
            worker_count: 1,
            batch_size: 1,
            batch_timeout: Duration::from_millis(20),
            max_retry_attempts: 3,
        };
        let pipeline = AuditPipeline::new(repository, config);
        pipeline.submit(sample_event());

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(received.lock().unwrap().len(), 1);
    }
}
