use std::sync::Arc;

use serde_json::Value;

use persistence::{AuditActor, AuditOutcome, AuditRepository, AuditResource};

use crate::builder::AuditEventBuilder;
use crate::config::AuditPipelineConfig;
use crate::pipeline::AuditPipeline;

/// The single entry point the rest of the service calls to record an
/// audit event; owns the batching pipeline so callers never see the
/// channel/worker machinery directly.
pub struct AuditLogger {
    pipeline: AuditPipeline,
}

impl AuditLogger {
    pub fn new(repository: Arc<dyn AuditRepository>, config: AuditPipelineConfig) -> Self {
        Self { pipeline: AuditPipeline::new(repository, config) }
    }

    pub fn record(
        &self,
        event_type: &str,
        action: &str,
        result: AuditOutcome,
        actor: AuditActor,
        resource: AuditResource,
        details: Value,
    ) {
        let event = AuditEventBuilder::new(event_type, action, result, actor, resource)
            .details(details)
            .build();
        self.pipeline.submit(event);
    }

    pub fn dropped_count(&self) -> u64 {
        self.pipeline.dropped_count()
    }
}
