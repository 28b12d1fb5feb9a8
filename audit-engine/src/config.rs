use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct AuditPipelineConfig {
    /// Bounded channel capacity; a producer never blocks past this.
    pub channel_capacity: usize,
    pub worker_count: usize,
    pub batch_size: usize,
    pub batch_timeout: Duration,
    pub max_retry_attempts: u32,
}

impl Default for AuditPipelineConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 4096,
            worker_count: 2,
            batch_size: 100,
            batch_timeout: Duration::from_millis(500),
            max_retry_attempts: 3,
        }
    }
}
