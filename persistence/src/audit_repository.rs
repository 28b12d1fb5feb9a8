//! Append-only audit event store. The repository only ever inserts; the
//! async batching/backoff policy around these calls lives in the audit
//! pipeline (`audit-engine`), not here.

use async_trait::async_trait;

use crate::connection::DbPool;
use crate::error::PersistenceResult;
use crate::models::AuditEvent;

#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn insert_batch(&self, events: &[AuditEvent]) -> PersistenceResult<()>;
}

pub struct PgAuditRepository {
    pool: DbPool,
}

impl PgAuditRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditRepository for PgAuditRepository {
    async fn insert_batch(&self, events: &[AuditEvent]) -> PersistenceResult<()> {
        if events.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.pool().begin().await?;
        for event in events {
            let actor_json = serde_json::to_value(&event.actor)
                .map_err(|e| crate::error::PersistenceError::InternalError(anyhow::anyhow!(e)))?;
            let resource_json = serde_json::to_value(&event.resource)
                .map_err(|e| crate::error::PersistenceError::InternalError(anyhow::anyhow!(e)))?;

            sqlx::query(
                "INSERT INTO audit_events (id, timestamp, event_type, action, result, \
                 actor_json, resource_json, details_json, security_level, checksum) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            )
            .bind(event.id)
            .bind(event.timestamp)
            .bind(&event.event_type)
            .bind(&event.action)
            .bind(event.result.to_string())
            .bind(actor_json)
            .bind(resource_json)
            .bind(&event.details)
            .bind(&event.security_level)
            .bind(&event.checksum)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(())
    }
}
