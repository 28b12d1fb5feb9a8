//! Versioned key store. `PgKeyRepository` is the only
//! writer of the `keys` table; every mutation to a row's `status` happens
//! inside a transaction so the single-active invariant always holds.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::connection::DbPool;
use crate::error::{PersistenceError, PersistenceResult};
use crate::models::{Key, KeyMetadata, KeyRow, KeyStatus, MetadataPatch};
use crate::pagination::PageToken;

const MAX_ROTATION_ATTEMPTS: u32 = 3;
const BASE_BACKOFF_MS: u64 = 50;
const JITTER_CEILING_MS: u64 = 100;

#[async_trait]
pub trait KeyRepository: Send + Sync {
    async fn create_key(
        &self,
        id: Uuid,
        key_type: &str,
        encrypted_dek: Vec<u8>,
        metadata: KeyMetadata,
    ) -> PersistenceResult<Key>;

    async fn get_key(&self, id: Uuid) -> PersistenceResult<Key>;

    async fn get_key_version(&self, id: Uuid, version: i64) -> PersistenceResult<Key>;

    async fn rotate_key(
        &self,
        id: Uuid,
        new_ciphertext: Vec<u8>,
        grace_period_seconds: Option<i64>,
    ) -> PersistenceResult<Key>;

    async fn update_metadata(&self, id: Uuid, patch: MetadataPatch) -> PersistenceResult<Key>;

    async fn revoke_key(&self, id: Uuid) -> PersistenceResult<Key>;

    async fn list_keys(
        &self,
        page_token: Option<&str>,
        page_size: u32,
    ) -> PersistenceResult<(Vec<Key>, Option<String>)>;
}

pub struct PgKeyRepository {
    pool: DbPool,
}

impl PgKeyRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn try_rotate_once(
        &self,
        id: Uuid,
        new_ciphertext: &[u8],
        grace_period_seconds: Option<i64>,
    ) -> PersistenceResult<Key> {
        let mut tx = self.pool.pool().begin().await?;

        let current: Option<KeyRow> = sqlx::query_as(
            "SELECT id, version, key_type, encrypted_dek, status, description, \
             tags_json, authorized_contexts_json, tier, storage_profile, \
             created_at, updated_at, revoked_at, grace_period_seconds \
             FROM keys WHERE id = $1 ORDER BY version DESC LIMIT 1",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let current = current.ok_or_else(|| PersistenceError::KeyNotFound(id.to_string()))?;
        if current.status != "Active" {
            return Err(PersistenceError::KeyNotRotatable(id.to_string()));
        }

        let now = Utc::now();
        let rotated = sqlx::query(
            "UPDATE keys SET status = 'Rotated', updated_at = $3 \
             WHERE id = $1 AND version = $2 AND status = 'Active'",
        )
        .bind(id)
        .bind(current.version)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if rotated.rows_affected() != 1 {
            return Err(PersistenceError::RotationConflict(id.to_string()));
        }

        let new_version = current.version + 1;
        let grace_period_seconds = grace_period_seconds.or(current.grace_period_seconds);
        let new_row: KeyRow = sqlx::query_as(
            "INSERT INTO keys (id, version, key_type, encrypted_dek, status, description, \
             tags_json, authorized_contexts_json, tier, storage_profile, created_at, updated_at, \
             grace_period_seconds) \
             VALUES ($1, $2, $3, $4, 'Active', $5, $6, $7, $8, $9, $10, $10, $11) \
             RETURNING id, version, key_type, encrypted_dek, status, description, \
             tags_json, authorized_contexts_json, tier, storage_profile, \
             created_at, updated_at, revoked_at, grace_period_seconds",
        )
        .bind(id)
        .bind(new_version)
        .bind(&current.key_type)
        .bind(new_ciphertext)
        .bind(&current.description)
        .bind(&current.tags_json)
        .bind(&current.authorized_contexts_json)
        .bind(&current.tier)
        .bind(&current.storage_profile)
        .bind(now)
        .bind(grace_period_seconds)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        new_row.into_key()
    }
}

#[async_trait]
impl KeyRepository for PgKeyRepository {
    async fn create_key(
        &self,
        id: Uuid,
        key_type: &str,
        encrypted_dek: Vec<u8>,
        metadata: KeyMetadata,
    ) -> PersistenceResult<Key> {
        let now = Utc::now();
        let tags_json = serde_json::to_value(&metadata.tags)
            .map_err(|e| PersistenceError::InternalError(anyhow::anyhow!(e)))?;
        let contexts_json = serde_json::to_value(&metadata.authorized_contexts)
            .map_err(|e| PersistenceError::InternalError(anyhow::anyhow!(e)))?;

        let row: Result<KeyRow, sqlx::Error> = sqlx::query_as(
            "INSERT INTO keys (id, version, key_type, encrypted_dek, status, description, \
             tags_json, authorized_contexts_json, tier, storage_profile, created_at, updated_at) \
             VALUES ($1, 1, $2, $3, 'Active', $4, $5, $6, $7, $8, $9, $9) \
             RETURNING id, version, key_type, encrypted_dek, status, description, \
             tags_json, authorized_contexts_json, tier, storage_profile, \
             created_at, updated_at, revoked_at, grace_period_seconds",
        )
        .bind(id)
        .bind(key_type)
        .bind(encrypted_dek)
        .bind(&metadata.description)
        .bind(tags_json)
        .bind(contexts_json)
        .bind(metadata.tier.to_string())
        .bind(metadata.storage_profile.to_string())
        .bind(now)
        .fetch_one(self.pool.pool())
        .await;

        match row {
            Ok(row) => row.into_key(),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(PersistenceError::KeyAlreadyExists(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_key(&self, id: Uuid) -> PersistenceResult<Key> {
        let row: Option<KeyRow> = sqlx::query_as(
            "SELECT id, version, key_type, encrypted_dek, status, description, \
             tags_json, authorized_contexts_json, tier, storage_profile, \
             created_at, updated_at, revoked_at, grace_period_seconds \
             FROM keys WHERE id = $1 AND status = 'Active'",
        )
        .bind(id)
        .fetch_optional(self.pool.pool())
        .await?;

        if let Some(row) = row {
            return row.into_key();
        }

        let row: Option<KeyRow> = sqlx::query_as(
            "SELECT id, version, key_type, encrypted_dek, status, description, \
             tags_json, authorized_contexts_json, tier, storage_profile, \
             created_at, updated_at, revoked_at, grace_period_seconds \
             FROM keys WHERE id = $1 ORDER BY version DESC LIMIT 1",
        )
        .bind(id)
        .fetch_optional(self.pool.pool())
        .await?;

        row.ok_or_else(|| PersistenceError::KeyNotFound(id.to_string()))?
            .into_key()
    }

    async fn get_key_version(&self, id: Uuid, version: i64) -> PersistenceResult<Key> {
        let row: Option<KeyRow> = sqlx::query_as(
            "SELECT id, version, key_type, encrypted_dek, status, description, \
             tags_json, authorized_contexts_json, tier, storage_profile, \
             created_at, updated_at, revoked_at, grace_period_seconds \
             FROM keys WHERE id = $1 AND version = $2",
        )
        .bind(id)
        .bind(version)
        .fetch_optional(self.pool.pool())
        .await?;

        row.ok_or(PersistenceError::KeyVersionNotFound(id.to_string(), version))?
            .into_key()
    }

    async fn rotate_key(
        &self,
        id: Uuid,
        new_ciphertext: Vec<u8>,
        grace_period_seconds: Option<i64>,
    ) -> PersistenceResult<Key> {
        let mut attempt: u32 = 0;
        loop {
            match self.try_rotate_once(id, &new_ciphertext, grace_period_seconds).await {
                Ok(key) => return Ok(key),
                Err(PersistenceError::RotationConflict(_)) if attempt < MAX_ROTATION_ATTEMPTS => {
                    attempt += 1;
                    let backoff = BASE_BACKOFF_MS * 2u64.pow(attempt - 1);
                    let jitter = rand::random::<u64>() % JITTER_CEILING_MS;
                    tokio::time::sleep(Duration::from_millis(backoff + jitter)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn update_metadata(&self, id: Uuid, patch: MetadataPatch) -> PersistenceResult<Key> {
        let mut tx = self.pool.pool().begin().await?;

        let current: Option<KeyRow> = sqlx::query_as(
            "SELECT id, version, key_type, encrypted_dek, status, description, \
             tags_json, authorized_contexts_json, tier, storage_profile, \
             created_at, updated_at, revoked_at, grace_period_seconds \
             FROM keys WHERE id = $1 AND status = 'Active'",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let current = current.ok_or_else(|| PersistenceError::KeyNotFound(id.to_string()))?;
        let mut key = current.clone().into_key()?;
        key.metadata.apply_patch(patch);

        let tags_json = serde_json::to_value(&key.metadata.tags)
            .map_err(|e| PersistenceError::InternalError(anyhow::anyhow!(e)))?;
        let contexts_json = serde_json::to_value(&key.metadata.authorized_contexts)
            .map_err(|e| PersistenceError::InternalError(anyhow::anyhow!(e)))?;
        let now = Utc::now();

        let updated: KeyRow = sqlx::query_as(
            "UPDATE keys SET description = $2, tags_json = $3, authorized_contexts_json = $4, \
             updated_at = $5 WHERE id = $1 AND version = $6 AND status = 'Active' \
             RETURNING id, version, key_type, encrypted_dek, status, description, \
             tags_json, authorized_contexts_json, tier, storage_profile, \
             created_at, updated_at, revoked_at, grace_period_seconds",
        )
        .bind(id)
        .bind(&key.metadata.description)
        .bind(tags_json)
        .bind(contexts_json)
        .bind(now)
        .bind(current.version)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        updated.into_key()
    }

    async fn revoke_key(&self, id: Uuid) -> PersistenceResult<Key> {
        let mut tx = self.pool.pool().begin().await?;

        let current: Option<KeyRow> = sqlx::query_as(
            "SELECT id, version, key_type, encrypted_dek, status, description, \
             tags_json, authorized_contexts_json, tier, storage_profile, \
             created_at, updated_at, revoked_at, grace_period_seconds \
             FROM keys WHERE id = $1 AND status = 'Active'",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let current = match current {
            Some(row) => row,
            None => {
                // Idempotent: a key already revoked is success-without-change.
                let existing: Option<KeyRow> = sqlx::query_as(
                    "SELECT id, version, key_type, encrypted_dek, status, description, \
                     tags_json, authorized_contexts_json, tier, storage_profile, \
                     created_at, updated_at, revoked_at, grace_period_seconds \
                     FROM keys WHERE id = $1 AND status = 'Revoked' \
                     ORDER BY version DESC LIMIT 1",
                )
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
                return existing
                    .ok_or_else(|| PersistenceError::KeyNotFound(id.to_string()))?
                    .into_key();
            }
        };

        let now = Utc::now();
        let revoked: KeyRow = sqlx::query_as(
            "UPDATE keys SET status = 'Revoked', revoked_at = $2, updated_at = $2 \
             WHERE id = $1 AND version = $3 AND status = 'Active' \
             RETURNING id, version, key_type, encrypted_dek, status, description, \
             tags_json, authorized_contexts_json, tier, storage_profile, \
             created_at, updated_at, revoked_at, grace_period_seconds",
        )
        .bind(id)
        .bind(now)
        .bind(current.version)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        revoked.into_key()
    }

    async fn list_keys(
        &self,
        page_token: Option<&str>,
        page_size: u32,
    ) -> PersistenceResult<(Vec<Key>, Option<String>)> {
        let boundary = page_token.map(PageToken::decode).transpose()?;
        let limit = i64::from(page_size.max(1)) + 1;

        let rows: Vec<KeyRow> = match boundary {
            None => {
                sqlx::query_as(
                    "SELECT id, version, key_type, encrypted_dek, status, description, \
                     tags_json, authorized_contexts_json, tier, storage_profile, \
                     created_at, updated_at, revoked_at, grace_period_seconds \
                     FROM keys WHERE status = 'Active' \
                     ORDER BY created_at DESC, id ASC LIMIT $1",
                )
                .bind(limit)
                .fetch_all(self.pool.pool())
                .await?
            }
            Some(boundary) => {
                sqlx::query_as(
                    "SELECT id, version, key_type, encrypted_dek, status, description, \
                     tags_json, authorized_contexts_json, tier, storage_profile, \
                     created_at, updated_at, revoked_at, grace_period_seconds \
                     FROM keys WHERE status = 'Active' \
                     AND (created_at < $1 OR (created_at = $1 AND id > $2)) \
                     ORDER BY created_at DESC, id ASC LIMIT $3",
                )
                .bind(boundary.created_at)
                .bind(boundary.id)
                .bind(limit)
                .fetch_all(self.pool.pool())
                .await?
            }
        };

        let mut keys: Vec<Key> = Vec::with_capacity(rows.len());
        for row in rows {
            keys.push(row.into_key()?);
        }

        let next_token = if keys.len() as u32 > page_size {
            keys.truncate(page_size as usize);
            keys.last().map(|k| {
                PageToken { created_at: k.created_at, id: k.id }.encode()
            })
        } else {
            None
        };

        Ok((keys, next_token))
    }
}
