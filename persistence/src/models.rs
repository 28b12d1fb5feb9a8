//! Key and audit-event row types.
//!
//! `KeyRow`/`AuditEventRow` mirror the persisted schema exactly and are
//! what sqlx maps rows into; [`Key`]/[`AuditEvent`] are the
//! typed domain shapes the rest of the system works with. The conversion
//! is where `status`, `tier` and `storage_profile` go from TEXT to enum.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use error_common::{StorageProfile, Tier};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PersistenceError, PersistenceResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyStatus {
    Active,
    Rotated,
    Revoked,
}

impl fmt::Display for KeyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KeyStatus::Active => "Active",
            KeyStatus::Rotated => "Rotated",
            KeyStatus::Revoked => "Revoked",
        };
        write!(f, "{s}")
    }
}

impl FromStr for KeyStatus {
    type Err = PersistenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(KeyStatus::Active),
            "Rotated" => Ok(KeyStatus::Rotated),
            "Revoked" => Ok(KeyStatus::Revoked),
            other => Err(PersistenceError::InternalError(anyhow::anyhow!(
                "unrecognized key status in storage: {other}"
            ))),
        }
    }
}

/// Mutable fields of a key, kept separate from the version-carrying
/// identity fields so `update_metadata` can never touch the latter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyMetadata {
    pub description: Option<String>,
    pub tags: HashMap<String, String>,
    pub authorized_contexts: HashSet<String>,
    pub storage_profile: StorageProfile,
    pub tier: Tier,
}

/// A metadata patch; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataPatch {
    pub description: Option<Option<String>>,
    pub tags: Option<HashMap<String, String>>,
    pub authorized_contexts: Option<HashSet<String>>,
}

impl KeyMetadata {
    pub fn apply_patch(&mut self, patch: MetadataPatch) {
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(tags) = patch.tags {
            self.tags = tags;
        }
        if let Some(authorized_contexts) = patch.authorized_contexts {
            self.authorized_contexts = authorized_contexts;
        }
    }
}

#[derive(Debug, Clone)]
pub struct Key {
    pub id: Uuid,
    pub version: i64,
    pub key_type: String,
    pub encrypted_dek: Vec<u8>,
    pub status: KeyStatus,
    pub metadata: KeyMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    /// Set by `RotateKey` requests that name a grace window; carried
    /// forward across rotations and consulted once the key is revoked.
    pub grace_period_seconds: Option<i64>,
}

/// Raw row shape, one-to-one with the `keys` table. sqlx maps directly into
/// this; [`Key`] is derived from it via [`KeyRow::into_key`].
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct KeyRow {
    pub id: Uuid,
    pub version: i64,
    pub key_type: String,
    pub encrypted_dek: Vec<u8>,
    pub status: String,
    pub description: Option<String>,
    pub tags_json: serde_json::Value,
    pub authorized_contexts_json: serde_json::Value,
    pub tier: String,
    pub storage_profile: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub grace_period_seconds: Option<i64>,
}

impl KeyRow {
    pub fn into_key(self) -> PersistenceResult<Key> {
        let status = self.status.parse()?;
        let tier = parse_tier(&self.tier)?;
        let storage_profile = parse_storage_profile(&self.storage_profile)?;
        let tags: HashMap<String, String> = serde_json::from_value(self.tags_json)
            .map_err(|e| PersistenceError::InternalError(anyhow::anyhow!(e)))?;
        let authorized_contexts: HashSet<String> =
            serde_json::from_value(self.authorized_contexts_json)
                .map_err(|e| PersistenceError::InternalError(anyhow::anyhow!(e)))?;

        Ok(Key {
            id: self.id,
            version: self.version,
            key_type: self.key_type,
            encrypted_dek: self.encrypted_dek,
            status,
            metadata: KeyMetadata {
                description: self.description,
                tags,
                authorized_contexts,
                storage_profile,
                tier,
            },
            created_at: self.created_at,
            updated_at: self.updated_at,
            revoked_at: self.revoked_at,
            grace_period_seconds: self.grace_period_seconds,
        })
    }
}

fn parse_tier(s: &str) -> PersistenceResult<Tier> {
    match s {
        "Free" => Ok(Tier::Free),
        "Pro" => Ok(Tier::Pro),
        "Enterprise" => Ok(Tier::Enterprise),
        other => Err(PersistenceError::InternalError(anyhow::anyhow!(
            "unrecognized tier in storage: {other}"
        ))),
    }
}

fn parse_storage_profile(s: &str) -> PersistenceResult<StorageProfile> {
    match s {
        "Standard" => Ok(StorageProfile::Standard),
        "Hardened" => Ok(StorageProfile::Hardened),
        other => Err(PersistenceError::InternalError(anyhow::anyhow!(
            "unrecognized storage profile in storage: {other}"
        ))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditOutcome {
    Success,
    Failure,
    Denied,
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AuditOutcome::Success => "Success",
            AuditOutcome::Failure => "Failure",
            AuditOutcome::Denied => "Denied",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditActor {
    pub user_id: Option<String>,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    pub session_id: Option<String>,
    pub tier: Option<Tier>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditResource {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub id: String,
    pub classification: String,
}

/// A fully-assembled audit event, ready to enqueue for persistence.
/// Construction (sanitization, checksum) is the audit pipeline's job; this
/// crate only appends rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub action: String,
    pub result: AuditOutcome,
    pub actor: AuditActor,
    pub resource: AuditResource,
    pub details: serde_json::Value,
    pub security_level: String,
    pub checksum: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_status_round_trips_through_its_string_form() {
        for status in [KeyStatus::Active, KeyStatus::Rotated, KeyStatus::Revoked] {
            let parsed: KeyStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn unrecognized_status_string_is_rejected() {
        assert!("Pending".parse::<KeyStatus>().is_err());
    }

    #[test]
    fn patch_only_touches_fields_it_sets() {
        let mut metadata = KeyMetadata {
            description: Some("original".to_string()),
            tags: HashMap::from([("env".to_string(), "prod".to_string())]),
            authorized_contexts: HashSet::from(["client-a".to_string()]),
            storage_profile: StorageProfile::Standard,
            tier: Tier::Free,
        };

        metadata.apply_patch(MetadataPatch {
            description: Some(Some("updated".to_string())),
            tags: None,
            authorized_contexts: None,
        });

        assert_eq!(metadata.description.as_deref(), Some("updated"));
        assert_eq!(metadata.tags.get("env").map(String::as_str), Some("prod"));
    }
}
