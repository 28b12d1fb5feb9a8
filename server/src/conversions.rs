//! Wire/domain conversions between the generated `proto` types and the
//! domain types `persistence`/`error-common`/`key-service` work with. The
//! RPC handlers stay thin by concentrating all of this mapping here.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tonic::Status;
use uuid::Uuid;

use error_common::{StorageProfile, Tier};
use key_service::CreateKeyRequest;
use persistence::{Key, KeyStatus, MetadataPatch};

use crate::error::status_for;
use crate::proto;
use error_common::ErrorKind;

pub fn to_timestamp(dt: DateTime<Utc>) -> prost_types::Timestamp {
    prost_types::Timestamp { seconds: dt.timestamp(), nanos: dt.timestamp_subsec_nanos() as i32 }
}

pub fn tier_from_proto(tier: i32) -> Result<Tier, Status> {
    match proto::Tier::try_from(tier) {
        Ok(proto::Tier::TierFree) => Ok(Tier::Free),
        Ok(proto::Tier::TierPro) => Ok(Tier::Pro),
        Ok(proto::Tier::TierEnterprise) => Ok(Tier::Enterprise),
        _ => Err(status_for(ErrorKind::Invalid, "tier must be specified")),
    }
}

pub fn tier_to_proto(tier: Tier) -> proto::Tier {
    match tier {
        Tier::Free => proto::Tier::TierFree,
        Tier::Pro => proto::Tier::TierPro,
        Tier::Enterprise => proto::Tier::TierEnterprise,
    }
}

pub fn storage_profile_from_proto(profile: i32) -> Result<StorageProfile, Status> {
    match proto::StorageProfile::try_from(profile) {
        Ok(proto::StorageProfile::StorageProfileStandard) => Ok(StorageProfile::Standard),
        Ok(proto::StorageProfile::StorageProfileHardened) => Ok(StorageProfile::Hardened),
        _ => Err(status_for(ErrorKind::Invalid, "storage_profile must be specified")),
    }
}

pub fn storage_profile_to_proto(profile: StorageProfile) -> proto::StorageProfile {
    match profile {
        StorageProfile::Standard => proto::StorageProfile::StorageProfileStandard,
        StorageProfile::Hardened => proto::StorageProfile::StorageProfileHardened,
    }
}

pub fn key_status_to_proto(status: KeyStatus) -> proto::KeyStatus {
    match status {
        KeyStatus::Active => proto::KeyStatus::KeyStatusActive,
        KeyStatus::Rotated => proto::KeyStatus::KeyStatusRotated,
        KeyStatus::Revoked => proto::KeyStatus::KeyStatusRevoked,
    }
}

pub fn parse_key_id(id: &str) -> Result<Uuid, Status> {
    Uuid::parse_str(id).map_err(|_| status_for(ErrorKind::Invalid, "id is not a valid uuid"))
}

pub fn key_to_proto_metadata(key: &Key) -> proto::KeyMetadata {
    proto::KeyMetadata {
        id: key.id.to_string(),
        version: key.version,
        key_type: key.key_type.clone(),
        status: key_status_to_proto(key.status) as i32,
        description: key.metadata.description.clone(),
        tags: key.metadata.tags.clone(),
        authorized_contexts: key.metadata.authorized_contexts.iter().cloned().collect(),
        tier: tier_to_proto(key.metadata.tier) as i32,
        storage_profile: storage_profile_to_proto(key.metadata.storage_profile) as i32,
        created_at: Some(to_timestamp(key.created_at)),
        updated_at: Some(to_timestamp(key.updated_at)),
        revoked_at: key.revoked_at.map(to_timestamp),
    }
}

/// `tags`/`authorized_contexts` are only applied when their `*_set` flag
/// is true, since proto3 can't distinguish an absent repeated/map field
/// from an explicitly-empty one. `description` uses `optional string`
/// presence directly: absent leaves it unchanged, present-and-empty
/// clears it to `None`, present-and-nonempty sets it.
pub fn patch_from_proto(patch: proto::MetadataPatch) -> MetadataPatch {
    MetadataPatch {
        description: patch
            .description
            .map(|d| if d.is_empty() { None } else { Some(d) }),
        tags: if patch.tags_set { Some(patch.tags) } else { None },
        authorized_contexts: if patch.authorized_contexts_set {
            Some(patch.authorized_contexts.into_iter().collect::<HashSet<String>>())
        } else {
            None
        },
    }
}

pub fn domain_create_key_request(req: proto::CreateKeyRequest) -> Result<CreateKeyRequest, Status> {
    Ok(CreateKeyRequest {
        key_type: req.key_type,
        tier: tier_from_proto(req.tier)?,
        storage_profile: storage_profile_from_proto(req.storage_profile)?,
        initial_authorized_contexts: req.initial_authorized_contexts.into_iter().collect(),
        description: req.description,
        tags: req.tags,
    })
}
