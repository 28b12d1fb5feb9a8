//! The `Tier`/`StorageProfile` pair gates both KMS provider selection (C1)
//! and the storage-profile ceiling a caller may request (C6). Shared here
//! since both `crypto` and `authz` need the same two small enums and
//! neither crate depends on the other.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    Free,
    Pro,
    Enterprise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StorageProfile {
    Standard,
    Hardened,
}

impl Tier {
    /// `Enterprise`/`Pro` route to the cloud KMS provider, `Free` to local.
    pub fn kms_provider_name(self) -> &'static str {
        match self {
            Tier::Free => "local",
            Tier::Pro | Tier::Enterprise => "aws",
        }
    }

    /// The highest `StorageProfile` this tier may request.
    pub fn max_storage_profile(self) -> StorageProfile {
        match self {
            Tier::Free => StorageProfile::Standard,
            Tier::Pro | Tier::Enterprise => StorageProfile::Hardened,
        }
    }

    pub fn permits_storage_profile(self, requested: StorageProfile) -> bool {
        requested <= self.max_storage_profile()
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl fmt::Display for StorageProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_tier_routes_to_local_and_caps_at_standard() {
        assert_eq!(Tier::Free.kms_provider_name(), "local");
        assert!(Tier::Free.permits_storage_profile(StorageProfile::Standard));
        assert!(!Tier::Free.permits_storage_profile(StorageProfile::Hardened));
    }

    #[test]
    fn pro_and_enterprise_route_to_cloud_and_permit_hardened() {
        assert_eq!(Tier::Pro.kms_provider_name(), "aws");
        assert_eq!(Tier::Enterprise.kms_provider_name(), "aws");
        assert!(Tier::Pro.permits_storage_profile(StorageProfile::Hardened));
        assert!(Tier::Enterprise.permits_storage_profile(StorageProfile::Hardened));
    }
}
