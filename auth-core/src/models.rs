use error_common::Tier;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A client's static identity record, as loaded from the credential file.
/// `hashed_api_key` is a bcrypt hash; the plaintext secret is never
/// stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRecord {
    pub id: String,
    pub hashed_api_key: String,
    pub permissions: Vec<String>,
    pub tier: Tier,
}

/// `*` in a permission list grants every operation.
pub const WILDCARD_PERMISSION: &str = "*";

/// The claim set embedded in every issued bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: String,
    pub permissions: Vec<String>,
    pub tier: Tier,
    pub token_id: Uuid,
    pub issued_at: i64,
    pub expires_at: i64,
}

impl Claims {
    pub fn has_permission(&self, operation: &str) -> bool {
        self.permissions.iter().any(|p| p == WILDCARD_PERMISSION || p == operation)
    }
}
