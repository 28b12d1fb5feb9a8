//! Client credential store: an immutable map loaded once from a YAML
//! document at startup. Read-only in-memory lookup, since clients are
//! provisioned out-of-band, not through the RPC surface.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::{AuthError, AuthResult};
use crate::models::ClientRecord;

const BCRYPT_PREFIXES: [&str; 3] = ["$2a$", "$2b$", "$2y$"];
const BCRYPT_MIN_LEN: usize = 60;

#[derive(Debug, Deserialize)]
struct ClientFile {
    clients: Vec<ClientRecord>,
}

/// Immutable client_id -> record map. Lookup is O(1); records are
/// deep-cloned on every read so a caller can never mutate store state.
pub struct ClientCredentialStore {
    clients: HashMap<String, ClientRecord>,
}

impl ClientCredentialStore {
    pub fn load_from_str(yaml: &str) -> AuthResult<Self> {
        let file: ClientFile = serde_yaml::from_str(yaml)
            .map_err(|e| AuthError::Config(format!("failed to parse client credential file: {e}")))?;

        let mut clients = HashMap::with_capacity(file.clients.len());
        for record in file.clients {
            validate_record(&record)?;
            clients.insert(record.id.clone(), record);
        }

        Ok(Self { clients })
    }

    pub fn get(&self, client_id: &str) -> AuthResult<ClientRecord> {
        self.clients
            .get(client_id)
            .cloned()
            .ok_or_else(|| AuthError::ClientNotFound(client_id.to_string()))
    }

    pub fn verify_secret(&self, client_id: &str, secret: &str) -> AuthResult<ClientRecord> {
        let record = self.get(client_id)?;
        let matches = bcrypt::verify(secret, &record.hashed_api_key)
            .map_err(|e| AuthError::Config(format!("bcrypt verification failed: {e}")))?;
        if matches {
            Ok(record)
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }
}

fn validate_record(record: &ClientRecord) -> AuthResult<()> {
    let has_recognized_prefix =
        BCRYPT_PREFIXES.iter().any(|prefix| record.hashed_api_key.starts_with(prefix));
    if !has_recognized_prefix || record.hashed_api_key.len() < BCRYPT_MIN_LEN {
        return Err(AuthError::MalformedCredentialRecord(format!(
            "client {} has an unrecognized or truncated bcrypt hash",
            record.id
        )));
    }
    if record.permissions.is_empty() {
        return Err(AuthError::MalformedCredentialRecord(format!(
            "client {} has no permissions",
            record.id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_yaml(hash: &str) -> String {
        format!(
            "clients:\n  - id: client-a\n    hashed_api_key: \"{hash}\"\n    permissions: [\"keys:create\"]\n    tier: Free\n"
        )
    }

    #[test]
    fn loads_a_well_formed_client_file() {
        let hash = "$2b$12$abcdefghijklmnopqrstuvABCDEFGHIJKLMNOPQRSTUVWXYZ012345";
        let store = ClientCredentialStore::load_from_str(&sample_yaml(hash)).unwrap();
        let record = store.get("client-a").unwrap();
        assert_eq!(record.permissions, vec!["keys:create".to_string()]);
    }

    #[test]
    fn rejects_a_hash_with_unrecognized_prefix() {
        let hash = "plaintext-not-a-bcrypt-hash-but-long-enough-to-pass-length-check";
        let result = ClientCredentialStore::load_from_str(&sample_yaml(hash));
        assert!(result.is_err());
    }

    #[test]
    fn rejects_a_truncated_hash() {
        let result = ClientCredentialStore::load_from_str(&sample_yaml("$2b$12$short"));
        assert!(result.is_err());
    }

    #[test]
    fn unknown_client_id_is_reported() {
        let hash = "$2b$12$abcdefghijklmnopqrstuvABCDEFGHIJKLMNOPQRSTUVWXYZ012345";
        let store = ClientCredentialStore::load_from_str(&sample_yaml(hash)).unwrap();
        assert!(store.get("nonexistent").is_err());
    }
}
