//! Opaque keyset page tokens for `list_keys`: keyset pagination on
//! `(created_at DESC, id)`, stable under concurrent inserts.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{PersistenceError, PersistenceResult};

#[derive(Debug, Clone, Copy)]
pub struct PageToken {
    pub created_at: DateTime<Utc>,
    pub id: Uuid,
}

impl PageToken {
    pub fn encode(&self) -> String {
        let raw = format!("{}\0{}", self.created_at.to_rfc3339(), self.id);
        URL_SAFE_NO_PAD.encode(raw.as_bytes())
    }

    pub fn decode(token: &str) -> PersistenceResult<Self> {
        let raw = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| PersistenceError::InvalidPageToken)?;
        let raw = String::from_utf8(raw).map_err(|_| PersistenceError::InvalidPageToken)?;
        let mut parts = raw.splitn(2, '\0');
        let created_at = parts.next().ok_or(PersistenceError::InvalidPageToken)?;
        let id = parts.next().ok_or(PersistenceError::InvalidPageToken)?;

        let created_at = DateTime::parse_from_rfc3339(created_at)
            .map_err(|_| PersistenceError::InvalidPageToken)?
            .with_timezone(&Utc);
        let id = id.parse().map_err(|_| PersistenceError::InvalidPageToken)?;

        Ok(Self { created_at, id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_string_form() {
        let token = PageToken { created_at: Utc::now(), id: Uuid::new_v4() };
        let encoded = token.encode();
        let decoded = PageToken::decode(&encoded).unwrap();
        assert_eq!(token.id, decoded.id);
        assert_eq!(token.created_at.timestamp_millis(), decoded.created_at.timestamp_millis());
    }

    #[test]
    fn rejects_garbage_input() {
        assert!(PageToken::decode("not-a-valid-token!!").is_err());
    }
}
