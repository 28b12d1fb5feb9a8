//! RS256 bearer tokens: one struct owning config and exposing
//! issue/verify/revoke as the single surface other crates call, backed
//! by signed JWT claims and a revocation cache instead of a session
//! table.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rsa::pkcs8::{DecodePrivateKey, EncodePublicKey, LineEnding};
use rsa::RsaPrivateKey;
use uuid::Uuid;

use cache::TtlCache;
use error_common::Tier;

use crate::error::{AuthError, AuthResult};
use crate::models::Claims;

/// Breaks the TokenManager <-> AuditLogger cycle: the audit pipeline
/// implements this and is handed in at construction, instead of
/// TokenManager depending on the audit crate directly.
pub trait TokenEventSink: Send + Sync {
    fn record_issued(&self, claims: &Claims);
    fn record_revoked(&self, token_id: Uuid);
}

pub struct NoopEventSink;

impl TokenEventSink for NoopEventSink {
    fn record_issued(&self, _claims: &Claims) {}
    fn record_revoked(&self, _token_id: Uuid) {}
}

pub struct TokenManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    revocation_cache: Arc<TtlCache<String, ()>>,
    event_sink: Arc<dyn TokenEventSink>,
}

impl TokenManager {
    /// `private_key_pem` is the bootstrap secret; the public key is derived
    /// from it rather than loaded separately, matching the source system's
    /// single-secret key material.
    pub fn from_private_key_pem(
        private_key_pem: &str,
        revocation_cache: Arc<TtlCache<String, ()>>,
        event_sink: Arc<dyn TokenEventSink>,
    ) -> AuthResult<Self> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(private_key_pem)
            .map_err(|e| AuthError::KeyMaterial(format!("invalid RSA private key: {e}")))?;
        let public_key_pem = private_key
            .to_public_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| AuthError::KeyMaterial(format!("failed to derive public key: {e}")))?;

        let encoding_key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
            .map_err(|e| AuthError::KeyMaterial(format!("invalid RSA private key encoding: {e}")))?;
        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
            .map_err(|e| AuthError::KeyMaterial(format!("invalid derived RSA public key: {e}")))?;

        Ok(Self { encoding_key, decoding_key, revocation_cache, event_sink })
    }

    pub fn issue(
        &self,
        user_id: &str,
        permissions: Vec<String>,
        tier: Tier,
        ttl: Duration,
    ) -> AuthResult<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            user_id: user_id.to_string(),
            permissions,
            tier,
            token_id: Uuid::new_v4(),
            issued_at: now,
            expires_at: now + i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX),
        };

        let header = Header::new(Algorithm::RS256);
        let token = jsonwebtoken::encode(&header, &claims, &self.encoding_key)
            .map_err(|e| AuthError::KeyMaterial(format!("failed to sign token: {e}")))?;

        self.event_sink.record_issued(&claims);
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> AuthResult<Claims> {
        let validation = Validation::new(Algorithm::RS256);

        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &validation).map_err(
            |e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::TokenInvalid,
            },
        )?;

        if self.revocation_cache.get(&data.claims.token_id.to_string()).is_some() {
            return Err(AuthError::TokenRevoked);
        }

        Ok(data.claims)
    }

    /// Parses the token without verifying its signature: revocation only
    /// needs the claimed `token_id`/`expires_at`, and must succeed even
    /// for a token whose key has since rotated.
    pub fn revoke(&self, token: &str) -> AuthResult<()> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = false;
        validation.insecure_disable_signature_validation();

        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|_| AuthError::TokenInvalid)?;

        let now = Utc::now().timestamp();
        if data.claims.expires_at <= now {
            return Ok(());
        }

        let remaining_secs = u64::try_from(data.claims.expires_at - now).unwrap_or(0);
        self.revocation_cache.set(
            data.claims.token_id.to_string(),
            (),
            Some(Duration::from_secs(remaining_secs)),
        );
        self.event_sink.record_revoked(data.claims.token_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cache::CacheConfig;
    use rsa::pkcs8::EncodePrivateKey;

    fn test_manager() -> TokenManager {
        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let pem = private_key.to_pkcs8_pem(LineEnding::LF).unwrap();
        TokenManager::from_private_key_pem(
            &pem,
            Arc::new(TtlCache::new(CacheConfig::default())),
            Arc::new(NoopEventSink),
        )
        .unwrap()
    }

    #[test]
    fn issued_token_verifies_with_matching_claims() {
        let manager = test_manager();
        let token = manager
            .issue("user-1", vec!["keys:create".to_string()], Tier::Pro, Duration::from_secs(60))
            .unwrap();

        let claims = manager.verify(&token).unwrap();
        assert_eq!(claims.user_id, "user-1");
        assert_eq!(claims.tier, Tier::Pro);
    }

    #[test]
    fn revoked_token_fails_verification() {
        let manager = test_manager();
        let token = manager
            .issue("user-1", vec!["keys:create".to_string()], Tier::Free, Duration::from_secs(60))
            .unwrap();

        manager.revoke(&token).unwrap();
        let result = manager.verify(&token);
        assert!(matches!(result, Err(AuthError::TokenRevoked)));
    }

    #[test]
    fn garbage_token_is_rejected() {
        let manager = test_manager();
        let result = manager.verify("this-is-not-a-valid-token");
        assert!(matches!(result, Err(AuthError::TokenInvalid)));
    }
}
