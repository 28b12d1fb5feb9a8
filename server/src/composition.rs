//! Composition root: owns every long-lived component and wires them
//! together in dependency order, one constructor call per component,
//! built once at startup and never rebuilt.

use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use audit_engine::{AuditLogger, AuditPipelineConfig};
use auth_core::{ClientCredentialStore, TokenEventSink, TokenManager, TokenManagerConfig};
use authz::{AuthenticatedUser, Authorizer, AuthzAuditSink};
use cache::{CacheConfig, TtlCache};
use config_engine::{KmsProviderKind, ServiceConfig};
use crypto::dek_pool::DekBufferPool;
use crypto::kms::cloud::{CloudKmsConfig, CloudKmsProvider};
use crypto::kms::local::{LocalKmsProvider, LegacyFallbackSink};
use crypto::kms::KmsRegistry;
use error_common::Tier;
use key_service::{KeyService, RepositoryKeyContextLookup, RotationPipeline, RotationPipelineConfig};
use persistence::{DbPool, KeyRepository, PgAuditRepository, PgKeyRepository, PoolConfig};
use rate_limiter::{RateLimiter, RateLimiterConfig};

/// Forwards a legacy-fallback event into the audit pipeline so it shows
/// up alongside every other key operation instead of only in logs.
struct AuditedLegacyFallbackSink {
    audit: Arc<AuditLogger>,
}

impl LegacyFallbackSink for AuditedLegacyFallbackSink {
    fn record_legacy_fallback(&self, key_id: &str) {
        self.audit.record(
            "kms.legacy_fallback",
            "UnwrapKey",
            persistence::AuditOutcome::Success,
            persistence::AuditActor { user_id: None, client_ip: None, user_agent: None, session_id: None, tier: None },
            persistence::AuditResource {
                resource_type: "key".to_string(),
                id: key_id.to_string(),
                classification: "confidential".to_string(),
            },
            serde_json::json!({ "reason": "decrypted with raw master key" }),
        );
    }
}

/// Breaks the cyclic dependency between the token manager and the audit
/// pipeline: `TokenManager` calls through this trait object instead of
/// depending on `audit-engine` directly.
struct AuditedTokenEventSink {
    audit: Arc<AuditLogger>,
}

impl TokenEventSink for AuditedTokenEventSink {
    fn record_issued(&self, claims: &auth_core::Claims) {
        self.audit.record(
            "auth.token_issued",
            "Authenticate",
            persistence::AuditOutcome::Success,
            persistence::AuditActor {
                user_id: Some(claims.user_id.clone()),
                client_ip: None,
                user_agent: None,
                session_id: None,
                tier: Some(claims.tier),
            },
            persistence::AuditResource {
                resource_type: "token".to_string(),
                id: claims.token_id.to_string(),
                classification: "internal".to_string(),
            },
            serde_json::json!({}),
        );
    }

    fn record_revoked(&self, token_id: uuid::Uuid) {
        self.audit.record(
            "auth.token_revoked",
            "RevokeToken",
            persistence::AuditOutcome::Success,
            persistence::AuditActor { user_id: None, client_ip: None, user_agent: None, session_id: None, tier: None },
            persistence::AuditResource {
                resource_type: "token".to_string(),
                id: token_id.to_string(),
                classification: "internal".to_string(),
            },
            serde_json::json!({}),
        );
    }
}

/// Forwards every authorization denial into the audit pipeline; `authz`
/// calls through this trait object instead of depending on `audit-engine`
/// directly, the same way `AuditedTokenEventSink` breaks the token-manager
/// cycle above.
struct AuthzAuditedSink {
    audit: Arc<AuditLogger>,
}

impl AuthzAuditSink for AuthzAuditedSink {
    fn record_denied(&self, user: &AuthenticatedUser, operation: &str, key_id: Option<&str>, reason: &str) {
        self.audit.record(
            "authz.denied",
            operation,
            persistence::AuditOutcome::Denied,
            persistence::AuditActor {
                user_id: Some(user.id.clone()),
                client_ip: None,
                user_agent: None,
                session_id: None,
                tier: Some(user.tier),
            },
            persistence::AuditResource {
                resource_type: "key".to_string(),
                id: key_id.unwrap_or("").to_string(),
                classification: "confidential".to_string(),
            },
            serde_json::json!({ "reason": reason }),
        );
    }
}

/// Everything the RPC layer needs, built once at startup and cloned
/// cheaply (every field is an `Arc`) into each incoming request's scope.
#[derive(Clone)]
pub struct PolykeyServer {
    pub key_service: Arc<KeyService>,
    pub token_manager: Arc<TokenManager>,
    pub token_manager_config: TokenManagerConfig,
    pub client_store: Arc<ClientCredentialStore>,
    pub rate_limiter: Arc<RateLimiter>,
    pub db_pool: DbPool,
    pub kms: Arc<KmsRegistry>,
    pub service_version: String,
    pub build_commit: String,
}

/// `master_key_b64`/`jwt_rsa_private_key_pem`/`db_url` come from
/// [`config_engine::resolve_bootstrap_secrets`]; `client_credentials_yaml`
/// is read by the caller from the path named by `POLYKEY_CLIENT_CREDENTIALS_PATH`,
/// kept out of `ServiceConfig` since it names a file rather than a value.
pub async fn build(
    config: &ServiceConfig,
    master_key_b64: &str,
    jwt_rsa_private_key_pem: &str,
    db_url: &str,
    client_credentials_yaml: &str,
) -> anyhow::Result<PolykeyServer> {
    let pool_config = PoolConfig {
        url: db_url.to_string(),
        min_connections: config.persistence.database.min_connections,
        max_connections: config.persistence.database.max_connections,
        connect_timeout: Duration::from_secs(config.persistence.database.connect_timeout_secs),
    };
    let db_pool = DbPool::connect(&pool_config).await?;

    let key_repository: Arc<dyn KeyRepository> = Arc::new(PgKeyRepository::new(db_pool.clone()));
    let audit_repository = Arc::new(PgAuditRepository::new(db_pool.clone()));

    let audit_config = AuditPipelineConfig {
        channel_capacity: config.auditing.asynchronous.channel_buffer_size,
        worker_count: config.auditing.asynchronous.worker_count,
        batch_size: config.auditing.asynchronous.batch_size,
        batch_timeout: Duration::from_millis(config.auditing.asynchronous.batch_timeout_ms),
        max_retry_attempts: 3,
    };
    let audit = Arc::new(AuditLogger::new(audit_repository, audit_config));

    let master_key = decode_master_key(master_key_b64)?;
    let mut kms = KmsRegistry::new();
    kms.register(Arc::new(LocalKmsProvider::new(
        master_key,
        false,
        Arc::new(AuditedLegacyFallbackSink { audit: Arc::clone(&audit) }),
    )));
    if config.default_kms_provider == KmsProviderKind::Aws {
        let endpoint = std::env::var("POLYKEY_AWS_KMS_ENDPOINT")
            .map_err(|_| anyhow::anyhow!("POLYKEY_AWS_KMS_ENDPOINT is required when default_kms_provider is aws"))?;
        let key_arn = std::env::var("POLYKEY_AWS_KMS_KEY_ARN")
            .map_err(|_| anyhow::anyhow!("POLYKEY_AWS_KMS_KEY_ARN is required when default_kms_provider is aws"))?;
        kms.register(Arc::new(CloudKmsProvider::new(CloudKmsConfig {
            provider_name: "aws",
            endpoint,
            key_arn,
            tiers: vec![Tier::Pro, Tier::Enterprise],
        })));
    }
    let kms = Arc::new(kms);

    let dek_pool = Arc::new(DekBufferPool::new());

    let decision_cache = Arc::new(TtlCache::new(CacheConfig::default()));
    let authorizer = Arc::new(Authorizer::new(
        decision_cache,
        Arc::new(RepositoryKeyContextLookup::new(Arc::clone(&key_repository))),
        Arc::new(AuthzAuditedSink { audit: Arc::clone(&audit) }),
    ));

    let rotation = RotationPipeline::new(
        Arc::clone(&key_repository),
        Arc::clone(&kms),
        Arc::clone(&dek_pool),
        Arc::clone(&audit),
        RotationPipelineConfig::default(),
    );
    let key_service = Arc::new(KeyService::new(key_repository, Arc::clone(&kms), dek_pool, authorizer, Arc::clone(&audit), rotation));

    let revocation_cache = Arc::new(TtlCache::new(CacheConfig::default()));
    let token_manager = Arc::new(TokenManager::from_private_key_pem(
        jwt_rsa_private_key_pem,
        revocation_cache,
        Arc::new(AuditedTokenEventSink { audit }),
    )?);

    let client_store = Arc::new(ClientCredentialStore::load_from_str(client_credentials_yaml)?);

    let rate_limiter = Arc::new(RateLimiter::new(RateLimiterConfig {
        rate: config.server.rate_limiter.rate as f64,
        burst: config.server.rate_limiter.burst as f64,
    }));

    Ok(PolykeyServer {
        key_service,
        token_manager,
        token_manager_config: TokenManagerConfig::default(),
        client_store,
        rate_limiter,
        db_pool,
        kms,
        service_version: env!("CARGO_PKG_VERSION").to_string(),
        build_commit: std::env::var("POLYKEY_BUILD_COMMIT").unwrap_or_else(|_| "unknown".to_string()),
    })
}

fn decode_master_key(master_key_b64: &str) -> anyhow::Result<[u8; 32]> {
    let bytes = BASE64.decode(master_key_b64)?;
    let array: [u8; 32] = bytes
        .try_into()
        .map_err(|_| anyhow::anyhow!("POLYKEY_MASTER_KEY_B64 must decode to exactly 32 bytes"))?;
    Ok(array)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_master_key_accepts_32_bytes() {
        let key = BASE64.encode([7u8; 32]);
        assert_eq!(decode_master_key(&key).unwrap(), [7u8; 32]);
    }

    #[test]
    fn decode_master_key_rejects_wrong_length() {
        let key = BASE64.encode([7u8; 16]);
        assert!(decode_master_key(&key).is_err());
    }

    #[test]
    fn decode_master_key_rejects_invalid_base64() {
        assert!(decode_master_key("not base64!!").is_err());
    }
}
