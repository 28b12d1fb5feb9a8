use crate::error::{ConfigError, Result};
use crate::model::ServiceConfig;

/// Structural checks that `config::Config::try_deserialize` doesn't cover:
/// cross-field invariants and non-zero bounds.
pub fn validate(cfg: &ServiceConfig) -> Result<()> {
    if cfg.server.port == 0 {
        return Err(ConfigError::ValidationError("server.port must be nonzero".into()));
    }
    if cfg.server.rate_limiter.enabled && cfg.server.rate_limiter.rate == 0 {
        return Err(ConfigError::ValidationError(
            "server.rate_limiter.rate must be nonzero when enabled".into(),
        ));
    }
    if cfg.server.rate_limiter.burst < cfg.server.rate_limiter.rate {
        return Err(ConfigError::ValidationError(
            "server.rate_limiter.burst must be >= rate".into(),
        ));
    }
    if cfg.persistence.database.max_connections < cfg.persistence.database.min_connections {
        return Err(ConfigError::ValidationError(
            "persistence.database.max_connections must be >= min_connections".into(),
        ));
    }
    if cfg.auditing.asynchronous.enabled {
        let a = &cfg.auditing.asynchronous;
        if a.worker_count == 0 || a.channel_buffer_size == 0 || a.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "auditing.asynchronous worker_count/channel_buffer_size/batch_size must be nonzero".into(),
            ));
        }
    }
    if cfg.authorization.roles.is_empty() {
        return Err(ConfigError::ValidationError(
            "authorization.roles must declare at least one role".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use std::collections::HashMap;

    fn valid_config() -> ServiceConfig {
        let mut roles = HashMap::new();
        roles.insert("admin".to_string(), vec!["*".to_string()]);
        ServiceConfig {
            server: ServerConfig {
                port: 50051,
                mode: ServerMode::Dev,
                rate_limiter: RateLimiterConfig { enabled: true, rate: 100, burst: 200 },
            },
            persistence: PersistenceConfig {
                backend: PersistenceBackend::Neondb,
                database: DatabaseConfig {
                    min_connections: 1,
                    max_connections: 10,
                    connect_timeout_secs: 5,
                    require_tls: true,
                },
            },
            auditing: AuditingConfig {
                asynchronous: AsyncAuditConfig {
                    enabled: true,
                    channel_buffer_size: 1024,
                    worker_count: 2,
                    batch_size: 50,
                    batch_timeout_ms: 500,
                },
            },
            authorization: AuthorizationConfig { roles },
            default_kms_provider: KmsProviderKind::Local,
            bootstrap_secrets: BootstrapSecretsConfig::default(),
        }
    }

    #[test]
    fn accepts_a_well_formed_config() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn rejects_burst_below_rate() {
        let mut cfg = valid_config();
        cfg.server.rate_limiter.burst = 10;
        cfg.server.rate_limiter.rate = 100;
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn rejects_empty_roles() {
        let mut cfg = valid_config();
        cfg.authorization.roles.clear();
        assert!(validate(&cfg).is_err());
    }
}
