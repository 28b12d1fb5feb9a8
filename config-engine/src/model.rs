use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The full typed configuration surface, loaded once at startup by
/// [`crate::loader::load`] and then handed to the composition root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub persistence: PersistenceConfig,
    pub auditing: AuditingConfig,
    pub authorization: AuthorizationConfig,
    pub default_kms_provider: KmsProviderKind,
    #[serde(default)]
    pub bootstrap_secrets: BootstrapSecretsConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerMode {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub mode: ServerMode,
    pub rate_limiter: RateLimiterConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimiterConfig {
    pub enabled: bool,
    /// Sustained requests/sec per bucket.
    pub rate: u32,
    /// Bucket capacity (maximum burst).
    pub burst: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceBackend {
    Neondb,
    Cockroachdb,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    #[serde(rename = "type")]
    pub backend: PersistenceBackend,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub min_connections: u32,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
    pub require_tls: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditingConfig {
    pub asynchronous: AsyncAuditConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsyncAuditConfig {
    pub enabled: bool,
    pub channel_buffer_size: usize,
    pub worker_count: usize,
    pub batch_size: usize,
    pub batch_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationConfig {
    /// role name -> permitted permission strings (`"*"` = wildcard).
    pub roles: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KmsProviderKind {
    Local,
    Aws,
}

/// Paths (or inline values, for `dev` mode) the composition root reads
/// through the explicit `(setter, secret path)` table in [`crate::secrets`]
/// rather than a reflective/tag-driven loader.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BootstrapSecretsConfig {
    pub master_key_b64: Option<String>,
    pub jwt_rsa_private_key_pem: Option<String>,
    pub db_url: Option<String>,
}
