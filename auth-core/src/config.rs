use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenManagerConfig {
    /// Default time-to-live for issued tokens, in seconds.
    pub default_ttl_seconds: i64,
}

impl Default for TokenManagerConfig {
    fn default() -> Self {
        Self { default_ttl_seconds: 3600 }
    }
}
