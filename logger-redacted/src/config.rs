use serde::{Deserialize, Serialize};

/// Logging configuration, loaded as part of `config_engine::ServiceConfig`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerConfig {
    pub redaction_enabled: bool,
    pub log_level: String,
    /// Emit bunyan-style JSON instead of the human-readable formatter.
    pub json_output: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            redaction_enabled: true,
            log_level: "info".to_string(),
            json_output: true,
        }
    }
}
