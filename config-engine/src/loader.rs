use config::{Config, Environment, File};

use crate::error::{ConfigError, Result};
use crate::model::ServiceConfig;

/// Loads [`ServiceConfig`] from `path` (YAML), then overlays environment
/// variables prefixed `POLYKEY__` (double underscore as the nesting
/// separator, e.g. `POLYKEY__SERVER__PORT`).
///
/// `path` is resolved from `POLYKEY_CONFIG_PATH` by the caller; this
/// function only knows about the file it's given.
pub fn load(path: &str) -> Result<ServiceConfig> {
    let raw = Config::builder()
        .add_source(File::with_name(path))
        .add_source(Environment::with_prefix("POLYKEY").separator("__"))
        .build()
        .map_err(|e| ConfigError::SourceNotFound(e.to_string()))?;

    raw.try_deserialize::<ServiceConfig>()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}
