//! Typed configuration and bootstrap-secret resolution for polykey.
//!
//! Configuration is loaded once, at process start, from a YAML file
//! overlaid with environment variables — there is no hot-reload or remote
//! config store here, unlike the dynamic multi-source engine this crate
//! used to be: a key-management service restarts behind its orchestrator
//! on a config change like everything else in its deployment, rather than
//! silently picking up a new KMS provider mid-flight.
//!
//! # Example
//!
//! ```ignore
//! use config_engine::{load_and_validate, resolve_bootstrap_secrets};
//!
//! let mut cfg = load_and_validate("config/service.yaml")?;
//! resolve_bootstrap_secrets(&mut cfg.bootstrap_secrets)?;
//! ```

pub mod error;
pub mod loader;
pub mod model;
pub mod secrets;
pub mod validation;

pub use error::{ConfigError, Result};
pub use model::*;
pub use secrets::resolve_bootstrap_secrets;

/// Loads `path`, validates it, and returns the typed config. Does not
/// resolve bootstrap secrets — call [`secrets::resolve_bootstrap_secrets`]
/// separately so the composition root controls that ordering explicitly.
pub fn load_and_validate(path: &str) -> Result<model::ServiceConfig> {
    let cfg = loader::load(path)?;
    validation::validate(&cfg)?;
    Ok(cfg)
}
