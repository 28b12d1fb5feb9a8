use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration source not found: {0}")]
    SourceNotFound(String),

    #[error("configuration parsing failed: {0}")]
    ParseError(String),

    #[error("configuration validation failed: {0}")]
    ValidationError(String),

    #[error("required secret missing: {0}")]
    MissingSecret(String),

    #[error("internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
