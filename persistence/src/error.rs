use error_common::ErrorKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("key {0} already exists")]
    KeyAlreadyExists(String),

    #[error("key {0} not found")]
    KeyNotFound(String),

    #[error("key {0} version {1} not found")]
    KeyVersionNotFound(String, i64),

    #[error("key {0} is not rotatable in its current status")]
    KeyNotRotatable(String),

    #[error("optimistic concurrency conflict rotating key {0}")]
    RotationConflict(String),

    #[error("invalid page token")]
    InvalidPageToken,

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("database error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl PersistenceError {
    /// Maps this error onto the shared error-kind taxonomy so callers above
    /// persistence (key-service, server) don't need to know sqlx exists.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PersistenceError::KeyAlreadyExists(_) => ErrorKind::AlreadyExists,
            PersistenceError::KeyNotFound(_) | PersistenceError::KeyVersionNotFound(_, _) => {
                ErrorKind::NotFound
            }
            PersistenceError::KeyNotRotatable(_) | PersistenceError::RotationConflict(_) => {
                ErrorKind::Conflict
            }
            PersistenceError::InvalidPageToken => ErrorKind::Invalid,
            PersistenceError::ConnectionFailed(_)
            | PersistenceError::SqlxError(_)
            | PersistenceError::InternalError(_) => ErrorKind::Internal,
        }
    }
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;
