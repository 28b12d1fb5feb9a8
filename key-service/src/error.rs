use error_common::ErrorKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KeyServiceError {
    #[error(transparent)]
    Authz(#[from] authz::AuthzError),
    #[error(transparent)]
    Persistence(#[from] persistence::PersistenceError),
    #[error(transparent)]
    Crypto(#[from] crypto::CryptoError),
    #[error("key {0} is revoked")]
    KeyRevoked(String),
    #[error("rotation queue is full")]
    BackpressureExceeded,
    #[error("rotation result channel was dropped before completion")]
    RotationCancelled,
    #[error("internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl KeyServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            KeyServiceError::Authz(e) => e.kind(),
            KeyServiceError::Persistence(e) => e.kind(),
            KeyServiceError::Crypto(_) => ErrorKind::Internal,
            KeyServiceError::KeyRevoked(_) => ErrorKind::NotFound,
            KeyServiceError::BackpressureExceeded => ErrorKind::Exhausted,
            KeyServiceError::RotationCancelled => ErrorKind::Internal,
            KeyServiceError::InternalError(_) => ErrorKind::Internal,
        }
    }
}

pub type KeyServiceResult<T> = Result<T, KeyServiceError>;
