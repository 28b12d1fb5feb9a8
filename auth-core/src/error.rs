use error_common::ErrorKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("client {0} not found")]
    ClientNotFound(String),

    #[error("invalid client credentials")]
    InvalidCredentials,

    #[error("malformed client credential record: {0}")]
    MalformedCredentialRecord(String),

    #[error("token is malformed or has an invalid signature")]
    TokenInvalid,

    #[error("token has expired")]
    TokenExpired,

    #[error("token has been revoked")]
    TokenRevoked,

    #[error("key material error: {0}")]
    KeyMaterial(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::TokenInvalid | AuthError::TokenExpired | AuthError::TokenRevoked => {
                ErrorKind::Authn
            }
            AuthError::ClientNotFound(_) | AuthError::InvalidCredentials => ErrorKind::Authn,
            AuthError::MalformedCredentialRecord(_) => ErrorKind::Internal,
            AuthError::KeyMaterial(_) | AuthError::Config(_) | AuthError::InternalError(_) => {
                ErrorKind::Internal
            }
        }
    }
}

pub type AuthResult<T> = Result<T, AuthError>;
