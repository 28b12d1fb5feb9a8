use error_common::ErrorKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthzError {
    #[error("operation {0} is not in the caller's permissions")]
    OperationNotAllowed(String),
    #[error("caller is not in the key's authorized contexts")]
    InsufficientKeyPermissions,
    #[error("tier {0} does not permit storage profile {1}")]
    TierNotPermitted(String, String),
    #[error("internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl AuthzError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthzError::OperationNotAllowed(_) => ErrorKind::Authz,
            AuthzError::InsufficientKeyPermissions => ErrorKind::Authz,
            AuthzError::TierNotPermitted(_, _) => ErrorKind::Authz,
            AuthzError::InternalError(_) => ErrorKind::Internal,
        }
    }
}

pub type AuthzResult<T> = Result<T, AuthzError>;
