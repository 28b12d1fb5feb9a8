use error_common::ErrorKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("audit channel is full, event dropped")]
    ChannelFull,
    #[error("audit batch persistence failed after retries: {0}")]
    PersistenceFailed(String),
    #[error("internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl AuditError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuditError::ChannelFull => ErrorKind::Exhausted,
            AuditError::PersistenceFailed(_) => ErrorKind::Internal,
            AuditError::InternalError(_) => ErrorKind::Internal,
        }
    }
}

pub type AuditResult<T> = Result<T, AuditError>;
