//! Error translation: the single place a domain error
//! becomes a wire [`tonic::Status`]. Every crate exposes a `.kind()` that
//! reduces its error to [`error_common::ErrorKind`]; this module is the
//! only thing that knows how a kind becomes a gRPC code.

use tonic::{Code, Status};
use uuid::Uuid;

use error_common::ErrorKind;

fn code_for(kind: ErrorKind) -> Code {
    match kind {
        ErrorKind::Authn => Code::Unauthenticated,
        ErrorKind::Authz => Code::PermissionDenied,
        ErrorKind::NotFound => Code::NotFound,
        ErrorKind::Conflict => Code::Aborted,
        ErrorKind::AlreadyExists => Code::AlreadyExists,
        ErrorKind::Exhausted => Code::ResourceExhausted,
        ErrorKind::Invalid => Code::InvalidArgument,
        ErrorKind::Internal => Code::Internal,
    }
}

/// Internal errors get a correlation id and a full server-side log line;
/// the caller only ever sees the id, never the underlying detail.
fn internal_status(detail: &str) -> Status {
    let correlation_id = Uuid::new_v4();
    tracing::error!(%correlation_id, detail, "internal error");
    Status::internal(format!("internal_error (correlation_id={correlation_id})"))
}

pub fn status_for(kind: ErrorKind, message: &str) -> Status {
    if kind == ErrorKind::Internal {
        return internal_status(message);
    }
    Status::new(code_for(kind), message)
}

pub trait IntoStatus {
    fn into_status(self) -> Status;
}

impl IntoStatus for key_service::KeyServiceError {
    fn into_status(self) -> Status {
        status_for(self.kind(), &self.to_string())
    }
}

impl IntoStatus for auth_core::AuthError {
    fn into_status(self) -> Status {
        status_for(self.kind(), &self.to_string())
    }
}

impl IntoStatus for authz::AuthzError {
    fn into_status(self) -> Status {
        status_for(self.kind(), &self.to_string())
    }
}
