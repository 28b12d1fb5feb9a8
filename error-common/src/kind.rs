//! The error taxonomy shared by every polykey crate.
//!
//! Every fallible operation in the system ultimately reduces to one of these
//! kinds before it reaches the RPC boundary. The `server` crate is the only
//! place that turns a [`ErrorKind`] into a transport status code; library
//! crates only need to pick the right kind.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error taxonomy. Each kind has a single fixed mapping to a wire
/// status, enforced in `server::interceptors::error_translation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Missing, malformed, expired or revoked credentials.
    Authn,
    /// Authenticated but not permitted to perform the operation.
    Authz,
    /// The referenced resource (key, version, token) does not exist.
    NotFound,
    /// The resource exists but is in a state that conflicts with the request.
    Conflict,
    /// A create requested an identity that already names a resource.
    AlreadyExists,
    /// A bounded resource (rate limit, queue, pool) is exhausted.
    Exhausted,
    /// The request itself is malformed independent of any stored state.
    Invalid,
    /// Unexpected internal fault; never leaked verbatim to the caller.
    Internal,
}

impl ErrorKind {
    /// The gRPC-style status name this kind maps to.
    pub fn wire_status(self) -> &'static str {
        match self {
            ErrorKind::Authn => "UNAUTHENTICATED",
            ErrorKind::Authz => "PERMISSION_DENIED",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Conflict => "ABORTED",
            ErrorKind::AlreadyExists => "ALREADY_EXISTS",
            ErrorKind::Exhausted => "RESOURCE_EXHAUSTED",
            ErrorKind::Invalid => "INVALID_ARGUMENT",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
