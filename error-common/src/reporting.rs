//! Internal-error reporting. Kept deliberately thin: observability backends
//! are an explicit out-of-scope external collaborator.

use crate::error::PolykeyError;
use crate::kind::ErrorKind;

/// Logs an error with full detail, and flags whether it warrants paging
/// (currently: anything that reached `Internal`).
pub fn report(error: &PolykeyError) -> bool {
    error.log();
    matches!(error.kind, ErrorKind::Internal)
}
