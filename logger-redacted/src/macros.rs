/// Thin wrappers kept for call-site symmetry with [`crate::init`]; the
/// actual redaction happens in the formatter, not at the call site.
#[macro_export]
macro_rules! redacted_info {
    ($($arg:tt)*) => {
        tracing::info!($($arg)*)
    };
}

#[macro_export]
macro_rules! redacted_error {
    ($($arg:tt)*) => {
        tracing::error!($($arg)*)
    };
}
