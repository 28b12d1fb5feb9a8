//! The six-stage interceptor chain: recovery, tracing,
//! rate limiting, authentication, audit enrichment, error translation.
//! Split across three places by how each stage composes with tonic:
//! [`recovery`] is a tower layer wrapping the whole router (stages 1-2),
//! [`chain::PolykeyInterceptor`] is a per-service tonic interceptor
//! (stages 3-5), and error translation (stage 6) is [`crate::error`].

pub mod chain;
pub mod context;
pub mod recovery;

pub use chain::{require_authenticated, request_context, AuthenticationOutcome, PolykeyInterceptor};
pub use context::RequestContext;
pub use recovery::RecoveryLayer;
