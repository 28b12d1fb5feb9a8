//! The rate-limit, authentication, and audit-context stages of the
//! interceptor chain. Recovery and tracing wrap the whole request as a
//! tower layer instead, since they need to span the async handler's
//! full lifetime; error translation lives in [`crate::error`] and is
//! invoked by each handler.

use std::sync::Arc;

use tonic::{Request, Status};

use auth_core::TokenManager;
use authz::AuthenticatedUser;
use rate_limiter::RateLimiter;

use crate::error::status_for;
use crate::interceptors::context::RequestContext;
use error_common::ErrorKind;

/// Result of attempting to authenticate the request, stashed in the
/// request extensions by [`PolykeyInterceptor`]. Handlers decide whether
/// authentication is required for their RPC; `HealthCheck`/`Authenticate`
/// simply never read this extension.
#[derive(Debug, Clone)]
pub enum AuthenticationOutcome {
    Authenticated(AuthenticatedUser),
    Missing,
    Invalid(String),
}

#[derive(Clone)]
pub struct PolykeyInterceptor {
    rate_limiter: Arc<RateLimiter>,
    token_manager: Arc<TokenManager>,
}

impl PolykeyInterceptor {
    pub fn new(rate_limiter: Arc<RateLimiter>, token_manager: Arc<TokenManager>) -> Self {
        Self { rate_limiter, token_manager }
    }
}

impl tonic::service::Interceptor for PolykeyInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        let peer = request.remote_addr().map(|a| a.to_string()).unwrap_or_else(|| "unknown".to_string());

        if !self.rate_limiter.check(&peer) {
            return Err(status_for(ErrorKind::Exhausted, "rate limit exceeded"));
        }

        let user_agent = header_value(&request, "user-agent");
        request.extensions_mut().insert(RequestContext::new(Some(peer), user_agent));

        let outcome = match header_value(&request, "authorization") {
            None => AuthenticationOutcome::Missing,
            Some(header) => match header.strip_prefix("Bearer ") {
                None => AuthenticationOutcome::Invalid("malformed authorization header".to_string()),
                Some(token) => match self.token_manager.verify(token) {
                    Ok(claims) => AuthenticationOutcome::Authenticated(AuthenticatedUser {
                        id: claims.user_id,
                        permissions: claims.permissions,
                        tier: claims.tier,
                    }),
                    Err(e) => AuthenticationOutcome::Invalid(e.to_string()),
                },
            },
        };
        request.extensions_mut().insert(outcome);

        Ok(request)
    }
}

fn header_value(request: &Request<()>, key: &str) -> Option<String> {
    request.metadata().get(key).and_then(|v| v.to_str().ok()).map(str::to_string)
}

/// Reads the authentication outcome a handler requires a user for. Every
/// RPC except `HealthCheck`/`Authenticate` calls this first.
pub fn require_authenticated<T>(request: &Request<T>) -> Result<AuthenticatedUser, Status> {
    match request.extensions().get::<AuthenticationOutcome>() {
        Some(AuthenticationOutcome::Authenticated(user)) => Ok(user.clone()),
        Some(AuthenticationOutcome::Invalid(_)) | Some(AuthenticationOutcome::Missing) | None => {
            Err(status_for(ErrorKind::Authn, "missing or invalid bearer token"))
        }
    }
}

pub fn request_context<T>(request: &Request<T>) -> Option<RequestContext> {
    request.extensions().get::<RequestContext>().cloned()
}
