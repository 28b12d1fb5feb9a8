//! Recovery and tracing: a tower layer
//! wrapping the whole gRPC router, since both need to span the handler's
//! full async lifetime rather than just the pre-dispatch request the
//! [`crate::interceptors::chain::PolykeyInterceptor`] sees. A panic inside
//! a handler is caught, logged with its message, and turned into an
//! `internal` status instead of tearing down the connection.

use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::FutureExt;
use http::{Request, Response};
use tonic::body::BoxBody;
use tower::{Layer, Service};
use tracing::Instrument;

#[derive(Clone, Default)]
pub struct RecoveryLayer;

impl<S> Layer<S> for RecoveryLayer {
    type Service = RecoveryService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RecoveryService { inner }
    }
}

#[derive(Clone)]
pub struct RecoveryService<S> {
    inner: S,
}

impl<S, ReqBody> Service<Request<ReqBody>> for RecoveryService<S>
where
    S: Service<Request<ReqBody>, Response = Response<BoxBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
{
    type Response = Response<BoxBody>;
    type Error = S::Error;
    type Future = Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let method = req.uri().path().to_string();
        let span = tracing::info_span!("grpc_request", rpc = %method);
        let mut inner = self.inner.clone();

        let fut = async move {
            match AssertUnwindSafe(inner.call(req)).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => {
                    let message = panic_message(&*panic);
                    tracing::error!(rpc = %method, message = %message, "panicked while handling request");
                    Ok(tonic::Status::internal("internal_error").to_http())
                }
            }
        };

        Box::pin(fut.instrument(span))
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
