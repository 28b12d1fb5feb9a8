//! gRPC composition root for polykey: a multi-tenant key-management
//! service providing envelope encryption, versioned key storage, and an
//! audit trail over a single `PolykeyService` RPC surface.

pub mod composition;
pub mod conversions;
pub mod error;
pub mod interceptors;
pub mod service;

pub mod proto {
    tonic::include_proto!("polykey.v1");
}

pub use composition::PolykeyServer;
pub use service::PolykeyServiceImpl;

use std::net::SocketAddr;

use tonic::transport::Server;

use interceptors::{PolykeyInterceptor, RecoveryLayer};
use proto::polykey_service_server::PolykeyServiceServer;

/// Starts the gRPC server and runs until the process is signaled to stop.
/// Recovery/tracing wrap the whole router as a tower layer; rate
/// limiting and authentication run per-request through
/// [`PolykeyInterceptor`].
pub async fn serve(addr: SocketAddr, composition: PolykeyServer) -> anyhow::Result<()> {
    let interceptor = PolykeyInterceptor::new(
        std::sync::Arc::clone(&composition.rate_limiter),
        std::sync::Arc::clone(&composition.token_manager),
    );
    let service_impl = PolykeyServiceImpl::new(composition);

    tracing::info!(%addr, "starting polykey gRPC server");

    Server::builder()
        .layer(RecoveryLayer)
        .add_service(PolykeyServiceServer::with_interceptor(service_impl, interceptor))
        .serve(addr)
        .await?;

    Ok(())
}
