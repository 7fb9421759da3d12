//! HTTP surface: publish endpoint, read endpoints and host routing.

pub mod handler;
pub mod rewrite;
pub mod router;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::ServiceExt;
use axum::extract::Request;
use tokio::net::TcpListener;

pub use rewrite::{HostRewrite, HostRewriteLayer};
pub use router::{build_app, build_router};

use crate::publisher::Publisher;
use crate::storage::ObjectStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
        }
    }
}

/// HTTP server for a [`Publisher`].
pub struct SiteServer<S: ObjectStore> {
    config: ServerConfig,
    publisher: Arc<Publisher<S>>,
}

impl<S: ObjectStore> SiteServer<S> {
    pub fn new(config: ServerConfig, publisher: Publisher<S>) -> Self {
        Self {
            config,
            publisher: Arc::new(publisher),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the application (useful for testing).
    pub fn app(&self) -> HostRewrite<axum::Router> {
        build_app(self.publisher.clone())
    }

    /// Serve requests until Ctrl-C.
    pub async fn serve(self) -> std::io::Result<()> {
        let app = self.app();
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        tracing::info!("Site publisher listening on {}", self.config.bind_addr);
        axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PublisherBuilder;
    use crate::storage::MemoryStorage;

    #[test]
    fn default_config() {
        let c = ServerConfig::default();
        assert_eq!(c.bind_addr, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
    }

    #[tokio::test]
    async fn health_endpoint() {
        use axum::body::Body;
        use tower::ServiceExt;

        let publisher = PublisherBuilder::new(MemoryStorage::new()).build().unwrap();
        let server = SiteServer::new(ServerConfig::default(), publisher);
        let response = server
            .app()
            .oneshot(
                axum::http::Request::builder()
                    .uri("/api/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }
}
