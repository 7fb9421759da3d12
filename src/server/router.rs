use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower::Layer;
use tower_http::trace::TraceLayer;

use crate::publisher::Publisher;
use crate::server::handler;
use crate::server::rewrite::{HostRewrite, HostRewriteLayer};
use crate::storage::ObjectStore;

/// Build the axum router with every endpoint, without host rewriting.
pub fn build_router<S: ObjectStore>(publisher: Arc<Publisher<S>>) -> Router {
    Router::new()
        .route("/api/health", get(handler::health))
        .route("/api/publish", post(handler::publish::<S>))
        .route("/s/:site", get(handler::read_published::<S>))
        .route("/s/:site/*rest", get(handler::read_published::<S>))
        .route("/preview/:site", get(handler::read_draft::<S>))
        .fallback(handler::not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(publisher)
}

/// The full application: the router wrapped in host-based site routing.
pub fn build_app<S: ObjectStore>(publisher: Arc<Publisher<S>>) -> HostRewrite<Router> {
    let rewrite = HostRewriteLayer::new(publisher.router().clone());
    rewrite.layer(build_router(publisher))
}
