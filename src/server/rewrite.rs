//! Tower middleware applying host-based site routing.
//!
//! Wraps the whole axum router so the rewritten URI is what route matching
//! sees.

use std::task::{Context, Poll};

use axum::http::{Request, Uri, header};
use tower::{Layer, Service};

use crate::routing::{Route, SiteRouter};

#[derive(Debug, Clone)]
pub struct HostRewriteLayer {
    router: SiteRouter,
}

impl HostRewriteLayer {
    pub fn new(router: SiteRouter) -> Self {
        Self { router }
    }
}

impl<S> Layer<S> for HostRewriteLayer {
    type Service = HostRewrite<S>;

    fn layer(&self, inner: S) -> Self::Service {
        HostRewrite {
            inner,
            router: self.router.clone(),
        }
    }
}

/// Service produced by [`HostRewriteLayer`].
#[derive(Debug, Clone)]
pub struct HostRewrite<S> {
    inner: S,
    router: SiteRouter,
}

impl<S, B> Service<Request<B>> for HostRewrite<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        rewrite(&self.router, &mut req);
        self.inner.call(req)
    }
}

fn rewrite<B>(router: &SiteRouter, req: &mut Request<B>) {
    let route = {
        // HTTP/2 carries the host in the URI authority instead of a header.
        let host = req
            .headers()
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .or_else(|| req.uri().host())
            .unwrap_or_default();
        let target = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        router.route(host, target)
    };

    if let Route::Rewrite {
        site,
        path_and_query,
    } = route
    {
        match path_and_query.parse::<Uri>() {
            Ok(uri) => {
                tracing::debug!(%site, from = %req.uri(), to = %uri, "Host rewrite");
                *req.uri_mut() = uri;
            }
            Err(e) => tracing::warn!(%site, "Rewritten target {path_and_query:?} is not a URI: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use std::convert::Infallible;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn layer() -> HostRewriteLayer {
        HostRewriteLayer::new(SiteRouter::new(Arc::new(SiteConfig {
            base_domains: vec!["example.com".into()],
            ..SiteConfig::default()
        })))
    }

    async fn seen_path(host: &str, uri: &str) -> String {
        let echo = tower::service_fn(|req: Request<()>| async move {
            Ok::<_, Infallible>(req.uri().to_string())
        });
        let req = Request::builder().uri(uri).header(header::HOST, host).body(()).unwrap();
        layer().layer(echo).oneshot(req).await.unwrap()
    }

    #[tokio::test]
    async fn rewrites_site_hosts() {
        assert_eq!(seen_path("acme.example.com", "/").await, "/s/acme");
        assert_eq!(seen_path("acme.example.com", "/a/b?c=d").await, "/s/acme/a/b?c=d");
    }

    #[tokio::test]
    async fn leaves_other_requests_alone() {
        assert_eq!(seen_path("example.com", "/").await, "/");
        assert_eq!(seen_path("acme.example.com", "/api/publish").await, "/api/publish");
    }

    #[tokio::test]
    async fn uses_uri_authority_without_host_header() {
        let echo = tower::service_fn(|req: Request<()>| async move {
            Ok::<_, Infallible>(req.uri().to_string())
        });
        let req = Request::builder()
            .uri("https://acme.example.com/")
            .body(())
            .unwrap();
        let seen = layer().layer(echo).oneshot(req).await.unwrap();
        assert_eq!(seen, "/s/acme");
    }
}
