//! Serving the current snapshot of a site.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};

use crate::error::Result;
use crate::mode::Mode;
use crate::resolver::{PointerResolver, Resolution};
use crate::slug::Slug;
use crate::snapshot::HTML_CONTENT_TYPE;
use crate::storage::ObjectStore;

pub const X_ROBOTS_TAG: &str = "x-robots-tag";

/// A resolved page ready to be sent.
#[derive(Debug, Clone)]
pub struct ServedPage {
    pub html: Vec<u8>,
    pub headers: HeaderMap,
    pub resolution: Resolution,
}

impl IntoResponse for ServedPage {
    fn into_response(self) -> Response {
        (StatusCode::OK, self.headers, self.html).into_response()
    }
}

/// Cache and indexing headers for a page in `mode`.
///
/// Published pages may be cached briefly by intermediaries; drafts are
/// never cached and are tagged so crawlers skip them.
pub fn page_headers(mode: Mode, published_max_age: Duration) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(HTML_CONTENT_TYPE));
    match mode {
        Mode::Publish => {
            let value = format!("public, max-age={}", published_max_age.as_secs());
            if let Ok(value) = HeaderValue::from_str(&value) {
                headers.insert(header::CACHE_CONTROL, value);
            }
        }
        Mode::Draft => {
            headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
            headers.insert(X_ROBOTS_TAG, HeaderValue::from_static("noindex, nofollow"));
        }
    }
    headers
}

pub struct ContentServer<S: ObjectStore> {
    resolver: PointerResolver<S>,
    published_max_age: Duration,
}

impl<S: ObjectStore> ContentServer<S> {
    pub fn new(store: Arc<S>, published_max_age: Duration) -> Self {
        Self {
            resolver: PointerResolver::new(store),
            published_max_age,
        }
    }

    pub fn resolver(&self) -> &PointerResolver<S> {
        &self.resolver
    }

    /// Resolve the current snapshot of (site, mode) and fetch its bytes.
    pub async fn serve(&self, site: &Slug, mode: Mode) -> Result<ServedPage> {
        let resolution = self.resolver.resolve(site, mode).await?;
        let html = self.resolver.fetch_snapshot(&resolution).await?;
        tracing::debug!(%site, %mode, bytes = html.len(), "Serving snapshot");
        Ok(ServedPage {
            html,
            headers: page_headers(mode, self.published_max_age),
            resolution,
        })
    }
}
