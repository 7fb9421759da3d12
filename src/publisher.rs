//! The publish and read flows, wired over one shared store.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::SiteConfig;
use crate::content::{ContentServer, ServedPage};
use crate::error::{PublishError, Result};
use crate::mode::Mode;
use crate::pointer::PointerManager;
use crate::resolver::{PointerResolver, Resolution};
use crate::routing::{PREVIEW_PREFIX, READ_PREFIX, Route, SiteRouter};
use crate::slug::Slug;
use crate::snapshot::SnapshotWriter;
use crate::storage::ObjectStore;

/// Body of a publish call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishRequest {
    #[serde(default, alias = "slug")]
    pub site: String,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub html: String,
}

impl PublishRequest {
    pub fn new(site: impl Into<String>, mode: Mode, html: impl Into<String>) -> Self {
        Self {
            site: site.into(),
            mode,
            html: html.into(),
        }
    }

    /// Decode a JSON publish body.
    pub fn from_json(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body).map_err(|e| PublishError::BadRequest(e.to_string()))
    }
}

/// Result of a successful publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishReceipt {
    pub ok: bool,
    pub site: String,
    pub mode: Mode,
    /// Where visitors see the page.
    pub published_url: String,
    /// Immutable URL of the stored version.
    pub snapshot_url: String,
    /// URL of the current-version pointer.
    pub pointer_url: String,
}

/// Entry point for publishing and serving sites.
///
/// Holds no mutable state of its own; every call talks to the store directly,
/// so a single `Publisher` can be shared by any number of concurrent requests.
pub struct Publisher<S: ObjectStore> {
    store: Arc<S>,
    config: Arc<SiteConfig>,
    writer: SnapshotWriter<S>,
    pointers: PointerManager<S>,
    content: ContentServer<S>,
    router: SiteRouter,
}

impl<S: ObjectStore> Publisher<S> {
    pub(crate) fn new(store: Arc<S>, config: Arc<SiteConfig>) -> Self {
        Self {
            writer: SnapshotWriter::new(store.clone()),
            pointers: PointerManager::new(store.clone()),
            content: ContentServer::new(store.clone(), config.published_max_age),
            router: SiteRouter::new(config.clone()),
            store,
            config,
        }
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn router(&self) -> &SiteRouter {
        &self.router
    }

    pub fn resolver(&self) -> &PointerResolver<S> {
        self.content.resolver()
    }

    /// Store a new version of a site and make it current.
    ///
    /// Validation happens before any store interaction. A failed snapshot
    /// write leaves the pointer untouched. A failed pointer write after a
    /// successful snapshot write leaves the site on its previous version and
    /// is still reported as a failure so the caller can retry.
    pub async fn publish(&self, request: &PublishRequest) -> Result<PublishReceipt> {
        let site = Slug::normalize(&request.site)?;
        let mode = request.mode;

        let snapshot = self.writer.write(&site, mode, &request.html).await?;

        let pointer = match self.pointers.set_current(&site, mode, &snapshot).await {
            Ok(pointer) => pointer,
            Err(e) => {
                tracing::warn!(
                    %site,
                    %mode,
                    snapshot = %snapshot.path,
                    "Pointer update failed, site keeps serving its previous version: {e}"
                );
                return Err(e);
            }
        };

        tracing::info!(%site, %mode, snapshot = %snapshot.path, "Published");
        Ok(PublishReceipt {
            ok: true,
            published_url: self.published_url(&site, mode),
            site: site.to_string(),
            mode,
            snapshot_url: snapshot.url,
            pointer_url: pointer.url,
        })
    }

    /// Resolve the current pointer of a site without fetching the snapshot.
    pub async fn resolve(&self, site: &str, mode: Mode) -> Result<Resolution> {
        let site = Slug::normalize(site)?;
        self.resolver().resolve(&site, mode).await
    }

    /// Fetch the current version of a site.
    pub async fn serve(&self, site: &str, mode: Mode) -> Result<ServedPage> {
        let site = Slug::normalize(site)?;
        self.content.serve(&site, mode).await
    }

    /// Route a request by host.
    pub fn route(&self, host: &str, path_and_query: &str) -> Route {
        self.router.route(host, path_and_query)
    }

    /// Public URL where `site` is visible in `mode`.
    pub fn published_url(&self, site: &Slug, mode: Mode) -> String {
        let base = &self.config.public_base_url;
        match (mode, self.config.primary_domain()) {
            (Mode::Publish, Some(domain)) => format!("https://{site}.{domain}"),
            (Mode::Publish, None) => format!("{base}{READ_PREFIX}/{site}"),
            (Mode::Draft, _) => format!("{base}{PREVIEW_PREFIX}/{site}"),
        }
    }
}
