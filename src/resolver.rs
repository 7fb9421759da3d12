//! Resolution of a site's current snapshot.
//!
//! Two tiers, in order:
//!
//! 1. Direct probe of the fixed pointer path. No listing needed.
//! 2. Recency scan: list every object under the pointer prefix (this catches
//!    pointers that were written with a store-applied suffix, or a fixed
//!    pointer the store has not converged on yet) and take the newest.

use std::sync::Arc;

use crate::error::{PublishError, Result};
use crate::mode::Mode;
use crate::pointer::{Pointer, pointer_path, pointer_prefix};
use crate::slug::Slug;
use crate::storage::{ObjectMeta, ObjectStore};

/// How the pointer was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerSource {
    Direct,
    Scan,
}

/// Outcome of a successful [`PointerResolver::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub site: Slug,
    pub mode: Mode,
    /// Store path of the pointer object that was used.
    pub pointer_path: String,
    pub pointer: Pointer,
    pub source: PointerSource,
}

impl Resolution {
    pub fn snapshot_url(&self) -> &str {
        &self.pointer.url
    }
}

pub struct PointerResolver<S: ObjectStore> {
    store: Arc<S>,
}

impl<S: ObjectStore> PointerResolver<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Find the pointer for (site, mode).
    ///
    /// Returns [`PublishError::PointerMissing`] when neither tier finds one and
    /// [`PublishError::MalformedPointer`] when the chosen pointer is unusable.
    /// Read-only: repeated calls against an unchanged store agree.
    pub async fn resolve(&self, site: &Slug, mode: Mode) -> Result<Resolution> {
        let fixed = pointer_path(site, mode);
        if let Some(bytes) = self.store.get(&fixed).await? {
            let pointer = Pointer::decode(&fixed, &bytes)?;
            return Ok(Resolution {
                site: site.clone(),
                mode,
                pointer_path: fixed,
                pointer,
                source: PointerSource::Direct,
            });
        }

        let prefix = pointer_prefix(site, mode);
        let candidates = self.store.list(&prefix).await?;
        let Some(newest) = newest(candidates, &prefix) else {
            return Err(PublishError::PointerMissing {
                site: site.to_string(),
                mode: mode.to_string(),
            });
        };

        tracing::warn!(
            %site,
            %mode,
            pointer = %newest.path,
            "Fixed pointer absent, using most recent pointer from listing"
        );

        // Listed but gone again: the store has not converged either way.
        let Some(bytes) = self.store.get(&newest.path).await? else {
            return Err(PublishError::PointerMissing {
                site: site.to_string(),
                mode: mode.to_string(),
            });
        };
        let pointer = Pointer::decode(&newest.path, &bytes)?;
        Ok(Resolution {
            site: site.clone(),
            mode,
            pointer_path: newest.path,
            pointer,
            source: PointerSource::Scan,
        })
    }

    /// Fetch the snapshot a resolution points at, bypassing any cache.
    pub async fn fetch_snapshot(&self, resolution: &Resolution) -> Result<Vec<u8>> {
        let url = resolution.snapshot_url();
        let unreachable = |reason: String| PublishError::SnapshotUnreachable {
            url: url.to_string(),
            reason,
        };

        let path = self
            .store
            .path_of(url)
            .ok_or_else(|| unreachable("url is outside the object store".into()))?;
        match self.store.get(&path).await {
            Ok(Some(bytes)) => Ok(bytes),
            Ok(None) => Err(unreachable("snapshot object is absent".into())),
            Err(e) => Err(unreachable(e.to_string())),
        }
    }
}

/// Most recent pointer-like object, ties broken by path for determinism.
fn newest(candidates: Vec<ObjectMeta>, prefix: &str) -> Option<ObjectMeta> {
    candidates
        .into_iter()
        .filter(|m| m.path.starts_with(prefix) && m.path.ends_with(".json"))
        .max_by(|a, b| {
            a.uploaded_at
                .cmp(&b.uploaded_at)
                .then_with(|| a.path.cmp(&b.path))
        })
}
