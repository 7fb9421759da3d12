//! The mutable "current version" pointer of a site.
//!
//! One pointer exists per (site, mode) at the fixed path
//! `{namespace}/{site}/latest.json`. It is overwritten in place by every
//! publish, so readers can find it without listing. Concurrent publishers
//! race on it and the last write the store commits wins.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PublishError, Result};
use crate::mode::Mode;
use crate::slug::Slug;
use crate::snapshot::SnapshotRef;
use crate::storage::{ObjectStore, PutOptions};

pub const POINTER_FILE: &str = "latest.json";

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Contents of a pointer object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pointer {
    /// Absolute URL of the current snapshot.
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
}

impl Pointer {
    pub fn new(url: impl Into<String>, mode: Mode, updated_at: DateTime<Utc>) -> Self {
        Self {
            url: url.into(),
            updated_at: Some(updated_at),
            mode: Some(mode),
        }
    }

    /// Decode a pointer read from `path`; a pointer without a URL is malformed.
    pub fn decode(path: &str, bytes: &[u8]) -> Result<Self> {
        let pointer: Pointer =
            serde_json::from_slice(bytes).map_err(|e| PublishError::MalformedPointer {
                path: path.to_string(),
                reason: e.to_string(),
            })?;
        if pointer.url.trim().is_empty() {
            return Err(PublishError::MalformedPointer {
                path: path.to_string(),
                reason: "missing snapshot url".into(),
            });
        }
        Ok(pointer)
    }
}

/// Reference to a written pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointerRef {
    pub path: String,
    pub url: String,
}

/// Fixed, guessable pointer path for (site, mode).
pub fn pointer_path(site: &Slug, mode: Mode) -> String {
    format!("{}/{}/{}", mode.namespace(), site, POINTER_FILE)
}

/// Prefix shared by the fixed pointer and any suffixed pointer variants.
pub fn pointer_prefix(site: &Slug, mode: Mode) -> String {
    format!("{}/{}/latest", mode.namespace(), site)
}

/// Maintains the current-version pointer of each site.
pub struct PointerManager<S: ObjectStore> {
    store: Arc<S>,
}

impl<S: ObjectStore> PointerManager<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Point (site, mode) at `snapshot`.
    ///
    /// The write forces the exact pointer path. It is not atomic with the
    /// snapshot write: on failure the previous pointer stays in place.
    pub async fn set_current(
        &self,
        site: &Slug,
        mode: Mode,
        snapshot: &SnapshotRef,
    ) -> Result<PointerRef> {
        let pointer = Pointer::new(snapshot.url.clone(), mode, Utc::now());
        let body = serde_json::to_vec(&pointer)
            .map_err(|e| PublishError::StoreWrite(Box::new(e)))?;

        let path = pointer_path(site, mode);
        let stored = self
            .store
            .put(&path, &body, &PutOptions::exact(JSON_CONTENT_TYPE))
            .await?;

        tracing::debug!(%site, %mode, snapshot = %snapshot.path, "Pointer updated");
        Ok(PointerRef {
            path: stored.path,
            url: stored.url,
        })
    }
}
