//! Immutable snapshot writes.
//!
//! Every publish stores the full document under a fresh name
//! `{namespace}/{site}/index-{suffix}.html`. Snapshots are never overwritten
//! or deleted, so an older pointer always stays servable.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};

use crate::error::{PublishError, Result};
use crate::mode::Mode;
use crate::slug::Slug;
use crate::storage::{ObjectStore, PutOptions};

/// Declaration every published document has to start with.
pub const DOCTYPE: &str = "<!doctype html";

pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Hex characters of the content digest kept in the snapshot name.
const SUFFIX_LEN: usize = 12;

/// Reference to a stored snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRef {
    pub path: String,
    pub url: String,
}

/// Reject anything that is not a complete HTML document.
///
/// Leading whitespace and a byte-order mark are tolerated before the
/// doctype; the comparison is case-insensitive.
pub fn validate_document(html: &str) -> Result<()> {
    let head = html.trim_start_matches('\u{feff}').trim_start();
    if head.is_empty() {
        return Err(PublishError::InvalidContent("html must not be empty".into()));
    }
    let starts_with_doctype = head
        .get(..DOCTYPE.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(DOCTYPE));
    if !starts_with_doctype {
        return Err(PublishError::InvalidContent(
            "expecting a full HTML document starting with <!doctype html>".into(),
        ));
    }
    Ok(())
}

/// Derive the snapshot file name from the document, the write time and a nonce.
pub fn snapshot_name(html: &str, at: DateTime<Utc>, nonce: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(html.as_bytes());
    hasher.update(at.to_rfc3339_opts(SecondsFormat::Nanos, true).as_bytes());
    hasher.update(nonce.to_be_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("index-{}.html", &digest[..SUFFIX_LEN])
}

/// Storage path a snapshot named `name` is written to.
pub fn snapshot_path(site: &Slug, mode: Mode, name: &str) -> String {
    format!("{}/{}/{}", mode.namespace(), site, name)
}

/// Writes immutable snapshots to the object store.
pub struct SnapshotWriter<S: ObjectStore> {
    store: Arc<S>,
}

impl<S: ObjectStore> SnapshotWriter<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Validate `html` and store it as a new snapshot of `site` in `mode`.
    ///
    /// The write keeps the store's own uniquifying behaviour on; the derived
    /// name already makes each path distinct.
    pub async fn write(&self, site: &Slug, mode: Mode, html: &str) -> Result<SnapshotRef> {
        validate_document(html)?;

        let name = snapshot_name(html, Utc::now(), rand::random());
        let path = snapshot_path(site, mode, &name);
        let stored = self
            .store
            .put(&path, html.as_bytes(), &PutOptions::uniquified(HTML_CONTENT_TYPE))
            .await?;

        tracing::debug!(%site, %mode, path = %stored.path, "Snapshot written");
        Ok(SnapshotRef {
            path: stored.path,
            url: stored.url,
        })
    }
}
