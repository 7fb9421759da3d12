//! Pluggable object store backends.
//!
//! The crate ships with three built-in backends:
//!
//! - [`MemoryStorage`] -- keeps objects in process memory (tests, ephemeral use).
//! - [`FsStorage`] -- writes to the local filesystem.
//! - [`S3Storage`] -- writes to an Amazon S3 (or compatible) bucket
//!   (requires the `s3` feature).
//!
//! Implement the [`ObjectStore`] trait to add your own backend.

mod fs;
mod memory;
#[cfg(feature = "s3")]
mod s3;

#[cfg(feature = "s3")]
pub use aws_config::Region;
#[cfg(feature = "s3")]
pub use aws_sdk_s3::config::Credentials;
#[cfg(feature = "s3")]
pub use aws_sdk_s3::{Client as S3Client, Config as S3Config, config::Builder as S3ConfigBuilder};
pub use fs::FsStorage;
pub use memory::MemoryStorage;
#[cfg(feature = "s3")]
pub use s3::S3Storage;

use std::future::Future;

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;

use crate::error::Result;

/// Length of the random token a store appends when `exact_name` is off.
const SUFFIX_LEN: usize = 8;

/// Options for [`ObjectStore::put`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutOptions {
    pub content_type: String,
    /// Request public readability. Backends whose visibility is governed
    /// elsewhere (bucket policy, directory permissions) ignore it.
    pub public: bool,
    /// Store the object under exactly the given path, overwriting any
    /// existing object. When `false` the store appends a random suffix to
    /// the last path segment so that every write lands on a fresh path.
    pub exact_name: bool,
}

impl PutOptions {
    /// Public object whose path gets a store-applied random suffix.
    pub fn uniquified(content_type: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            public: true,
            exact_name: false,
        }
    }

    /// Public object stored at exactly the requested path.
    pub fn exact(content_type: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            public: true,
            exact_name: true,
        }
    }
}

/// Where a `put` actually landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub path: String,
    pub url: String,
}

/// A listing entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub path: String,
    pub url: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Trait for object store backends.
///
/// Implementations must be `Send + Sync + 'static` so a single store can be
/// shared by every request handler. The store is assumed to be eventually
/// consistent: a `get` or `list` right after a `put` may not observe it.
///
/// # Implementing a custom backend
///
/// ```rust,no_run
/// use site_publisher::{ObjectMeta, ObjectStore, PutOptions, Result, StoredObject};
///
/// struct MyStore;
///
/// impl ObjectStore for MyStore {
///     fn public_base(&self) -> &str { "https://cdn.example.com" }
///
///     async fn put(&self, path: &str, content: &[u8], opts: &PutOptions) -> Result<StoredObject> {
///         // write content somewhere ...
///         Ok(StoredObject { path: path.to_string(), url: self.url(path) })
///     }
///
///     async fn get(&self, path: &str) -> Result<Option<Vec<u8>>> {
///         Ok(None)
///     }
///
///     async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
///         Ok(Vec::new())
///     }
/// }
/// ```
pub trait ObjectStore: Send + Sync + 'static {
    /// Base URL under which objects are publicly addressable.
    fn public_base(&self) -> &str;

    /// Persist `content` at `path` (or a uniquified variant of it, see
    /// [`PutOptions::exact_name`]) and report where it landed.
    fn put(
        &self,
        path: &str,
        content: &[u8],
        opts: &PutOptions,
    ) -> impl Future<Output = Result<StoredObject>> + Send;

    /// Fetch the object at `path`, or `None` if it does not exist.
    fn get(&self, path: &str) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;

    /// List every object whose path starts with `prefix`.
    fn list(&self, prefix: &str) -> impl Future<Output = Result<Vec<ObjectMeta>>> + Send;

    /// Absolute URL of the object at `path`.
    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.public_base().trim_end_matches('/'), path)
    }

    /// Inverse of [`url`](Self::url). Returns `None` for URLs outside this store.
    fn path_of(&self, url: &str) -> Option<String> {
        let base = self.public_base().trim_end_matches('/');
        let path = url.strip_prefix(base)?.strip_prefix('/')?;
        if path.is_empty() {
            None
        } else {
            Some(path.to_string())
        }
    }
}

/// Resolve the final object path for a write.
pub(crate) fn target_path(path: &str, opts: &PutOptions) -> String {
    if opts.exact_name {
        path.to_string()
    } else {
        with_suffix(path, &random_token())
    }
}

/// Random alphanumeric token of [`SUFFIX_LEN`] characters.
pub(crate) fn random_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(char::from)
        .collect()
}

/// Insert `-{token}` into the last segment of `path`, before its extension.
fn with_suffix(path: &str, token: &str) -> String {
    let (dir, file) = match path.rsplit_once('/') {
        Some((dir, file)) => (Some(dir), file),
        None => (None, path),
    };
    let file = match file.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}-{token}.{ext}"),
        _ => format!("{file}-{token}"),
    };
    match dir {
        Some(dir) => format!("{dir}/{file}"),
        None => file,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_goes_before_extension() {
        assert_eq!(
            with_suffix("sites/acme/latest.json", "Ab12"),
            "sites/acme/latest-Ab12.json"
        );
        assert_eq!(with_suffix("sites/acme/index", "x"), "sites/acme/index-x");
        assert_eq!(with_suffix("file.tar.gz", "x"), "file.tar-x.gz");
        assert_eq!(with_suffix("dir.v2/.hidden", "x"), "dir.v2/.hidden-x");
    }

    #[test]
    fn exact_target_path_is_verbatim() {
        let opts = PutOptions::exact("application/json");
        assert_eq!(target_path("sites/a/latest.json", &opts), "sites/a/latest.json");
    }

    #[test]
    fn uniquified_target_paths_differ() {
        let opts = PutOptions::uniquified("text/html");
        let a = target_path("sites/a/index.html", &opts);
        let b = target_path("sites/a/index.html", &opts);
        assert_ne!(a, b);
        assert!(a.starts_with("sites/a/index-"));
        assert!(a.ends_with(".html"));
    }

    #[tokio::test]
    async fn private_put_is_still_stored() {
        let store = MemoryStorage::new();
        let opts = PutOptions {
            public: false,
            ..PutOptions::exact("text/plain")
        };
        let stored = store.put("sites/a/notes.txt", b"x", &opts).await.unwrap();
        assert_eq!(stored.url, "memory://objects/sites/a/notes.txt");
        assert_eq!(store.get(&stored.path).await.unwrap(), Some(b"x".to_vec()));
    }

    #[test]
    fn url_and_path_round_trip() {
        let store = MemoryStorage::with_public_base("https://cdn.example.com/");
        let url = store.url("sites/acme/latest.json");
        assert_eq!(url, "https://cdn.example.com/sites/acme/latest.json");
        assert_eq!(store.path_of(&url).as_deref(), Some("sites/acme/latest.json"));
        assert_eq!(store.path_of("https://elsewhere.example/sites/acme"), None);
        assert_eq!(store.path_of("https://cdn.example.com"), None);
        assert_eq!(store.path_of("https://cdn.example.comevil/x"), None);
    }
}
