//! Filesystem storage backend.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;

use crate::error::{PublishError, Result};
use crate::storage::{ObjectMeta, ObjectStore, PutOptions, StoredObject, random_token, target_path};

/// Hidden sibling of `path` used to stage an overwrite. The leading dot keeps
/// it out of every object prefix and out of listings.
fn scratch_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp-{}", random_token()))
}

/// Storage backend that writes files to the local filesystem.
///
/// Intermediate directories are created automatically. The object path is
/// joined with the base directory to form the file path, and the file's
/// modification time stands in for the upload timestamp.
///
/// # Example
///
/// ```rust,no_run
/// use site_publisher::FsStorage;
///
/// let storage = FsStorage::new("/var/data/sites")
///     .with_public_base("https://static.example.com");
/// ```
pub struct FsStorage {
    base_dir: PathBuf,
    public_base: String,
}

impl FsStorage {
    /// Create a new `FsStorage` rooted at the given directory.
    ///
    /// Object URLs default to `file://{base_dir}`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        let public_base = format!("file://{}", base_dir.display());
        Self {
            base_dir,
            public_base,
        }
    }

    /// Override the base URL objects are addressed by.
    pub fn with_public_base(mut self, public_base: impl Into<String>) -> Self {
        self.public_base = public_base.into();
        self
    }

    fn file_path(&self, key: &str) -> PathBuf {
        self.base_dir.join(key)
    }

    /// Object path of `file` relative to the base directory, `/`-separated.
    fn key_of(&self, file: &Path) -> Option<String> {
        let rel = file.strip_prefix(&self.base_dir).ok()?;
        let parts: Vec<_> = rel
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<_>>()?;
        Some(parts.join("/"))
    }
}

impl ObjectStore for FsStorage {
    fn public_base(&self) -> &str {
        &self.public_base
    }

    async fn put(&self, key: &str, content: &[u8], opts: &PutOptions) -> Result<StoredObject> {
        let key = target_path(key, opts);
        let path = self.file_path(&key);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PublishError::StoreWrite(Box::new(e)))?;
        }

        if opts.exact_name {
            // Readers must see the old or the new content, never a partial
            // file: write a hidden sibling and rename it over the target.
            let scratch = scratch_path(&path);
            if let Err(e) = tokio::fs::write(&scratch, content).await {
                let _ = tokio::fs::remove_file(&scratch).await;
                return Err(PublishError::StoreWrite(Box::new(e)));
            }
            if let Err(e) = tokio::fs::rename(&scratch, &path).await {
                let _ = tokio::fs::remove_file(&scratch).await;
                return Err(PublishError::StoreWrite(Box::new(e)));
            }
        } else {
            // `create_new` so a suffix collision fails instead of overwriting.
            let mut file = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
                .map_err(|e| PublishError::StoreWrite(Box::new(e)))?;
            file.write_all(content)
                .await
                .map_err(|e| PublishError::StoreWrite(Box::new(e)))?;
            file.flush()
                .await
                .map_err(|e| PublishError::StoreWrite(Box::new(e)))?;
        }

        tracing::debug!("Wrote {} bytes to {}", content.len(), path.display());
        Ok(StoredObject {
            url: self.url(&key),
            path: key,
        })
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.file_path(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PublishError::StoreRead(Box::new(e))),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        // Only the directory holding the prefix's last segment needs walking.
        let start = match prefix.rsplit_once('/') {
            Some((dir, _)) => self.file_path(dir),
            None => self.base_dir.clone(),
        };

        let mut found = Vec::new();
        let mut pending = vec![start];
        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(PublishError::StoreRead(Box::new(e))),
            };
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| PublishError::StoreRead(Box::new(e)))?
            {
                let meta = entry
                    .metadata()
                    .await
                    .map_err(|e| PublishError::StoreRead(Box::new(e)))?;
                let path = entry.path();
                if entry.file_name().to_string_lossy().starts_with('.') {
                    continue;
                }
                if meta.is_dir() {
                    pending.push(path);
                    continue;
                }
                let Some(key) = self.key_of(&path) else {
                    continue;
                };
                if !key.starts_with(prefix) {
                    continue;
                }
                let modified = meta
                    .modified()
                    .map_err(|e| PublishError::StoreRead(Box::new(e)))?;
                found.push(ObjectMeta {
                    url: self.url(&key),
                    path: key,
                    uploaded_at: DateTime::<Utc>::from(modified),
                });
            }
        }

        found.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(found)
    }
}
