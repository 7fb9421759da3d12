//! In-memory storage backend.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::Result;
use crate::storage::{ObjectMeta, ObjectStore, PutOptions, StoredObject, target_path};

#[derive(Debug, Clone)]
struct Entry {
    content: Vec<u8>,
    uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Objects {
    entries: BTreeMap<String, Entry>,
    /// Newest timestamp ever handed out or inserted.
    last_uploaded_at: Option<DateTime<Utc>>,
}

impl Objects {
    fn store(&mut self, path: String, content: Vec<u8>, uploaded_at: DateTime<Utc>) {
        self.last_uploaded_at = self.last_uploaded_at.max(Some(uploaded_at));
        self.entries.insert(path, Entry { content, uploaded_at });
    }

    /// Current time, bumped past the newest timestamp so writes stay ordered.
    fn next_timestamp(&self) -> DateTime<Utc> {
        let now = Utc::now();
        match self.last_uploaded_at {
            Some(t) if t >= now => t + TimeDelta::microseconds(1),
            _ => now,
        }
    }
}

/// Storage backend that keeps every object in process memory.
///
/// Cloning is cheap and clones share the same objects. Upload timestamps are
/// strictly increasing in write order, so recency ordering is deterministic
/// even when two writes happen within the same clock tick. Data is lost when
/// the last clone is dropped.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    objects: Arc<RwLock<Objects>>,
    public_base: String,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::with_public_base("memory://objects")
    }

    pub fn with_public_base(public_base: impl Into<String>) -> Self {
        Self {
            objects: Arc::new(RwLock::new(Objects::default())),
            public_base: public_base.into(),
        }
    }

    /// Insert an object verbatim with an explicit upload timestamp.
    ///
    /// Useful for seeding historical layouts such as pointers written under
    /// a suffixed name.
    pub fn insert(&self, path: impl Into<String>, content: impl Into<Vec<u8>>, uploaded_at: DateTime<Utc>) {
        self.write().store(path.into(), content.into(), uploaded_at);
    }

    /// Remove an object, returning `true` if it existed.
    pub fn remove(&self, path: &str) -> bool {
        self.write().entries.remove(path).is_some()
    }

    /// Paths of every stored object, in lexical order.
    pub fn paths(&self) -> Vec<String> {
        self.read().entries.keys().cloned().collect()
    }

    /// A writer that panicked mid-update leaves the map usable, so poisoning
    /// is ignored everywhere.
    fn write(&self) -> RwLockWriteGuard<'_, Objects> {
        self.objects.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn read(&self) -> RwLockReadGuard<'_, Objects> {
        self.objects.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for MemoryStorage {
    fn public_base(&self) -> &str {
        &self.public_base
    }

    async fn put(&self, path: &str, content: &[u8], opts: &PutOptions) -> Result<StoredObject> {
        let path = target_path(path, opts);
        let mut objects = self.write();

        let uploaded_at = objects.next_timestamp();
        objects.store(path.clone(), content.to_vec(), uploaded_at);
        drop(objects);

        tracing::debug!("Stored {} bytes at memory:{}", content.len(), path);
        Ok(StoredObject {
            url: self.url(&path),
            path,
        })
    }

    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let objects = self.read();
        Ok(objects.entries.get(path).map(|e| e.content.clone()))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let objects = self.read();
        Ok(objects
            .entries
            .range(prefix.to_string()..)
            .take_while(|(path, _)| path.starts_with(prefix))
            .map(|(path, e)| ObjectMeta {
                path: path.clone(),
                url: self.url(path),
                uploaded_at: e.uploaded_at,
            })
            .collect())
    }
}
