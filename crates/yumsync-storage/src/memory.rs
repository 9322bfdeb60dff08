//! In-memory store backing the test suites.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{StorageError, StorageResult};
use crate::traits::{ObjectMeta, ObjectStore, PutOptions};

/// One stored object along with the metadata tests may want to inspect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryObject {
    pub data: Vec<u8>,
    pub cache_max_age: Option<u64>,
}

/// A fully in-memory [`ObjectStore`].
///
/// Keys are kept sorted so listings are deterministic.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, MemoryObject>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of one object, for assertions.
    pub fn object(&self, key: &str) -> Option<MemoryObject> {
        self.objects
            .lock()
            .expect("store lock poisoned")
            .get(key)
            .cloned()
    }

    /// Every key currently stored, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .expect("store lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Number of write operations served, copies included.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn insert(&self, key: &str, data: Vec<u8>, opts: &PutOptions) {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.objects.lock().expect("store lock poisoned").insert(
            key.to_string(),
            MemoryObject {
                data,
                cache_max_age: opts.cache_max_age,
            },
        );
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(&self, key: &str, data: Vec<u8>, opts: &PutOptions) -> StorageResult<()> {
        self.insert(key, data, opts);
        Ok(())
    }

    async fn put_file(&self, key: &str, path: &Path, opts: &PutOptions) -> StorageResult<()> {
        let data = tokio::fs::read(path).await.map_err(|source| {
            StorageError::IoError {
                action: format!("reading {}", path.display()),
                source,
            }
        })?;
        self.insert(key, data, opts);
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.object(key).map(|obj| obj.data))
    }

    async fn head(&self, key: &str) -> StorageResult<Option<ObjectMeta>> {
        Ok(self.object(key).map(|obj| {
            ObjectMeta {
                size: obj.data.len() as u64,
            }
        }))
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let objects = self.objects.lock().expect("store lock poisoned");
        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn copy(&self, from: &str, to: &str, opts: &PutOptions) -> StorageResult<()> {
        let mut objects = self.objects.lock().expect("store lock poisoned");
        let source = objects.get(from).cloned().ok_or_else(|| {
            StorageError::Request {
                action: "copy",
                key: from.to_string(),
                message: "source object does not exist".to_string(),
            }
        })?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        // Same semantics as S3: metadata is preserved unless the caller
        // replaces it.
        let cache_max_age = opts.cache_max_age.or(source.cache_max_age);
        objects.insert(
            to.to_string(),
            MemoryObject {
                data: source.data,
                cache_max_age,
            },
        );
        Ok(())
    }
}
