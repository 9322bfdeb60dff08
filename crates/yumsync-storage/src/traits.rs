//! The storage capability surface.

use std::path::Path;

use async_trait::async_trait;

use crate::error::StorageResult;

const IMMUTABLE_MAX_AGE: u64 = 365 * 24 * 3600;

/// Metadata attached to an object at write time.
#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    /// `Cache-Control: max-age` value. None writes no cache header.
    pub cache_max_age: Option<u64>,
}

impl PutOptions {
    /// Options for content-addressed objects that never change, which is
    /// everything except the live index and the manifest pointer.
    pub fn immutable() -> Self {
        Self {
            cache_max_age: Some(IMMUTABLE_MAX_AGE),
        }
    }

    /// Options for objects clients must always revalidate.
    pub fn no_cache() -> Self {
        Self {
            cache_max_age: Some(0),
        }
    }

    pub fn cache_control(&self) -> Option<String> {
        self.cache_max_age.map(|age| format!("max-age={age}"))
    }
}

/// Metadata returned by [`ObjectStore::head`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub size: u64,
}

/// Write-side view of the mirror bucket.
///
/// There is deliberately no delete operation here. A mirror only ever
/// grows; removing an object a client may still be downloading is never
/// correct.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Writes a small object from memory.
    async fn put(&self, key: &str, data: Vec<u8>, opts: &PutOptions) -> StorageResult<()>;

    /// Streams a local file to an object.
    async fn put_file(&self, key: &str, path: &Path, opts: &PutOptions) -> StorageResult<()>;

    /// Reads an object fully into memory. Missing objects are `None`.
    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Fetches object metadata without the body. Missing objects are `None`.
    async fn head(&self, key: &str) -> StorageResult<Option<ObjectMeta>>;

    /// Lists every key under a prefix.
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// Server-side copy between two keys. When `opts` carries cache
    /// metadata the destination gets it in place of the source's.
    async fn copy(&self, from: &str, to: &str, opts: &PutOptions) -> StorageResult<()>;

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.head(key).await?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_control_rendering() {
        assert_eq!(
            PutOptions::immutable().cache_control().as_deref(),
            Some("max-age=31536000")
        );
        assert_eq!(
            PutOptions::no_cache().cache_control().as_deref(),
            Some("max-age=0")
        );
        assert_eq!(PutOptions::default().cache_control(), None);
    }
}
