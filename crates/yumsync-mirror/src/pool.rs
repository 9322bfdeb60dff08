//! Bounded-concurrency transfer pool.
//!
//! A batch of files moves from upstream into the bucket with at most
//! `max_workers` transfers in flight. Failures stay on their own entry:
//! one bad file never aborts the batch, it lands in the report instead
//! and the caller decides what a partial batch means.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Semaphore;
use tracing::{debug, warn};
use url::Url;
use yumsync_core::{Checksum, Fetcher};
use yumsync_storage::{ObjectStore, PutOptions};

use crate::error::{MirrorError, Result, TransferError};

/// One file to transfer from upstream into the bucket.
#[derive(Debug, Clone)]
pub struct SyncItem {
    /// Absolute upstream URL.
    pub url: Url,
    /// Destination bucket key.
    pub key: String,
    /// Location relative to the repository base, as upstream declares it.
    pub relative_path: String,
    /// Expected checksum, verified while the body streams through.
    pub checksum: Checksum,
    /// Expected size in bytes, when upstream declares one.
    pub size: Option<u64>,
}

/// A transfer that failed, with the entry it belongs to.
#[derive(Debug)]
pub struct FailedSync {
    pub relative_path: String,
    pub error: TransferError,
}

/// Outcome of one batch.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Relative paths now present in the bucket, skipped entries included.
    pub synced: Vec<String>,
    pub failed: Vec<FailedSync>,
    /// Bytes actually downloaded.
    pub bytes: u64,
}

/// Moves batches of files from upstream into the bucket.
pub struct SyncPool {
    store: Arc<dyn ObjectStore>,
    fetcher: Fetcher,
    max_workers: usize,
    scratch_root: PathBuf,
    require_checksum: bool,
}

impl SyncPool {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        fetcher: Fetcher,
        max_workers: usize,
        scratch_root: PathBuf,
        require_checksum: bool,
    ) -> Self {
        Self {
            store,
            fetcher,
            max_workers,
            scratch_root,
            require_checksum,
        }
    }

    /// Transfers a batch. With `skip_existing` set, entries whose key is
    /// already stored with the expected size are counted as synced
    /// without touching upstream.
    ///
    /// # Errors
    ///
    /// Fails when the scratch directory cannot be created or a worker
    /// task panics. Per-entry transfer failures do not fail the batch,
    /// they are collected in the report.
    pub async fn run(&self, items: Vec<SyncItem>, skip_existing: bool) -> Result<SyncReport> {
        if items.is_empty() {
            return Ok(SyncReport::default());
        }
        let scratch = tempfile::Builder::new()
            .prefix("yumsync-")
            .tempdir_in(&self.scratch_root)
            .map_err(|source| {
                MirrorError::Scratch {
                    action: format!(
                        "creating scratch directory in {}",
                        self.scratch_root.display()
                    ),
                    source,
                }
            })?;
        debug!(count = items.len(), "transferring batch");

        let semaphore = Arc::new(Semaphore::new(self.max_workers));

        let synced = Arc::new(Mutex::new(Vec::new()));
        let failed = Arc::new(Mutex::new(Vec::new()));
        let bytes = Arc::new(AtomicU64::new(0));

        let mut handles = Vec::new();

        for (index, item) in items.into_iter().enumerate() {
            let permit = semaphore.clone().acquire_owned().await.unwrap();
            let store = self.store.clone();
            let fetcher = self.fetcher.clone();
            let synced = synced.clone();
            let failed = failed.clone();
            let bytes = bytes.clone();
            let require_checksum = self.require_checksum;
            let dest = scratch
                .path()
                .join(scratch_file_name(index, &item.relative_path));

            let handle = tokio::spawn(async move {
                let result = transfer_one(
                    &store,
                    &fetcher,
                    &item,
                    &dest,
                    skip_existing,
                    require_checksum,
                )
                .await;

                match result {
                    Ok(transferred) => {
                        bytes.fetch_add(transferred, Ordering::Relaxed);
                        synced.lock().unwrap().push(item.relative_path);
                    }
                    Err(error) => {
                        warn!("Failed to sync {}: {error}", item.relative_path);
                        failed.lock().unwrap().push(FailedSync {
                            relative_path: item.relative_path,
                            error,
                        });
                    }
                }

                drop(permit);
            });
            handles.push(handle);
        }

        for handle in handles {
            handle
                .await
                .map_err(|err| MirrorError::Custom(format!("Join handle error: {err}")))?;
        }

        let synced = Arc::try_unwrap(synced).unwrap().into_inner().unwrap();
        let failed = Arc::try_unwrap(failed).unwrap().into_inner().unwrap();
        let bytes = bytes.load(Ordering::Relaxed);

        Ok(SyncReport {
            synced,
            failed,
            bytes,
        })
    }
}

/// Downloads one file to scratch, verifies it and uploads it.
///
/// Returns the number of bytes downloaded, zero for a skipped entry.
async fn transfer_one(
    store: &Arc<dyn ObjectStore>,
    fetcher: &Fetcher,
    item: &SyncItem,
    dest: &Path,
    skip_existing: bool,
    require_checksum: bool,
) -> std::result::Result<u64, TransferError> {
    if skip_existing {
        if let Ok(Some(meta)) = store.head(&item.key).await {
            if item.size.is_none() || item.size == Some(meta.size) {
                debug!("Skipping {}, already stored", item.key);
                return Ok(0);
            }
        }
    }

    let checksum_kind = item.checksum.kind();
    if checksum_kind.is_none() {
        if require_checksum {
            return Err(TransferError::UnverifiableChecksum {
                path: item.relative_path.clone(),
                algorithm: item.checksum.algorithm.clone(),
            });
        }
        warn!(
            "Cannot verify {} with {}, storing unverified",
            item.relative_path, item.checksum.algorithm
        );
    }

    let downloaded = fetcher
        .download_to(&item.url, dest, checksum_kind, item.size)
        .await
        .map_err(|source| {
            TransferError::Download {
                url: item.url.to_string(),
                source,
            }
        })?;

    if let Some(expected) = item.size {
        if downloaded.length != expected {
            return Err(TransferError::SizeMismatch {
                path: item.relative_path.clone(),
                expected,
                actual: downloaded.length,
            });
        }
    }
    if let Some(digest) = &downloaded.digest {
        if !item.checksum.matches(digest) {
            return Err(TransferError::ChecksumMismatch {
                path: item.relative_path.clone(),
                expected: item.checksum.value.clone(),
                actual: digest.clone(),
            });
        }
    }

    store
        .put_file(&item.key, dest, &PutOptions::immutable())
        .await
        .map_err(|source| {
            TransferError::Upload {
                key: item.key.clone(),
                source,
            }
        })?;

    if let Err(err) = tokio::fs::remove_file(dest).await {
        debug!("Failed to remove scratch file {}: {err}", dest.display());
    }

    Ok(downloaded.length)
}

/// Scratch file name for one entry. The index prefix keeps two packages
/// with the same file name apart.
fn scratch_file_name(index: usize, relative_path: &str) -> String {
    let basename = relative_path.rsplit('/').next().unwrap_or(relative_path);
    format!("{index}-{basename}")
}
