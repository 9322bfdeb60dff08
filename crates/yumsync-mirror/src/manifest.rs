//! Durable sync state.
//!
//! Every completed cycle leaves a manifest behind in the bucket under
//! `manifests/<repository path>/<timestamp>/manifest.json`, next to an
//! archived copy of the index it replaced. The latest manifest is the
//! only state the next cycle needs: its snapshot is what new upstream
//! metadata gets diffed against. Manifests are never modified or
//! removed once written.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Timelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;
use yumsync_core::RepoSnapshot;
use yumsync_storage::{ObjectStore, PutOptions};

use crate::error::ManifestError;
use crate::paths::{manifest_prefix, mirror_key};

/// Record of one completed sync cycle of a repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub update_time: DateTime<Utc>,
    pub upstream_repository: String,
    /// Bucket key of the index this cycle replaced, archived next to the
    /// manifest. `None` on the first cycle of a repository.
    pub previous_repomd: Option<String>,
    /// Everything the mirror holds for this repository: the current
    /// upstream index plus packages earlier indexes listed but the
    /// current one dropped. Snapshots only ever grow.
    pub snapshot: RepoSnapshot,
    /// Relative paths of the packages transferred during this cycle.
    pub synced_packages: Vec<String>,
}

/// Reads and writes manifests in the manifest area of the bucket.
pub struct ManifestStore {
    store: Arc<dyn ObjectStore>,
}

impl ManifestStore {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Loads the most recent manifest of a repository, if any.
    ///
    /// Manifest areas are named by RFC 3339 timestamps, so the lexically
    /// greatest key under the prefix is the most recent one.
    ///
    /// # Errors
    ///
    /// Fails when listing or reading the bucket fails, or when the stored
    /// manifest does not deserialize.
    pub async fn load_latest(
        &self,
        repository_url: &Url,
    ) -> Result<Option<Manifest>, ManifestError> {
        let prefix = manifest_prefix(repository_url);
        let latest = self
            .store
            .list(&prefix)
            .await?
            .into_iter()
            .filter(|key| key.ends_with("/manifest.json"))
            .max();
        let Some(key) = latest else {
            return Ok(None);
        };
        let Some(data) = self.store.get(&key).await? else {
            return Ok(None);
        };
        debug!("Loaded manifest {key}");
        let manifest: Manifest = serde_json::from_slice(&data)?;
        Ok(Some(manifest))
    }

    /// Commits a completed cycle: archives the currently live index,
    /// publishes the new one, then writes the manifest.
    ///
    /// The order makes an interrupted commit safe to retry. A crash
    /// before the manifest write leaves the previous manifest as the
    /// latest one, so the next cycle diffs against the old state, finds
    /// every object already in place and commits again. Writing the
    /// manifest first would instead record a cycle whose index never
    /// went live, and the revision short-circuit would then skip the
    /// repository forever.
    ///
    /// # Errors
    ///
    /// Fails when any of the bucket writes fail. The live index is only
    /// replaced after the previous one has been archived.
    pub async fn commit(
        &self,
        repository_url: &Url,
        snapshot: RepoSnapshot,
        raw_repomd: Vec<u8>,
        synced_packages: Vec<String>,
    ) -> Result<Manifest, ManifestError> {
        let now = Utc::now();
        let update_time = now.with_nanosecond(0).unwrap_or(now);
        let area = format!(
            "{}{}",
            manifest_prefix(repository_url),
            update_time.to_rfc3339_opts(SecondsFormat::Secs, true)
        );
        let live_key = mirror_key(repository_url, "repodata/repomd.xml");

        let previous_repomd = if self.store.exists(&live_key).await? {
            let archive_key = format!("{area}/repomd.xml");
            self.store
                .copy(&live_key, &archive_key, &PutOptions::immutable())
                .await?;
            debug!("Archived {live_key} to {archive_key}");
            Some(archive_key)
        } else {
            None
        };

        self.store
            .put(&live_key, raw_repomd, &PutOptions::no_cache())
            .await?;

        let manifest = Manifest {
            update_time,
            upstream_repository: repository_url.to_string(),
            previous_repomd,
            snapshot,
            synced_packages,
        };
        let manifest_key = format!("{area}/manifest.json");
        let body = serde_json::to_vec_pretty(&manifest)?;
        self.store
            .put(&manifest_key, body, &PutOptions::no_cache())
            .await?;
        info!("Committed manifest {manifest_key}");
        Ok(manifest)
    }
}
