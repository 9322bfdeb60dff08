//! Repository sync cycles.
//!
//! A cycle fetches the upstream index, diffs it against the last
//! committed manifest, transfers whatever the bucket is missing and
//! commits a new manifest. Cycles are stateless between runs: every
//! piece of state lives in the bucket, so any number of hosts can take
//! turns running them.

use std::io::BufReader;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};
use url::Url;
use yumsync_config::Config;
use yumsync_core::{
    carry_forward, decompress, diff_snapshots, join_url, parse_primary, parse_repomd,
    revisions_match, Fetcher, Package, Repomd,
};
use yumsync_storage::{ObjectStore, PutOptions, S3Options, S3Store};

use crate::error::{MirrorError, Result};
use crate::manifest::ManifestStore;
use crate::paths::mirror_key;
use crate::pool::{SyncItem, SyncPool};
use crate::stats::MirrorStats;

/// Outcome of one repository cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The upstream index revision matches the last committed one.
    NoChange,
    /// Every missing file was transferred and a manifest committed.
    Synced { transferred: usize, bytes: u64 },
    /// Some transfers failed. Nothing was committed, so the next cycle
    /// diffs against the old state and retries the difference.
    Partial { synced: usize, failed: usize },
}

/// Outcome of a run across every configured repository.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub synced: usize,
    pub partial: usize,
    pub failed: usize,
}

impl SyncSummary {
    /// Whether any repository failed outright. Partial repositories do
    /// not count, they retry on the next run.
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Drives sync cycles across the configured repositories.
pub struct Mirror {
    config: Config,
    fetcher: Fetcher,
    store: Arc<dyn ObjectStore>,
    manifests: ManifestStore,
    pool: SyncPool,
    stats: MirrorStats,
}

impl Mirror {
    /// Builds a mirror against the configured S3 bucket.
    pub fn new(config: Config) -> Result<Self> {
        let store: Arc<dyn ObjectStore> = Arc::new(S3Store::new(S3Options {
            bucket: config.bucket_name.clone(),
            region: config.bucket_region.clone(),
            access_key_id: config.aws_access_key_id.clone(),
            secret_access_key: config.aws_secret_access_key.clone(),
            endpoint_url: config.endpoint_url.clone(),
            path_style: config.path_style,
        }));
        let stats = MirrorStats::new(config.statsd.as_ref());
        Self::with_store(config, store, stats)
    }

    /// Builds a mirror against an arbitrary store.
    pub fn with_store(
        config: Config,
        store: Arc<dyn ObjectStore>,
        stats: MirrorStats,
    ) -> Result<Self> {
        let fetcher = Fetcher::new()?;
        let manifests = ManifestStore::new(store.clone());
        let pool = SyncPool::new(
            store.clone(),
            fetcher.clone(),
            config.max_workers,
            config.scratch_dir.clone(),
            config.require_checksum,
        );
        Ok(Self {
            config,
            fetcher,
            store,
            manifests,
            pool,
            stats,
        })
    }

    /// Runs one cycle for every configured repository.
    ///
    /// `only` narrows the run to repositories whose URL contains the
    /// given fragment. A failing repository never stops the others.
    pub async fn sync_all(&self, seed: bool, only: Option<&str>) -> SyncSummary {
        let mut summary = SyncSummary::default();
        for url in &self.config.upstream_repositories {
            if let Some(fragment) = only {
                if !url.as_str().contains(fragment) {
                    debug!("Skipping {url}");
                    continue;
                }
            }
            let repo = url.path();
            let started = Instant::now();
            let outcome = self.sync_repository(url, seed).await;
            self.stats
                .gauge("cycle_seconds", started.elapsed().as_secs_f64(), repo);

            match outcome {
                Ok(CycleOutcome::NoChange) => {
                    info!("Repository {url} is up to date");
                    summary.synced += 1;
                }
                Ok(CycleOutcome::Synced { transferred, bytes }) => {
                    info!("Synced {transferred} packages ({bytes} bytes) from {url}");
                    summary.synced += 1;
                }
                Ok(CycleOutcome::Partial { synced, failed }) => {
                    warn!(
                        "Synced {synced} packages from {url} with {failed} failures, \
                         will retry on the next run"
                    );
                    self.stats.count("cycle_partial", 1, repo);
                    summary.partial += 1;
                }
                Err(err) => {
                    error!("Failed to sync repository {url}: {err}");
                    self.stats.count("cycle_failed", 1, repo);
                    summary.failed += 1;
                }
            }
        }
        summary
    }

    /// Runs one sync cycle for one repository.
    ///
    /// With `seed` set, stored state is ignored, every file of the
    /// repository is considered missing and files already stored with
    /// the expected size are skipped. Seeding publishes the index
    /// directly and leaves no manifest behind; the first regular cycle
    /// afterwards commits one.
    pub async fn sync_repository(&self, url: &Url, seed: bool) -> Result<CycleOutcome> {
        info!("Syncing repository {url}");
        let repo = url.path();

        let repomd_url = join_url(url, "repodata/repomd.xml")?;
        let raw_repomd = self.fetcher.fetch_bytes(&repomd_url).await?;
        let repomd = parse_repomd(&raw_repomd)?;

        let prior = if seed {
            None
        } else {
            self.manifests.load_latest(url).await?
        };

        if let Some(prior) = &prior {
            if revisions_match(
                repomd.revision.as_deref(),
                prior.snapshot.index_revision.as_deref(),
            ) {
                debug!(
                    "Index revision {:?} unchanged, nothing to do",
                    repomd.revision
                );
                return Ok(CycleOutcome::NoChange);
            }
        }

        let primary = repomd.require_section("primary")?;
        let primary_url = join_url(url, &primary.location)?;
        let compressed = self.fetcher.fetch_bytes(&primary_url).await?;
        let reader = BufReader::new(decompress(compressed)?);
        let snapshot = parse_primary(reader, url, repomd.revision.clone())?;
        self.stats
            .count("packages_fetched", snapshot.packages.len() as u64, repo);

        let missing = diff_snapshots(&snapshot, prior.as_ref().map(|m| &m.snapshot));
        self.stats.count("packages_diffed", missing.len() as u64, repo);
        info!(
            "{} of {} packages need transfer",
            missing.len(),
            snapshot.packages.len()
        );

        let package_report = self.pool.run(self.package_items(url, &missing)?, seed).await?;
        let section_report = self.pool.run(self.section_items(url, &repomd)?, seed).await?;

        let transferred = package_report.synced.len();
        let bytes = package_report.bytes + section_report.bytes;
        self.stats.count("packages_synced", transferred as u64, repo);
        self.stats.count("sync_bytes", bytes, repo);

        let failed = package_report.failed.len() + section_report.failed.len();
        if failed > 0 {
            self.stats.count("packages_failed", failed as u64, repo);
            return Ok(CycleOutcome::Partial {
                synced: transferred,
                failed,
            });
        }

        if seed {
            let live_key = mirror_key(url, "repodata/repomd.xml");
            self.store
                .put(&live_key, raw_repomd, &PutOptions::no_cache())
                .await
                .map_err(|source| {
                    MirrorError::Publish {
                        key: live_key.clone(),
                        source,
                    }
                })?;
        } else {
            let recorded = match &prior {
                Some(prev) => carry_forward(snapshot, &prev.snapshot),
                None => snapshot,
            };
            self.manifests
                .commit(url, recorded, raw_repomd, package_report.synced)
                .await?;
        }

        Ok(CycleOutcome::Synced { transferred, bytes })
    }

    fn package_items(&self, url: &Url, packages: &[Package]) -> Result<Vec<SyncItem>> {
        packages
            .iter()
            .map(|pkg| {
                Ok(SyncItem {
                    url: join_url(url, &pkg.relative_path)?,
                    key: mirror_key(url, &pkg.relative_path),
                    relative_path: pkg.relative_path.clone(),
                    checksum: pkg.checksum.clone(),
                    size: Some(pkg.size),
                })
            })
            .collect()
    }

    /// Every metadata file the new index references, the index itself
    /// excluded. Section names carry their content hash, so unchanged
    /// sections overwrite themselves with identical bytes.
    fn section_items(&self, url: &Url, repomd: &Repomd) -> Result<Vec<SyncItem>> {
        repomd
            .sections
            .iter()
            .map(|section| {
                Ok(SyncItem {
                    url: join_url(url, &section.location)?,
                    key: mirror_key(url, &section.location),
                    relative_path: section.location.clone(),
                    checksum: section.checksum.clone(),
                    size: section.size,
                })
            })
            .collect()
    }
}
