//! Full sync cycles against a fake upstream repository.

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use tiny_http::{Response, Server};
use url::Url;
use yumsync_config::Config;
use yumsync_mirror::{CycleOutcome, ManifestStore, Mirror, MirrorStats, SyncSummary};
use yumsync_storage::{MemoryStore, ObjectStore, PutOptions};

const BASE: &str = "/fedora/41/x86_64/";

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

#[derive(Clone)]
struct FakePackage {
    name: String,
    version: String,
    body: Vec<u8>,
}

fn package(name: &str, version: &str, body: &[u8]) -> FakePackage {
    FakePackage {
        name: name.to_string(),
        version: version.to_string(),
        body: body.to_vec(),
    }
}

/// An upstream repository state: a revision plus its package set, from
/// which the served metadata is generated.
struct FakeRepo {
    revision: String,
    packages: Vec<FakePackage>,
}

impl FakeRepo {
    fn new(revision: &str, packages: Vec<FakePackage>) -> Self {
        Self {
            revision: revision.to_string(),
            packages,
        }
    }

    fn primary_xml(&self) -> String {
        let mut xml = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <metadata xmlns=\"http://linux.duke.edu/metadata/common\" \
             xmlns:rpm=\"http://linux.duke.edu/metadata/rpm\" packages=\"{}\">\n",
            self.packages.len()
        );
        for pkg in &self.packages {
            xml.push_str(&format!(
                "<package type=\"rpm\">\
                 <name>{name}</name>\
                 <arch>x86_64</arch>\
                 <version epoch=\"0\" ver=\"{version}\" rel=\"1.fc41\"/>\
                 <checksum type=\"sha256\" pkgid=\"YES\">{sha}</checksum>\
                 <location href=\"Packages/{name}.rpm\"/>\
                 <format><rpm:license>MIT</rpm:license></format>\
                 <size package=\"{size}\" installed=\"100\" archive=\"120\"/>\
                 </package>\n",
                name = pkg.name,
                version = pkg.version,
                sha = sha256_hex(&pkg.body),
                size = pkg.body.len()
            ));
        }
        xml.push_str("</metadata>\n");
        xml
    }

    fn repomd_xml(&self, location: &str, gz: &[u8]) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <repomd xmlns=\"http://linux.duke.edu/metadata/repo\" \
             xmlns:rpm=\"http://linux.duke.edu/metadata/rpm\">\n\
             <revision>{revision}</revision>\n\
             <data type=\"primary\">\
             <checksum type=\"sha256\">{sha}</checksum>\
             <location href=\"{location}\"/>\
             <timestamp>1724580000</timestamp>\
             <size>{size}</size>\
             </data>\n\
             </repomd>\n",
            revision = self.revision,
            sha = sha256_hex(gz),
            location = location,
            size = gz.len()
        )
    }

    /// Server route of the primary index this state generates.
    fn primary_route(&self) -> String {
        let gz = gzip(self.primary_xml().as_bytes());
        format!("{BASE}repodata/{}-primary.xml.gz", sha256_hex(&gz))
    }

    fn routes(&self) -> HashMap<String, Vec<u8>> {
        let mut routes = HashMap::new();
        let gz = gzip(self.primary_xml().as_bytes());
        let location = format!("repodata/{}-primary.xml.gz", sha256_hex(&gz));
        let repomd = self.repomd_xml(&location, &gz);
        routes.insert(
            format!("{BASE}repodata/repomd.xml"),
            repomd.into_bytes(),
        );
        routes.insert(format!("{BASE}{location}"), gz);
        for pkg in &self.packages {
            routes.insert(format!("{BASE}Packages/{}.rpm", pkg.name), pkg.body.clone());
        }
        routes
    }
}

struct TestUpstream {
    url: Url,
    routes: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    hits: Arc<Mutex<HashMap<String, usize>>>,
    _server: Arc<Server>,
}

impl TestUpstream {
    fn start() -> Self {
        let server = Arc::new(Server::http("127.0.0.1:0").unwrap());
        let port = server.server_addr().to_ip().expect("not an IP addr").port();
        let url = Url::parse(&format!("http://127.0.0.1:{port}{BASE}")).unwrap();
        let routes: Arc<Mutex<HashMap<String, Vec<u8>>>> = Arc::new(Mutex::new(HashMap::new()));
        let hits: Arc<Mutex<HashMap<String, usize>>> = Arc::new(Mutex::new(HashMap::new()));

        for _ in 0..4 {
            let srv = Arc::clone(&server);
            let routes = Arc::clone(&routes);
            let hits = Arc::clone(&hits);
            thread::spawn(move || {
                for request in srv.incoming_requests() {
                    let path = request.url().to_string();
                    *hits.lock().unwrap().entry(path.clone()).or_insert(0) += 1;
                    let body = routes.lock().unwrap().get(&path).cloned();
                    match body {
                        Some(body) => {
                            let _ = request.respond(Response::from_data(body));
                        }
                        None => {
                            let _ = request.respond(Response::empty(404));
                        }
                    }
                }
            });
        }

        Self {
            url,
            routes,
            hits,
            _server: server,
        }
    }

    fn set_repository(&self, repo: &FakeRepo) {
        *self.routes.lock().unwrap() = repo.routes();
    }

    fn remove_route(&self, path: &str) {
        self.routes.lock().unwrap().remove(path);
    }

    fn hits(&self, path: &str) -> usize {
        self.hits.lock().unwrap().get(path).copied().unwrap_or(0)
    }
}

fn test_config(upstreams: Vec<Url>, scratch: &Path) -> Config {
    Config {
        aws_access_key_id: "test-key".to_string(),
        aws_secret_access_key: "test-secret".to_string(),
        bucket_name: "mirror".to_string(),
        bucket_region: "us-east-1".to_string(),
        endpoint_url: None,
        path_style: false,
        max_workers: 4,
        scratch_dir: scratch.to_path_buf(),
        upstream_repositories: upstreams,
        require_checksum: false,
        statsd: None,
    }
}

fn mirror_for(upstream: &TestUpstream, store: &Arc<MemoryStore>, scratch: &Path) -> Mirror {
    let config = test_config(vec![upstream.url.clone()], scratch);
    Mirror::with_store(
        config,
        Arc::clone(store) as Arc<dyn ObjectStore>,
        MirrorStats::disabled(),
    )
    .unwrap()
}

#[tokio::test]
async fn test_first_sync_then_incremental_diff() {
    let upstream = TestUpstream::start();
    let repo_a = FakeRepo::new(
        "100",
        vec![
            package("bash", "5.2", b"bash 5.2 body"),
            package("coreutils", "9.4", b"coreutils 9.4 body"),
        ],
    );
    upstream.set_repository(&repo_a);

    let store = Arc::new(MemoryStore::new());
    let scratch = tempfile::tempdir().unwrap();
    let mirror = mirror_for(&upstream, &store, scratch.path());
    let url = upstream.url.clone();

    let outcome = mirror.sync_repository(&url, false).await.unwrap();
    assert!(matches!(outcome, CycleOutcome::Synced { transferred: 2, .. }));

    let bash = store.object("fedora/41/x86_64/Packages/bash.rpm").unwrap();
    assert_eq!(bash.data, b"bash 5.2 body");
    assert_eq!(bash.cache_max_age, Some(31536000));
    assert!(store
        .object("fedora/41/x86_64/Packages/coreutils.rpm")
        .is_some());

    let live = store
        .object("fedora/41/x86_64/repodata/repomd.xml")
        .unwrap();
    assert!(String::from_utf8(live.data)
        .unwrap()
        .contains("<revision>100</revision>"));
    assert_eq!(live.cache_max_age, Some(0));

    let manifests = ManifestStore::new(Arc::clone(&store) as Arc<dyn ObjectStore>);
    let first = manifests.load_latest(&url).await.unwrap().unwrap();
    assert_eq!(first.snapshot.packages.len(), 2);
    assert_eq!(first.previous_repomd, None);
    assert_eq!(first.synced_packages.len(), 2);

    // Manifest areas are second-granular, so the next commit needs to
    // land in a later second to get its own area.
    tokio::time::sleep(Duration::from_millis(1100)).await;

    // New upstream state: bash updated in place, vim added, coreutils
    // dropped from the index.
    let repo_b = FakeRepo::new(
        "200",
        vec![
            package("bash", "5.3", b"bash 5.3 rebuilt body"),
            package("vim", "9.1", b"vim 9.1 body"),
        ],
    );
    upstream.set_repository(&repo_b);

    let outcome = mirror.sync_repository(&url, false).await.unwrap();
    assert!(matches!(outcome, CycleOutcome::Synced { transferred: 2, .. }));

    let bash = store.object("fedora/41/x86_64/Packages/bash.rpm").unwrap();
    assert_eq!(bash.data, b"bash 5.3 rebuilt body");
    assert!(store.object("fedora/41/x86_64/Packages/vim.rpm").is_some());
    // Dropped upstream, but a mirror never deletes.
    assert!(store
        .object("fedora/41/x86_64/Packages/coreutils.rpm")
        .is_some());

    let second = manifests.load_latest(&url).await.unwrap().unwrap();
    assert_eq!(second.snapshot.index_revision.as_deref(), Some("200"));
    // The dropped coreutils entry is carried into the new snapshot, so
    // the manifest keeps describing everything the bucket holds.
    assert_eq!(second.snapshot.packages.len(), 3);
    for pkg in &first.snapshot.packages {
        assert!(second
            .snapshot
            .packages
            .iter()
            .any(|p| p.relative_path == pkg.relative_path));
    }
    assert_eq!(second.synced_packages.len(), 2);

    let archive_key = second.previous_repomd.unwrap();
    let archived = store.object(&archive_key).unwrap();
    assert!(String::from_utf8(archived.data)
        .unwrap()
        .contains("<revision>100</revision>"));
    assert_eq!(archived.cache_max_age, Some(31536000));

    let live = store
        .object("fedora/41/x86_64/repodata/repomd.xml")
        .unwrap();
    assert!(String::from_utf8(live.data)
        .unwrap()
        .contains("<revision>200</revision>"));

    let manifest_count = store
        .keys()
        .iter()
        .filter(|key| key.ends_with("/manifest.json"))
        .count();
    assert_eq!(manifest_count, 2);

    tokio::time::sleep(Duration::from_millis(1100)).await;

    // coreutils comes back unchanged. The carried manifest entry still
    // matches it, so nothing is fetched again.
    let repo_c = FakeRepo::new(
        "300",
        vec![
            package("bash", "5.3", b"bash 5.3 rebuilt body"),
            package("vim", "9.1", b"vim 9.1 body"),
            package("coreutils", "9.4", b"coreutils 9.4 body"),
        ],
    );
    upstream.set_repository(&repo_c);

    let outcome = mirror.sync_repository(&url, false).await.unwrap();
    assert!(matches!(outcome, CycleOutcome::Synced { transferred: 0, .. }));
    assert_eq!(upstream.hits(&format!("{BASE}Packages/coreutils.rpm")), 1);

    let third = manifests.load_latest(&url).await.unwrap().unwrap();
    assert_eq!(third.snapshot.index_revision.as_deref(), Some("300"));
    assert_eq!(third.snapshot.packages.len(), 3);
    assert!(third.synced_packages.is_empty());
}

#[tokio::test]
async fn test_unchanged_revision_short_circuits() {
    let upstream = TestUpstream::start();
    let repo = FakeRepo::new("100", vec![package("bash", "5.2", b"bash body")]);
    upstream.set_repository(&repo);

    let store = Arc::new(MemoryStore::new());
    let scratch = tempfile::tempdir().unwrap();
    let mirror = mirror_for(&upstream, &store, scratch.path());
    let url = upstream.url.clone();

    let outcome = mirror.sync_repository(&url, false).await.unwrap();
    assert!(matches!(outcome, CycleOutcome::Synced { .. }));
    let writes_after_first = store.write_count();

    let outcome = mirror.sync_repository(&url, false).await.unwrap();
    assert_eq!(outcome, CycleOutcome::NoChange);
    assert_eq!(store.write_count(), writes_after_first);

    // The second cycle stopped at the index: the primary was fetched
    // once, the index itself twice.
    assert_eq!(upstream.hits(&repo.primary_route()), 1);
    assert_eq!(upstream.hits(&format!("{BASE}repodata/repomd.xml")), 2);
}

#[tokio::test]
async fn test_partial_failure_commits_nothing_then_heals() {
    let upstream = TestUpstream::start();
    let repo = FakeRepo::new(
        "100",
        vec![
            package("bash", "5.2", b"bash body"),
            package("ghost", "1.0", b"ghost body"),
        ],
    );
    upstream.set_repository(&repo);
    upstream.remove_route(&format!("{BASE}Packages/ghost.rpm"));

    let store = Arc::new(MemoryStore::new());
    let scratch = tempfile::tempdir().unwrap();
    let mirror = mirror_for(&upstream, &store, scratch.path());
    let url = upstream.url.clone();

    let summary = mirror.sync_all(false, None).await;
    assert_eq!(
        summary,
        SyncSummary {
            synced: 0,
            partial: 1,
            failed: 0,
        }
    );
    assert!(!summary.has_failures());

    // Nothing went live and no manifest was committed.
    assert!(store
        .object("fedora/41/x86_64/repodata/repomd.xml")
        .is_none());
    let manifests = ManifestStore::new(Arc::clone(&store) as Arc<dyn ObjectStore>);
    assert!(manifests.load_latest(&url).await.unwrap().is_none());

    // Upstream recovers, the next cycle converges.
    upstream.set_repository(&repo);
    let outcome = mirror.sync_repository(&url, false).await.unwrap();
    assert!(matches!(outcome, CycleOutcome::Synced { transferred: 2, .. }));

    assert_eq!(
        store.object("fedora/41/x86_64/Packages/ghost.rpm").unwrap().data,
        b"ghost body"
    );
    assert!(store
        .object("fedora/41/x86_64/repodata/repomd.xml")
        .is_some());
    let manifest = manifests.load_latest(&url).await.unwrap().unwrap();
    assert_eq!(manifest.previous_repomd, None);
}

#[tokio::test]
async fn test_seed_skips_stored_files_and_leaves_no_manifest() {
    let upstream = TestUpstream::start();
    let repo = FakeRepo::new(
        "100",
        vec![
            package("bash", "5.2", b"bash body"),
            package("coreutils", "9.4", b"coreutils body"),
        ],
    );
    upstream.set_repository(&repo);

    let store = Arc::new(MemoryStore::new());
    store
        .put(
            "fedora/41/x86_64/Packages/bash.rpm",
            b"bash body".to_vec(),
            &PutOptions::immutable(),
        )
        .await
        .unwrap();

    let scratch = tempfile::tempdir().unwrap();
    let mirror = mirror_for(&upstream, &store, scratch.path());
    let url = upstream.url.clone();

    let outcome = mirror.sync_repository(&url, true).await.unwrap();
    assert!(matches!(outcome, CycleOutcome::Synced { transferred: 2, .. }));

    // bash was already stored with the right size and was not fetched.
    assert_eq!(upstream.hits(&format!("{BASE}Packages/bash.rpm")), 0);
    assert!(store
        .object("fedora/41/x86_64/Packages/coreutils.rpm")
        .is_some());
    assert!(store
        .object("fedora/41/x86_64/repodata/repomd.xml")
        .is_some());
    // Pre-seeded bash, then coreutils, the primary and the live index.
    assert_eq!(store.write_count(), 4);

    let manifests = ManifestStore::new(Arc::clone(&store) as Arc<dyn ObjectStore>);
    assert!(manifests.load_latest(&url).await.unwrap().is_none());
    assert!(store.keys().iter().all(|key| !key.starts_with("manifests/")));

    // The first regular cycle after seeding commits a manifest and
    // archives the index the seed published.
    let outcome = mirror.sync_repository(&url, false).await.unwrap();
    assert!(matches!(outcome, CycleOutcome::Synced { transferred: 2, .. }));
    let manifest = manifests.load_latest(&url).await.unwrap().unwrap();
    assert_eq!(manifest.snapshot.index_revision.as_deref(), Some("100"));
    assert!(manifest.previous_repomd.is_some());
}

#[tokio::test]
async fn test_sync_all_isolates_repository_failures() {
    let upstream = TestUpstream::start();
    let repo = FakeRepo::new("100", vec![package("bash", "5.2", b"bash body")]);
    upstream.set_repository(&repo);

    let store = Arc::new(MemoryStore::new());
    let scratch = tempfile::tempdir().unwrap();
    // Same server, but a path it serves nothing under.
    let broken = Url::parse(&format!(
        "http://{}/centos/9/x86_64/",
        upstream.url.authority()
    ))
    .unwrap();
    let config = test_config(vec![upstream.url.clone(), broken], scratch.path());
    let mirror = Mirror::with_store(
        config,
        Arc::clone(&store) as Arc<dyn ObjectStore>,
        MirrorStats::disabled(),
    )
    .unwrap();

    let summary = mirror.sync_all(false, None).await;
    assert_eq!(
        summary,
        SyncSummary {
            synced: 1,
            partial: 0,
            failed: 1,
        }
    );
    assert!(summary.has_failures());

    // Narrowed to the healthy repository, the broken one is not tried.
    let summary = mirror.sync_all(false, Some("fedora")).await;
    assert_eq!(
        summary,
        SyncSummary {
            synced: 1,
            partial: 0,
            failed: 0,
        }
    );
    assert!(!summary.has_failures());
}
