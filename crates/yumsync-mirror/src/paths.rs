//! Bucket key layout.
//!
//! A mirrored repository keeps its upstream URL path as the key prefix,
//! so `https://example.com/fedora/41/x86_64/` lands under
//! `fedora/41/x86_64/`. Manifests live in a separate `manifests/` area
//! keyed by the same path, outside anything a package client fetches.

use url::Url;

/// Destination key for a file of a repository.
pub fn mirror_key(repository_url: &Url, relative_path: &str) -> String {
    let base = repository_url.path().trim_matches('/');
    if base.is_empty() {
        relative_path.to_string()
    } else {
        format!("{base}/{relative_path}")
    }
}

/// Key prefix of the manifest area of a repository.
pub fn manifest_prefix(repository_url: &Url) -> String {
    let base = repository_url.path().trim_matches('/');
    if base.is_empty() {
        "manifests/".to_string()
    } else {
        format!("manifests/{base}/")
    }
}
