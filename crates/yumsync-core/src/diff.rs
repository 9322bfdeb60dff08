//! Snapshot comparison.

use std::collections::{HashMap, HashSet};

use crate::package::{Package, RepoSnapshot};

/// Computes the packages the mirror is missing.
///
/// A package counts as missing when its location is absent from the
/// prior snapshot, or present with a different checksum or size. Removed
/// packages are never reported; the mirror only grows. The result keeps
/// the order of the current index.
pub fn diff_snapshots(current: &RepoSnapshot, prior: Option<&RepoSnapshot>) -> Vec<Package> {
    let Some(prior) = prior else {
        return current.packages.clone();
    };

    let known: HashMap<&str, &Package> = prior
        .packages
        .iter()
        .map(|p| (p.relative_path.as_str(), p))
        .collect();

    current
        .packages
        .iter()
        .filter(|pkg| {
            match known.get(pkg.relative_path.as_str()) {
                Some(prev) => prev.checksum != pkg.checksum || prev.size != pkg.size,
                None => true,
            }
        })
        .cloned()
        .collect()
}

/// Extends `current` with prior packages whose location has vanished
/// from the upstream index.
///
/// The mirror never deletes, so a recorded snapshot lists everything
/// the bucket holds rather than just what the latest index references.
/// Current entries keep their index order and win on path collisions;
/// carried entries follow in the order the prior snapshot listed them.
pub fn carry_forward(mut current: RepoSnapshot, prior: &RepoSnapshot) -> RepoSnapshot {
    let present: HashSet<&str> = current
        .packages
        .iter()
        .map(|p| p.relative_path.as_str())
        .collect();
    let retained: Vec<Package> = prior
        .packages
        .iter()
        .filter(|p| !present.contains(p.relative_path.as_str()))
        .cloned()
        .collect();
    current.packages.extend(retained);
    current
}

/// Whether two index revisions are present and equal.
///
/// A missing revision on either side never matches, so repositories
/// without revision stamps always take the full diff path.
pub fn revisions_match(current: Option<&str>, prior: Option<&str>) -> bool {
    matches!((current, prior), (Some(a), Some(b)) if a == b)
}
