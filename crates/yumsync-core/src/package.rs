use serde::{Deserialize, Serialize};

/// Checksum algorithms this tool knows how to verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumKind {
    Sha256,
    Sha512,
}

impl ChecksumKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "sha256" => Some(ChecksumKind::Sha256),
            "sha512" => Some(ChecksumKind::Sha512),
            _ => None,
        }
    }
}

/// A checksum exactly as declared by upstream metadata.
///
/// The algorithm is kept as a free-form string so a snapshot round-trips
/// faithfully even when upstream uses an algorithm this tool cannot verify.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checksum {
    pub algorithm: String,
    pub value: String,
}

impl Checksum {
    /// The algorithm, if this tool can verify it.
    pub fn kind(&self) -> Option<ChecksumKind> {
        ChecksumKind::parse(&self.algorithm)
    }

    /// Compares against a computed hex digest.
    pub fn matches(&self, digest: &str) -> bool {
        self.value.eq_ignore_ascii_case(digest)
    }
}

/// One package entry from a primary index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub epoch: String,
    pub version: String,
    pub release: String,
    pub arch: String,
    /// Location relative to the repository base URL.
    pub relative_path: String,
    pub checksum: Checksum,
    /// Size of the package file in bytes.
    pub size: u64,
}

impl Package {
    /// Full `name-epoch:version-release.arch` identifier.
    pub fn nevra(&self) -> String {
        format!(
            "{}-{}:{}-{}.{}",
            self.name, self.epoch, self.version, self.release, self.arch
        )
    }
}

/// Parsed view of one upstream repository at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoSnapshot {
    pub repository_url: String,
    /// Revision stamp from repomd.xml, when upstream provides one.
    pub index_revision: Option<String>,
    pub packages: Vec<Package>,
}
