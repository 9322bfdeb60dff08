//! Upstream repository metadata handling for yumsync.
//!
//! This crate covers the read side of a sync cycle: fetching index files
//! over HTTP, decompressing and parsing them into typed snapshots, and
//! computing the set of packages a mirror is missing.
//!
//! A repository is entered through its repomd.xml, which names the other
//! metadata files. The primary index is the one that matters here: it
//! lists every package with its location, checksum and size.

pub mod compress;
pub mod diff;
pub mod error;
pub mod fetch;
pub mod package;
pub mod primary;
pub mod repomd;

mod xml;

pub use compress::{decompress, GZIP_MAGIC_BYTES, ZST_MAGIC_BYTES};
pub use diff::{carry_forward, diff_snapshots, revisions_match};
pub use error::{ErrorContext, FetchError, ParseError};
pub use fetch::{join_url, Downloaded, Fetcher, MAX_INDEX_BYTES};
pub use package::{Checksum, ChecksumKind, Package, RepoSnapshot};
pub use primary::parse_primary;
pub use repomd::{parse_repomd, Repomd, RepomdSection};
