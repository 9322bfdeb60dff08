//! The yumsync sync engine.
//!
//! This crate drives full sync cycles: diffing upstream metadata against
//! the last committed manifest, moving missing files into the bucket
//! through a bounded worker pool, and committing manifests so the next
//! cycle starts from a known state.
//!
//! The engine is append-only. Nothing in the bucket is ever deleted or
//! rewritten destructively; a retried or crashed cycle converges to the
//! same result as an undisturbed one.

pub mod error;
pub mod manifest;
pub mod paths;
pub mod pool;
pub mod stats;
pub mod sync;

pub use error::{ManifestError, MirrorError, Result, TransferError};
pub use manifest::{Manifest, ManifestStore};
pub use paths::{manifest_prefix, mirror_key};
pub use pool::{FailedSync, SyncItem, SyncPool, SyncReport};
pub use stats::MirrorStats;
pub use sync::{CycleOutcome, Mirror, SyncSummary};
