//! Error types for the sync engine.
//!
//! Transfer failures are deliberately separate from cycle failures: a
//! [`TransferError`] belongs to one entry and partitions a batch, while a
//! [`MirrorError`] aborts the whole repository cycle.

use miette::Diagnostic;
use thiserror::Error;
use yumsync_core::{FetchError, ParseError};
use yumsync_storage::StorageError;

/// A failure tied to one transferred file.
#[derive(Error, Diagnostic, Debug)]
pub enum TransferError {
    #[error("Failed to download {url}: {source}")]
    #[diagnostic(code(yumsync_mirror::download))]
    Download { url: String, source: FetchError },

    #[error("Size mismatch for {path}: expected {expected}, got {actual}")]
    #[diagnostic(
        code(yumsync_mirror::size_mismatch),
        help("The upstream file changed while it was being fetched")
    )]
    SizeMismatch {
        path: String,
        expected: u64,
        actual: u64,
    },

    #[error("Checksum mismatch for {path}: expected {expected}, got {actual}")]
    #[diagnostic(
        code(yumsync_mirror::checksum_mismatch),
        help("The upstream file changed while it was being fetched")
    )]
    ChecksumMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("Cannot verify {path}: unsupported checksum algorithm {algorithm:?}")]
    #[diagnostic(code(yumsync_mirror::unverifiable_checksum))]
    UnverifiableChecksum { path: String, algorithm: String },

    #[error("Failed to upload {key}: {source}")]
    #[diagnostic(code(yumsync_mirror::upload))]
    Upload { key: String, source: StorageError },

    #[error("Error while {action}: {source}")]
    #[diagnostic(code(yumsync_mirror::transfer_io))]
    Io {
        action: String,
        source: std::io::Error,
    },
}

/// Errors from the manifest protocol.
#[derive(Error, Diagnostic, Debug)]
pub enum ManifestError {
    #[error(transparent)]
    #[diagnostic(code(yumsync_mirror::manifest_storage))]
    Storage(#[from] StorageError),

    #[error(transparent)]
    #[diagnostic(
        code(yumsync_mirror::manifest_json),
        help("The stored manifest may be corrupted")
    )]
    Json(#[from] serde_json::Error),
}

/// Errors that abort a repository cycle.
#[derive(Error, Diagnostic, Debug)]
pub enum MirrorError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Manifest(#[from] ManifestError),

    #[error("Error while {action}: {source}")]
    #[diagnostic(code(yumsync_mirror::scratch))]
    Scratch {
        action: String,
        source: std::io::Error,
    },

    #[error("Failed to publish {key}: {source}")]
    #[diagnostic(code(yumsync_mirror::publish))]
    Publish { key: String, source: StorageError },

    #[error("{0}")]
    #[diagnostic(code(yumsync_mirror::custom))]
    Custom(String),
}

/// A specialized Result type for sync operations.
pub type Result<T> = std::result::Result<T, MirrorError>;
