//! Object storage backends for yumsync.
//!
//! Everything the sync engine does to the mirror bucket goes through the
//! [`ObjectStore`] trait: put, get, head, list and server-side copy. The
//! production backend is S3; an in-memory backend backs the test suites.
//! The trait has no delete operation, a mirror only ever grows.

pub mod error;
pub mod memory;
pub mod s3;
pub mod traits;

pub use error::{StorageError, StorageResult};
pub use memory::{MemoryObject, MemoryStore};
pub use s3::{S3Options, S3Store};
pub use traits::{ObjectMeta, ObjectStore, PutOptions};
