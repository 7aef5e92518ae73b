//! Source object storage
//!
//! The pipeline only ever reads: `get(key)` returns the object's bytes plus
//! the metadata used for staleness detection, or `None` when the key does
//! not exist.
//!
//! Backends:
//! - [`S3Store`]: S3-compatible bucket (AWS, MinIO, R2)
//! - [`FsStore`]: local directory, content tag is the SHA-256 of the file
//! - [`MemoryStore`]: in-process map, mainly for tests

pub mod fs;
pub mod memory;
pub mod s3;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub use fs::FsStore;
pub use memory::MemoryStore;
pub use s3::S3Store;

/// Mutation metadata of a stored object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectMetadata {
    /// Opaque content tag, usually a strong content hash
    pub etag: Option<String>,
    /// Last modification, seconds since the Unix epoch
    pub last_modified: Option<i64>,
}

impl ObjectMetadata {
    pub fn new(etag: impl Into<String>, last_modified: i64) -> Self {
        Self {
            etag: Some(etag.into()),
            last_modified: Some(last_modified),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.etag.is_none() && self.last_modified.is_none()
    }
}

/// Object as returned by a store
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub bytes: Bytes,
    pub metadata: ObjectMetadata,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Object is {size} bytes, over the {max_size} byte limit")]
    TooLarge { size: u64, max_size: u64 },
}

/// Refuse an object whose announced length is over `limit`
pub fn check_size(size: u64, limit: Option<u64>) -> Result<(), StoreError> {
    match limit {
        Some(max_size) if size > max_size => Err(StoreError::TooLarge { size, max_size }),
        _ => Ok(()),
    }
}

/// Read-only object store
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch an object; `Ok(None)` when the key does not exist
    async fn get(&self, key: &str) -> Result<Option<StoredObject>, StoreError>;

    /// Short backend identifier used in logs
    fn name(&self) -> &'static str;
}
