//! Local filesystem object store
//!
//! Keys map to paths below a root directory. The content tag is the SHA-256
//! hex digest of the file, so any byte change produces a new tag even when
//! the modification time does not move.

use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};

use super::{check_size, ObjectMetadata, ObjectStore, StoreError, StoredObject};

pub struct FsStore {
    root: PathBuf,
    max_size_bytes: Option<u64>,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_size_bytes: None,
        }
    }

    /// Refuse files over `max_size_bytes` without reading them
    pub fn with_size_limit(mut self, max_size_bytes: u64) -> Self {
        self.max_size_bytes = Some(max_size_bytes);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key below the root, refusing anything that would escape it
    fn resolve(&self, key: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(key.trim_start_matches('/'));
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes || relative.as_os_str().is_empty() {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for FsStore {
    async fn get(&self, key: &str) -> Result<Option<StoredObject>, StoreError> {
        let path = self.resolve(key)?;

        let file_meta = match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => meta,
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        check_size(file_meta.len(), self.max_size_bytes)?;
        let data = tokio::fs::read(&path).await?;

        let last_modified = file_meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64);

        Ok(Some(StoredObject {
            metadata: ObjectMetadata {
                etag: Some(hex::encode(Sha256::digest(&data))),
                last_modified,
            },
            bytes: Bytes::from(data),
        }))
    }

    fn name(&self) -> &'static str {
        "filesystem"
    }
}
