//! In-memory object store

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};

use super::{ObjectMetadata, ObjectStore, StoreError, StoredObject};

/// Process-local store; every `put` bumps a logical clock used as mtime
#[derive(Default)]
pub struct MemoryStore {
    objects: RwLock<HashMap<String, StoredObject>>,
    clock: AtomicU64,
    gets: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an object, deriving its metadata from the content
    pub fn put(&self, key: impl Into<String>, bytes: impl Into<Bytes>) -> ObjectMetadata {
        let bytes = bytes.into();
        let tick = self.clock.fetch_add(1, Ordering::SeqCst) as i64 + 1;
        let metadata = ObjectMetadata::new(hex::encode(Sha256::digest(&bytes)), tick);
        self.put_with_metadata(key, bytes, metadata.clone());
        metadata
    }

    pub fn put_with_metadata(&self, key: impl Into<String>, bytes: impl Into<Bytes>, metadata: ObjectMetadata) {
        self.objects.write().insert(
            key.into(),
            StoredObject {
                bytes: bytes.into(),
                metadata,
            },
        );
    }

    pub fn remove(&self, key: &str) -> bool {
        self.objects.write().remove(key).is_some()
    }

    /// Number of `get` calls served
    pub fn get_count(&self) -> u64 {
        self.gets.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<StoredObject>, StoreError> {
        self.gets.fetch_add(1, Ordering::Relaxed);
        Ok(self.objects.read().get(key).cloned())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
