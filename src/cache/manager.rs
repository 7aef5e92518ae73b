//! Fingerprint-addressed cache operations used by the pipeline

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::entry::CachedImage;
use super::error::CacheError;
use super::key::{identity_fingerprint, Fingerprint};
use super::traits::CacheStore;
use crate::image_optimizer::TransformSpec;
use crate::pipeline::BackgroundTasks;

#[derive(Clone)]
pub struct CacheManager {
    store: Arc<dyn CacheStore>,
    tasks: BackgroundTasks,
}

impl CacheManager {
    pub fn new(store: Arc<dyn CacheStore>, tasks: BackgroundTasks) -> Self {
        Self { store, tasks }
    }

    /// Look up a fingerprint. Backend errors count as a miss.
    pub async fn lookup(&self, fingerprint: &Fingerprint) -> Option<CachedImage> {
        match self.store.get(fingerprint).await {
            Ok(Some(entry)) if !entry.is_expired() => Some(entry),
            Ok(_) => None,
            Err(e) => {
                warn!(fingerprint = %fingerprint, error = %e, "Cache lookup failed, treating as miss");
                None
            }
        }
    }

    pub async fn store(&self, fingerprint: Fingerprint, entry: CachedImage, ttl: Duration) -> Result<(), CacheError> {
        self.store.put(fingerprint, entry, ttl).await
    }

    /// Remove the identity fingerprint for `key` under `spec`
    ///
    /// Without a spec the bare-key fingerprint of an empty spec is removed.
    /// When the identity record points at a full entry, that entry goes too.
    /// Other variants of the key are untouched.
    pub async fn invalidate(&self, key: &str, spec: Option<&TransformSpec>) -> Result<Fingerprint, CacheError> {
        let fingerprint = match spec {
            Some(spec) => identity_fingerprint(key, spec),
            None => identity_fingerprint(key, &TransformSpec::empty()),
        };
        let removed = remove_variant(self.store.as_ref(), &fingerprint).await?;
        debug!(fingerprint = %fingerprint, removed, "Cache entry invalidated");
        Ok(fingerprint)
    }

    /// Store a result in the background; failures are logged and dropped
    ///
    /// The entry is written under `full` and an alias record under
    /// `identity`, so identity-keyed purges and staleness checks reach it.
    pub fn spawn_store(&self, full: Fingerprint, identity: Fingerprint, entry: CachedImage, ttl: Duration) {
        let store = self.store.clone();
        self.tasks.spawn("cache_store", async move {
            if full == identity {
                return store.put(full, entry, ttl).await;
            }
            let alias = CachedImage::alias(full.clone(), entry.content_type.clone(), ttl);
            store.put(full, entry, ttl).await?;
            store.put(identity, alias, ttl).await
        });
    }

    /// Evict an identity fingerprint and the full entry it points at
    pub fn spawn_evict(&self, identity: Fingerprint) {
        let store = self.store.clone();
        self.tasks.spawn("cache_evict", async move {
            remove_variant(store.as_ref(), &identity).await.map(|removed| {
                debug!(fingerprint = %identity, removed, "Cache entry evicted");
            })
        });
    }

    /// Evict a stale variant found under `identity`
    ///
    /// The outdated full entry is deleted. The identity record is deleted only
    /// while it still points at that entry, so a fresh store that already
    /// replaced it survives.
    pub fn spawn_evict_stale(&self, identity: Fingerprint, stale: CachedImage) {
        let store = self.store.clone();
        self.tasks.spawn("cache_evict_stale", async move {
            if let Some(full) = &stale.alias_of {
                store.delete(full).await?;
            }
            let current = store.get(&identity).await?;
            if current.map(|entry| entry.alias_of) == Some(stale.alias_of) {
                store.delete(&identity).await?;
            }
            debug!(fingerprint = %identity, "Stale cache entry evicted");
            Ok::<(), CacheError>(())
        });
    }

    pub fn tasks(&self) -> &BackgroundTasks {
        &self.tasks
    }

    pub fn backing_store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }
}

async fn remove_variant(store: &dyn CacheStore, identity: &Fingerprint) -> Result<bool, CacheError> {
    if let Some(Some(full)) = store.get(identity).await?.map(|entry| entry.alias_of) {
        store.delete(&full).await?;
    }
    store.delete(identity).await
}
