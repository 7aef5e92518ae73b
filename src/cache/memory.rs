//! Memory cache implementation
//!
//! - `MemoryCacheStore`: size-bounded cache backed by moka with per-entry TTL
//! - `NullCacheStore`: no-op implementation for disabled caching

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::notification::RemovalCause;

use super::config::CacheConfig;
use super::entry::CachedImage;
use super::error::CacheError;
use super::key::Fingerprint;
use super::traits::CacheStore;

/// Statistics tracker using atomics for thread safety
#[derive(Default)]
pub(crate) struct CacheStatsTracker {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

/// Point-in-time cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub current_size_bytes: u64,
    pub current_item_count: u64,
}

impl CacheStatsTracker {
    fn snapshot(&self, current_size_bytes: u64, current_item_count: u64) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            current_size_bytes,
            current_item_count,
        }
    }
}

/// Value stored in moka: the entry plus the TTL it was stored with
#[derive(Clone)]
struct Slot {
    entry: CachedImage,
    ttl: Duration,
}

struct SlotExpiry;

impl moka::Expiry<Fingerprint, Slot> for SlotExpiry {
    fn expire_after_create(&self, _key: &Fingerprint, value: &Slot, _created_at: Instant) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &Fingerprint,
        value: &Slot,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// MemoryCacheStore wraps moka for our CacheStore trait
pub struct MemoryCacheStore {
    cache: moka::future::Cache<Fingerprint, Slot>,
    stats: Arc<CacheStatsTracker>,
    max_item_size_bytes: u64,
}

impl MemoryCacheStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_limits(config.max_cache_size_bytes(), config.max_item_size_bytes())
    }

    pub fn with_limits(max_cache_size_bytes: u64, max_item_size_bytes: u64) -> Self {
        // Shared with the eviction listener
        let stats = Arc::new(CacheStatsTracker::default());
        let stats_clone = stats.clone();

        let cache = moka::future::Cache::builder()
            .max_capacity(max_cache_size_bytes)
            .weigher(|_key, slot: &Slot| u32::try_from(slot.entry.size_bytes()).unwrap_or(u32::MAX))
            .expire_after(SlotExpiry)
            .eviction_listener(move |_key, _value, cause| {
                // Explicit invalidations are not evictions
                if matches!(cause, RemovalCause::Size | RemovalCause::Expired) {
                    stats_clone.evictions.fetch_add(1, Ordering::Relaxed);
                }
            })
            .build();

        Self {
            cache,
            stats,
            max_item_size_bytes,
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
            .snapshot(self.cache.weighted_size(), self.cache.entry_count())
    }

    /// Current entry count (approximate until pending tasks have run)
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<CachedImage>, CacheError> {
        match self.cache.get(fingerprint).await {
            Some(slot) => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(slot.entry))
            }
            None => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    async fn put(&self, fingerprint: Fingerprint, entry: CachedImage, ttl: Duration) -> Result<(), CacheError> {
        let size = entry.size_bytes();
        if size as u64 > self.max_item_size_bytes {
            return Err(CacheError::ItemTooLarge {
                size,
                max_size: self.max_item_size_bytes,
            });
        }
        self.cache.insert(fingerprint, Slot { entry, ttl }).await;
        Ok(())
    }

    async fn delete(&self, fingerprint: &Fingerprint) -> Result<bool, CacheError> {
        Ok(self.cache.remove(fingerprint).await.is_some())
    }

    async fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks().await;
    }
}

/// Cache store used when caching is disabled
pub struct NullCacheStore;

#[async_trait]
impl CacheStore for NullCacheStore {
    async fn get(&self, _fingerprint: &Fingerprint) -> Result<Option<CachedImage>, CacheError> {
        Ok(None)
    }

    async fn put(&self, _fingerprint: Fingerprint, _entry: CachedImage, _ttl: Duration) -> Result<(), CacheError> {
        Ok(())
    }

    async fn delete(&self, _fingerprint: &Fingerprint) -> Result<bool, CacheError> {
        Ok(false)
    }
}
