//! Cache store trait definition
//!
//! A cache store is a flat fingerprint-to-entry map with exact-key
//! operations only: there is no prefix or wildcard deletion.

use std::time::Duration;

use async_trait::async_trait;

use super::entry::CachedImage;
use super::error::CacheError;
use super::key::Fingerprint;

#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns None if the fingerprint is not found or the entry has expired
    async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<CachedImage>, CacheError>;

    /// Store an entry, replacing any existing one
    async fn put(&self, fingerprint: Fingerprint, entry: CachedImage, ttl: Duration) -> Result<(), CacheError>;

    /// Returns true if an entry was removed
    async fn delete(&self, fingerprint: &Fingerprint) -> Result<bool, CacheError>;

    /// Run pending async tasks (for caches that use async backends like moka)
    async fn run_pending_tasks(&self) {}
}
