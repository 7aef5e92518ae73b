//! Cached transformation result

use std::time::{Duration, SystemTime};

use bytes::Bytes;

use super::key::Fingerprint;

/// Encoded image plus the response headers replayed on a hit
///
/// CORS headers are not stored. They are recomputed per request from the
/// requesting origin.
#[derive(Debug, Clone)]
pub struct CachedImage {
    pub data: Bytes,
    pub content_type: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Cache-Control value stored with the entry
    pub cache_control: String,
    pub created_at: SystemTime,
    pub ttl: Duration,
    /// Set on identity-only records: the full fingerprint holding the result
    pub alias_of: Option<Fingerprint>,
}

impl CachedImage {
    pub fn new(data: Bytes, content_type: impl Into<String>, max_age: Duration) -> Self {
        Self {
            data,
            content_type: content_type.into(),
            width: None,
            height: None,
            cache_control: format!("public, max-age={}", max_age.as_secs()),
            created_at: SystemTime::now(),
            ttl: max_age,
            alias_of: None,
        }
    }

    /// Identity-only record pointing at the entry stored under `full`
    pub fn alias(full: Fingerprint, content_type: impl Into<String>, max_age: Duration) -> Self {
        Self {
            alias_of: Some(full),
            ..Self::new(Bytes::new(), content_type, max_age)
        }
    }

    pub fn is_alias(&self) -> bool {
        self.alias_of.is_some()
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Approximate memory footprint used by the cache weigher
    pub fn size_bytes(&self) -> usize {
        self.data.len()
            + self.content_type.len()
            + self.cache_control.len()
            + self.alias_of.as_ref().map_or(0, |fp| fp.as_str().len())
    }

    pub fn is_expired(&self) -> bool {
        match self.created_at.elapsed() {
            Ok(age) => age >= self.ttl,
            // Clock went backwards; treat as fresh
            Err(_) => false,
        }
    }
}
