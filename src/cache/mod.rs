//! Transformation result cache
//!
//! Entries are addressed by [`Fingerprint`]. The store itself is a plain
//! exact-key map behind the [`CacheStore`] trait; staleness is handled by the
//! pipeline through metadata-aware fingerprints, not by the store.

pub mod config;
pub mod entry;
pub mod error;
pub mod key;
pub mod manager;
pub mod memory;
pub mod traits;

pub use config::CacheConfig;
pub use entry::CachedImage;
pub use error::CacheError;
pub use key::{build_fingerprint, identity_fingerprint, Fingerprint};
pub use manager::CacheManager;
pub use memory::{CacheStats, MemoryCacheStore, NullCacheStore};
pub use traits::CacheStore;
