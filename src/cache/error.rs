//! Cache error types

/// Cache error types
#[derive(Debug)]
pub enum CacheError {
    /// Entry is larger than the per-item limit
    ItemTooLarge { size: usize, max_size: u64 },
    /// Backing store is unreachable or failed
    Backend(String),
    /// Cache is disabled by configuration
    Disabled,
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheError::ItemTooLarge { size, max_size } => write!(
                f,
                "Cache entry of {} bytes exceeds item limit of {} bytes",
                size, max_size
            ),
            CacheError::Backend(msg) => write!(f, "Cache backend error: {}", msg),
            CacheError::Disabled => write!(f, "Cache is disabled"),
        }
    }
}

impl std::error::Error for CacheError {}
