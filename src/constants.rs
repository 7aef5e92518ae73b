// Constants module - centralized default values for configuration
//
// Defaults used by both the YAML config layer and the library types, so a
// value omitted from the config file and a value omitted in code agree.

// =============================================================================
// Server defaults
// =============================================================================

/// Default bind address
pub const DEFAULT_ADDRESS: &str = "0.0.0.0";

/// Default listen port
pub const DEFAULT_PORT: u16 = 8080;

/// Default config file path
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

// =============================================================================
// Image defaults
// =============================================================================

/// Default output quality when the request does not ask for one
pub const DEFAULT_QUALITY: u8 = 90;

/// Default PNG optimisation level when `optimize=true`
pub const DEFAULT_COMPRESSION_LEVEL: u8 = 2;

/// Default maximum source size (10 MB)
pub const DEFAULT_MAX_IMAGE_SIZE: usize = 10 * 1024 * 1024;

/// Default maximum source width in pixels
pub const DEFAULT_MAX_WIDTH: u32 = 4096;

/// Default maximum source height in pixels
pub const DEFAULT_MAX_HEIGHT: u32 = 4096;

/// Largest intermediate a single resize may allocate, in pixels
pub const MAX_RESIZE_PIXELS: u64 = 64 * 1024 * 1024;

// =============================================================================
// Cache defaults
// =============================================================================

/// Default Cache-Control max-age in seconds (one year)
pub const DEFAULT_MAX_AGE_SECONDS: u64 = 31_536_000;

/// Default maximum cache size in megabytes
pub const DEFAULT_MAX_CACHE_SIZE_MB: u64 = 512;

/// Default maximum item size in megabytes
pub const DEFAULT_MAX_ITEM_SIZE_MB: u64 = 32;

/// Fingerprints longer than this are hashed
pub const MAX_FINGERPRINT_LENGTH: usize = 1024;

/// Fingerprint prefix
pub const FINGERPRINT_PREFIX: &str = "img";
