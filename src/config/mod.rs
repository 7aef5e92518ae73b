// Configuration module

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::cache::CacheConfig;
use crate::constants::{
    DEFAULT_ADDRESS, DEFAULT_MAX_HEIGHT, DEFAULT_MAX_IMAGE_SIZE, DEFAULT_MAX_WIDTH, DEFAULT_PORT,
    DEFAULT_QUALITY,
};
use crate::image_optimizer::ValidationPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Environment variable '{0}' is referenced but not set")]
    MissingEnvVar(String),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub image: ImageConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

impl Config {
    pub fn from_yaml_with_env(yaml: &str) -> Result<Self, ConfigError> {
        // Replace ${VAR_NAME} with environment variable values
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        // First, check that all referenced environment variables exist
        for caps in re.captures_iter(yaml) {
            let var_name = &caps[1];
            if std::env::var(var_name).is_err() {
                return Err(ConfigError::MissingEnvVar(var_name.to_string()));
            }
        }

        let substituted = re.replace_all(yaml, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_default()
        });

        let config: Config = serde_yaml::from_str(&substituted)?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_with_env(&yaml)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must be non-zero".into()));
        }

        match self.source.kind {
            SourceKind::S3 => {
                if self.source.bucket.as_deref().map_or(true, str::is_empty) {
                    return Err(ConfigError::Invalid(
                        "source.bucket is required for the s3 source".into(),
                    ));
                }
            }
            SourceKind::Filesystem => {
                if self.source.root.as_deref().map_or(true, str::is_empty) {
                    return Err(ConfigError::Invalid(
                        "source.root is required for the filesystem source".into(),
                    ));
                }
            }
        }

        if self.image.default_quality > 100 {
            return Err(ConfigError::Invalid(format!(
                "image.default_quality must be between 0 and 100, got {}",
                self.image.default_quality
            )));
        }
        if self.image.max_width == 0 || self.image.max_height == 0 {
            return Err(ConfigError::Invalid(
                "image.max_width and image.max_height must be positive".into(),
            ));
        }
        if self.image.max_size_bytes == 0 {
            return Err(ConfigError::Invalid("image.max_size_bytes must be positive".into()));
        }

        self.cache.validate().map_err(ConfigError::Invalid)?;
        Ok(())
    }

    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.server.address, self.server.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Origin host suffixes allowed by CORS
    #[serde(default)]
    pub trusted_hosts: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            trusted_hosts: Vec::new(),
        }
    }
}

fn default_address() -> String {
    DEFAULT_ADDRESS.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    S3,
    Filesystem,
}

/// Where source images are read from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub kind: SourceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom S3 endpoint (MinIO, LocalStack)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Root directory for the filesystem source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    #[serde(default = "default_quality")]
    pub default_quality: u8,
    #[serde(default = "default_max_size_bytes")]
    pub max_size_bytes: usize,
    #[serde(default = "default_max_width")]
    pub max_width: u32,
    #[serde(default = "default_max_height")]
    pub max_height: u32,
    #[serde(default = "default_resize_oversized")]
    pub resize_oversized: bool,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            default_quality: default_quality(),
            max_size_bytes: default_max_size_bytes(),
            max_width: default_max_width(),
            max_height: default_max_height(),
            resize_oversized: default_resize_oversized(),
        }
    }
}

impl ImageConfig {
    pub fn to_validation_policy(&self) -> ValidationPolicy {
        ValidationPolicy {
            max_size_bytes: self.max_size_bytes,
            max_width: self.max_width,
            max_height: self.max_height,
            resize_oversized: self.resize_oversized,
        }
    }
}

fn default_quality() -> u8 {
    DEFAULT_QUALITY
}

fn default_max_size_bytes() -> usize {
    DEFAULT_MAX_IMAGE_SIZE
}

fn default_max_width() -> u32 {
    DEFAULT_MAX_WIDTH
}

fn default_max_height() -> u32 {
    DEFAULT_MAX_HEIGHT
}

fn default_resize_oversized() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Bearer secret for DELETE; purge is refused when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purge_secret: Option<String>,
}
