// Configuration loading tests

use kagami::config::{Config, ConfigError, SourceKind};
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_complete_config_example() {
    let yaml = r#"
server:
  address: "127.0.0.1"
  port: 8081
  trusted_hosts:
    - example.com
    - example.org
source:
  kind: filesystem
  root: /var/lib/kagami/images
cache:
  enabled: true
  max_age_seconds: 3600
  max_cache_size_mb: 256
  max_item_size_mb: 16
image:
  default_quality: 80
  max_size_bytes: 5242880
  max_width: 2048
  max_height: 2048
  resize_oversized: false
auth:
  purge_secret: "letmein"
"#;
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();
    file.flush().unwrap();

    let config = Config::from_file(file.path()).unwrap();
    config.validate().unwrap();

    assert_eq!(config.listen_address(), "127.0.0.1:8081");
    assert_eq!(config.server.trusted_hosts.len(), 2);
    assert_eq!(config.source.kind, SourceKind::Filesystem);
    assert_eq!(config.cache.max_age_seconds, 3600);
    assert_eq!(config.cache.max_item_size_bytes(), 16 * 1024 * 1024);
    assert_eq!(config.image.default_quality, 80);
    assert_eq!(config.auth.purge_secret.as_deref(), Some("letmein"));

    let policy = config.image.to_validation_policy();
    assert_eq!(policy.max_size_bytes, 5 * 1024 * 1024);
    assert!(!policy.resize_oversized);
}

#[test]
fn test_missing_file_is_io_error() {
    let err = Config::from_file("/nonexistent/kagami/config.yaml").unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn test_item_larger_than_cache_is_invalid() {
    let yaml = r#"
source:
  kind: filesystem
  root: /srv
cache:
  max_cache_size_mb: 10
  max_item_size_mb: 20
"#;
    let config = Config::from_yaml_with_env(yaml).unwrap();
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
}

#[test]
fn test_lowercase_env_var_syntax_is_left_alone() {
    let yaml = r#"
source:
  kind: filesystem
  root: "/srv/${not_a_var}"
"#;
    let config = Config::from_yaml_with_env(yaml).unwrap();
    assert_eq!(config.source.root.as_deref(), Some("/srv/${not_a_var}"));
}
