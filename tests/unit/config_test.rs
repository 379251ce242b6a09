//! Tests for configuration loading

use kubedoctor::config::{load_config_from, AppConfig, OutputFormat};
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

#[test]
fn test_defaults() {
    let config = AppConfig::default();
    assert_eq!(config.default_output, OutputFormat::Text);
    assert!(config.colors);
    assert_eq!(config.default_tail_lines, 100);
    assert_eq!(config.top_limit, 10);
    assert_eq!(config.quota_warn_percent, 80.0);
    assert_eq!(config.limits().timeout, Duration::from_secs(config.timeout_secs));
}

#[test]
fn test_missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config_from(&dir.path().join("config.toml")).unwrap();
    assert_eq!(config.top_limit, AppConfig::default().top_limit);
}

#[test]
fn test_partial_file_keeps_other_defaults() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "default_output = \"json\"").unwrap();
    writeln!(file, "timeout_secs = 5").unwrap();
    writeln!(file, "quota_warn_percent = 90.0").unwrap();

    let config = load_config_from(file.path()).unwrap();
    assert_eq!(config.default_output, OutputFormat::Json);
    assert_eq!(config.limits().timeout, Duration::from_secs(5));
    assert_eq!(config.quota_warn_percent, 90.0);
    assert_eq!(config.default_tail_lines, 100);
    assert!(config.colors);
}

#[test]
fn test_malformed_file_is_a_config_error() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "top_limit = \"many\"").unwrap();
    let err = load_config_from(file.path()).unwrap_err();
    assert!(matches!(err, kubedoctor::error::KdError::Config(_)));
}
