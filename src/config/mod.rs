//! Application configuration for kubedoctor

use crate::error::{KdError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration stored in ~/.kd/config.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Default output format
    #[serde(default)]
    pub default_output: OutputFormat,

    /// Whether to use colors
    #[serde(default = "default_true")]
    pub colors: bool,

    /// Per-call timeout against the API server, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum pods returned by a single list call
    #[serde(default = "default_max_pods")]
    pub max_pods: usize,

    /// Maximum events returned by a single list call
    #[serde(default = "default_max_events")]
    pub max_events: usize,

    /// Byte ceiling for a single log fetch
    #[serde(default = "default_max_log_bytes")]
    pub max_log_bytes: usize,

    /// Default tail lines for log fetches
    #[serde(default = "default_tail_lines")]
    pub default_tail_lines: i64,

    /// Default row count for top-N tables and charts
    #[serde(default = "default_top_limit")]
    pub top_limit: usize,

    /// Quota usage percentage flagged as a warning
    #[serde(default = "default_quota_warn_percent")]
    pub quota_warn_percent: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_output: OutputFormat::default(),
            colors: default_true(),
            timeout_secs: default_timeout_secs(),
            max_pods: default_max_pods(),
            max_events: default_max_events(),
            max_log_bytes: default_max_log_bytes(),
            default_tail_lines: default_tail_lines(),
            top_limit: default_top_limit(),
            quota_warn_percent: default_quota_warn_percent(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_pods() -> usize {
    500
}

fn default_max_events() -> usize {
    100
}

fn default_max_log_bytes() -> usize {
    50 * 1024
}

fn default_tail_lines() -> i64 {
    100
}

fn default_top_limit() -> usize {
    10
}

fn default_quota_warn_percent() -> f64 {
    80.0
}

/// Report rendering for the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
}

/// Truncation ceilings and timeout applied by the cluster accessor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub timeout: Duration,
    pub max_pods: usize,
    pub max_events: usize,
    pub max_log_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        AppConfig::default().limits()
    }
}

impl AppConfig {
    pub fn limits(&self) -> Limits {
        Limits {
            timeout: Duration::from_secs(self.timeout_secs),
            max_pods: self.max_pods,
            max_events: self.max_events,
            max_log_bytes: self.max_log_bytes,
        }
    }
}

/// Get the kd config directory (~/.kd)
pub fn config_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|h| h.join(".kd"))
        .ok_or_else(|| KdError::Config("Could not determine home directory".to_string()))
}

/// Load application config from ~/.kd/config.toml
pub fn load_config() -> Result<AppConfig> {
    load_config_from(&config_dir()?.join("config.toml"))
}

/// Load config from an explicit path, falling back to defaults when absent
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| KdError::Config(e.to_string()))
    } else {
        Ok(AppConfig::default())
    }
}
