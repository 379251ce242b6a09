//! Error types for kubedoctor

use thiserror::Error;

/// Main error type for kubedoctor
#[derive(Debug, Error)]
pub enum KdError {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Resource not found: {kind}/{name}")]
    NotFound { kind: String, name: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("metrics-server not available")]
    MetricsUnavailable,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Timeout waiting for {0}")]
    Timeout(String),
}

impl KdError {
    /// True when the API server answered 404 for the requested object.
    pub fn is_not_found(&self) -> bool {
        match self {
            KdError::NotFound { .. } => true,
            KdError::Kube(kube::Error::Api(resp)) => resp.code == 404,
            _ => false,
        }
    }

    /// Errors that must abort a diagnostic run instead of degrading a section.
    pub fn is_fatal(&self) -> bool {
        matches!(self, KdError::Cancelled)
    }

    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        KdError::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }
}

impl From<serde_json::Error> for KdError {
    fn from(e: serde_json::Error) -> Self {
        KdError::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for KdError {
    fn from(e: serde_yaml::Error) -> Self {
        KdError::Serialization(e.to_string())
    }
}

/// Result type alias for kubedoctor
pub type Result<T> = std::result::Result<T, KdError>;
