//! Tests for src/error/mod.rs - KdError

use kubedoctor::error::KdError;

// ============================================================================
// KdError Display tests
// ============================================================================

#[test]
fn test_not_found_error_display() {
    let err = KdError::not_found("Service", "shop/api");
    let display = err.to_string();
    assert!(display.contains("Resource not found"));
    assert!(display.contains("Service/shop/api"));
}

#[test]
fn test_unknown_tool_error_display() {
    let err = KdError::UnknownTool("frobnicate".to_string());
    assert_eq!(err.to_string(), "Unknown tool: frobnicate");
}

#[test]
fn test_timeout_error_display() {
    let err = KdError::Timeout("list_pods".to_string());
    assert!(err.to_string().contains("list_pods"));
}

#[test]
fn test_serde_errors_convert_to_serialization() {
    let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    assert!(matches!(KdError::from(json_err), KdError::Serialization(_)));
}

#[test]
fn test_io_error_conversion() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
    let err: KdError = io.into();
    assert!(matches!(err, KdError::Io(_)));
    assert!(!err.is_not_found());
}

// ============================================================================
// Classification tests
// ============================================================================

#[test]
fn test_only_cancellation_is_fatal() {
    assert!(KdError::Cancelled.is_fatal());
    assert!(!KdError::Timeout("x".into()).is_fatal());
    assert!(!KdError::MetricsUnavailable.is_fatal());
    assert!(!KdError::not_found("Pod", "a").is_fatal());
}

#[test]
fn test_not_found_classification() {
    assert!(KdError::not_found("Pod", "a").is_not_found());
    assert!(!KdError::InvalidArgument("x".into()).is_not_found());
    assert!(!KdError::MetricsUnavailable.is_not_found());
}
