//! Tests for deployment log scanning

use crate::common::*;
use kubedoctor::diagnose::logs::{analyze_service_logs, ServiceLogsInput};
use kubedoctor::diagnose::Severity;
use kubedoctor::error::KdError;
use std::sync::atomic::Ordering;

fn input(deployment: &str, pattern: Option<&str>) -> ServiceLogsInput {
    ServiceLogsInput {
        namespace: "shop".to_string(),
        deployment: deployment.to_string(),
        pattern: pattern.map(str::to_string),
        tail: None,
    }
}

fn cluster_with_api() -> FakeCluster {
    let mut cluster = FakeCluster::new();
    cluster.deployments.push(create_mock_deployment("api", "shop", 2, 2));
    cluster.pods.push(create_ready_pod("api-1", "shop", &[("app", "api")]));
    cluster.pods.push(create_ready_pod("api-2", "shop", &[("app", "api")]));
    cluster.pods.push(create_ready_pod("worker-1", "shop", &[("app", "worker")]));
    cluster
}

#[tokio::test]
async fn test_invalid_pattern_is_rejected_before_any_lookup() {
    let cluster = cluster_with_api();
    let err = analyze_service_logs(&cluster, &input("api", Some("(unclosed"))).await.unwrap_err();
    assert!(matches!(err, KdError::InvalidArgument(_)));
    assert!(cluster.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_deployment_is_not_found() {
    let cluster = cluster_with_api();
    let err = analyze_service_logs(&cluster, &input("ghost", None)).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_clean_logs_report_no_matches() {
    let mut cluster = cluster_with_api();
    cluster.logs.insert("api-1".to_string(), "GET / 200\nGET /health 200\n".to_string());

    let report = analyze_service_logs(&cluster, &input("api", None)).await.unwrap();
    assert!(report.findings.is_empty());
    assert!(report.render().contains("No matching log entries found."));
    // one call per container of each selected pod; worker-1 is not selected
    assert_eq!(cluster.log_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_matches_produce_single_warning() {
    let mut cluster = cluster_with_api();
    cluster.logs.insert("api-1".to_string(), "ERROR db down\nok\nconnection refused\n".to_string());
    cluster.logs.insert("api-2".to_string(), "panic: nil map\n".to_string());

    let report = analyze_service_logs(&cluster, &input("api", None)).await.unwrap();
    assert_eq!(report.findings.len(), 1);
    assert_eq!(report.findings[0].severity, Severity::Warning);
    assert_eq!(
        report.findings[0].message,
        "3 log lines in deployment 'api' match the error pattern"
    );

    let text = report.render();
    assert!(text.contains("Found 3 matching entries"));
    assert!(text.contains("[api-2] panic: nil map"));
}

#[tokio::test]
async fn test_custom_pattern_and_log_failures() {
    let mut cluster = cluster_with_api();
    cluster.logs.insert("api-1".to_string(), "slow query 900ms\nERROR x\n".to_string());
    let report = analyze_service_logs(&cluster, &input("api", Some("slow query"))).await.unwrap();
    assert_eq!(report.findings[0].message, "1 log lines in deployment 'api' match the error pattern");

    cluster.failing.insert("pod_logs");
    let report = analyze_service_logs(&cluster, &input("api", None)).await.unwrap();
    assert!(report.findings.is_empty());
    assert!(report.render().contains("could not get logs"));
}
