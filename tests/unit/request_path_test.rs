//! Tests for the request-path trace

use crate::common::*;
use kubedoctor::diagnose::request_path::{diagnose_request_path, RequestPathInput};
use kubedoctor::diagnose::Severity;
use kubedoctor::mermaid::Style;

fn input(host: &str, path: &str) -> RequestPathInput {
    RequestPathInput {
        hostname: host.to_string(),
        path: Some(path.to_string()),
        namespace: None,
    }
}

/// api.example.com/v1 -> service api with two not-ready endpoints
fn not_ready_cluster() -> FakeCluster {
    let mut cluster = FakeCluster::new();
    cluster.ingresses.push(create_mock_ingress("api", "shop", "api.example.com", "/v1", "Prefix", "api", 80, true));
    cluster.services.push(create_mock_service("api", "shop", &[("app", "api")], 80, 8080));
    cluster.endpoints.push(create_mock_endpoints("api", "shop", &[], &["10.1.0.4", "10.1.0.5"]));
    cluster.pods.push(create_crashing_pod("api-1", "shop", &[("app", "api")]));
    cluster.pods.push(create_crashing_pod("api-2", "shop", &[("app", "api")]));
    cluster
}

#[tokio::test]
async fn test_not_ready_endpoints_are_reported_with_counts() {
    let cluster = not_ready_cluster();
    let report = diagnose_request_path(&cluster, &input("api.example.com", "/v1/orders")).await.unwrap();

    let endpoint_findings: Vec<_> = report
        .findings
        .iter()
        .filter(|f| f.message.contains("0 ready") && f.message.contains("2 not ready"))
        .collect();
    assert_eq!(endpoint_findings.len(), 1);
    assert!(matches!(endpoint_findings[0].severity, Severity::Critical | Severity::Warning));

    let topology = report
        .diagrams
        .iter()
        .find_map(|d| d.as_flowchart())
        .expect("topology diagram");
    let svc_node = topology
        .nodes()
        .iter()
        .find(|n| n.label.starts_with("Service: api"))
        .expect("service node");
    assert!(matches!(svc_node.style, Some(Style::Critical) | Some(Style::Warning)));
}

#[tokio::test]
async fn test_trace_continues_to_pods_after_endpoint_failure() {
    let cluster = not_ready_cluster();
    let report = diagnose_request_path(&cluster, &input("api.example.com", "/v1")).await.unwrap();
    assert!(report.findings.iter().any(|f| f.message.contains("api-1")));
    assert!(report.findings.iter().any(|f| f.message.contains("api-2")));
}

#[tokio::test]
async fn test_no_matching_ingress_exits_early() {
    let cluster = not_ready_cluster();
    let report = diagnose_request_path(&cluster, &input("www.example.com", "/")).await.unwrap();
    assert_eq!(report.findings.len(), 1);
    assert_eq!(report.findings[0].severity, Severity::Critical);
    assert!(report.findings[0].message.contains("No Ingress found for www.example.com/"));
    assert!(report.diagrams.is_empty());
    assert_eq!(cluster.call_count("get_service"), 0);
    assert!(report.render().contains("SUGGESTED ACTIONS:"));
}

#[tokio::test]
async fn test_missing_backend_service_keeps_earlier_findings() {
    let mut cluster = FakeCluster::new();
    cluster.ingresses.push(create_mock_ingress("web", "shop", "shop.example.com", "/", "Prefix", "web", 80, false));
    let report = diagnose_request_path(&cluster, &input("shop.example.com", "/cart")).await.unwrap();

    assert!(report.findings.iter().any(|f| f.message == "No TLS configured for this host"));
    let last = report.findings.last().unwrap();
    assert_eq!(last.severity, Severity::Critical);
    assert!(last.message.contains("Backend service 'web' not found"));
    assert_eq!(cluster.call_count("get_endpoints"), 0);
}

#[tokio::test]
async fn test_missing_tls_is_a_warning_not_critical() {
    let mut cluster = FakeCluster::new();
    cluster.ingresses.push(create_mock_ingress("web", "shop", "shop.example.com", "/", "Prefix", "web", 80, false));
    cluster.services.push(create_mock_service("web", "shop", &[("app", "web")], 80, 8080));
    cluster.endpoints.push(create_mock_endpoints("web", "shop", &["10.1.0.9"], &[]));
    cluster.pods.push(create_ready_pod("web-1", "shop", &[("app", "web")]));

    let report = diagnose_request_path(&cluster, &input("shop.example.com", "/")).await.unwrap();
    let tls = report.findings.iter().find(|f| f.message.contains("TLS")).unwrap();
    assert_eq!(tls.severity, Severity::Warning);
}

#[tokio::test]
async fn test_same_snapshot_gives_same_findings_and_graph() {
    let cluster = not_ready_cluster();
    let first = diagnose_request_path(&cluster, &input("api.example.com", "/v1")).await.unwrap();
    let second = diagnose_request_path(&cluster, &input("api.example.com", "/v1")).await.unwrap();

    assert_eq!(first.findings, second.findings);
    assert_eq!(first.actions, second.actions);
    let a = first.diagrams[0].as_flowchart().unwrap();
    let b = second.diagrams[0].as_flowchart().unwrap();
    assert_eq!(a.nodes(), b.nodes());
    assert_eq!(a.edges(), b.edges());
}

#[tokio::test]
async fn test_cancellation_aborts_the_trace() {
    let cluster = not_ready_cluster();
    cluster.cancel();
    let err = diagnose_request_path(&cluster, &input("api.example.com", "/v1")).await.unwrap_err();
    assert!(matches!(err, kubedoctor::error::KdError::Cancelled));
}
