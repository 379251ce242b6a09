//! Tests for connectivity checks, endpoint listings and topology maps

use crate::common::*;
use kubedoctor::diagnose::connectivity::{
    analyze_service_connectivity, list_endpoint_health, map_service_topology, ConnectivityInput, EndpointHealthInput,
    TopologyInput,
};
use kubedoctor::diagnose::Severity;
use kubedoctor::error::KdError;

fn connectivity(service: &str) -> ConnectivityInput {
    ConnectivityInput {
        namespace: "shop".into(),
        service: service.into(),
    }
}

fn api_cluster() -> FakeCluster {
    let mut cluster = FakeCluster::new();
    cluster.services.push(create_mock_service("api", "shop", &[("app", "api")], 80, 8080));
    cluster.endpoints.push(create_mock_endpoints("api", "shop", &["10.1.0.5"], &[]));
    cluster
}

#[tokio::test]
async fn test_endpoint_listing_classifies_every_service() {
    let mut cluster = FakeCluster::new();
    for name in ["api", "web", "cache"] {
        cluster.services.push(create_mock_service(name, "shop", &[("app", name)], 80, 8080));
    }
    cluster.endpoints.push(create_mock_endpoints("api", "shop", &[], &["10.1.0.1"]));
    cluster.endpoints.push(create_mock_endpoints("web", "shop", &["10.1.0.2", "10.1.0.3"], &[]));
    cluster.endpoints.push(create_mock_endpoints("cache", "shop", &["10.1.0.4"], &["10.1.0.5"]));

    let report = list_endpoint_health(&cluster, &EndpointHealthInput::default()).await.unwrap();
    let critical = report.findings_of(Severity::Critical);
    assert_eq!(critical.len(), 1);
    assert_eq!(critical[0].message, "Service 'shop/api' has 0 ready endpoints: all traffic will fail");
    assert_eq!(report.findings_of(Severity::Warning).len(), 1);

    let text = report.render();
    assert!(text.contains("Endpoint Health Report (namespace: all)"));
    assert!(text.contains("DEAD"));
    assert!(text.contains("DEGRADED"));
    assert!(text.contains("Summary: 1 healthy, 1 degraded, 1 dead out of 3 services"));
}

#[tokio::test]
async fn test_endpoint_listing_soft_fails_per_service() {
    let mut cluster = api_cluster();
    cluster.failing.insert("get_endpoints");

    let report = list_endpoint_health(&cluster, &EndpointHealthInput { namespace: Some("shop".into()) }).await.unwrap();
    assert_eq!(report.findings.len(), 1);
    assert!(report.findings[0].message.starts_with("Could not check endpoint health for service 'shop/api'"));
    assert!(report.render().contains("ERROR"));
}

#[tokio::test]
async fn test_missing_service_is_reported_not_raised() {
    let cluster = FakeCluster::new();
    let report = analyze_service_connectivity(&cluster, &connectivity("ghost")).await.unwrap();
    assert_eq!(report.findings.len(), 1);
    assert_eq!(report.findings[0].severity, Severity::Critical);
    assert_eq!(report.findings[0].message, "Service 'shop/ghost' not found");
    assert!(report.actions.iter().any(|a| a.contains("list_endpoint_health")));
    assert_eq!(cluster.call_count("list_pods"), 0);
}

#[tokio::test]
async fn test_healthy_service_passes_every_check() {
    let mut cluster = api_cluster();
    cluster.pods.push(create_ready_pod("api-1", "shop", &[("app", "api")]));

    let report = analyze_service_connectivity(&cluster, &connectivity("api")).await.unwrap();
    assert!(report.findings.is_empty(), "unexpected findings: {:?}", report.findings);
    let text = report.render();
    assert!(text.contains("Port 80/TCP -> target 8080: OK"));
    assert!(text.contains("No network policies in namespace"));
    assert!(text.contains("Service is not exposed via any Ingress"));
    assert!(text.contains("Service connectivity looks healthy"));
    assert!(text.contains("CONNECTIVITY DIAGRAM"));
}

#[tokio::test]
async fn test_undeclared_target_port_is_a_warning() {
    let mut cluster = api_cluster();
    cluster
        .pods
        .push(with_container_port(create_ready_pod("api-1", "shop", &[("app", "api")]), 9090, Some("metrics")));

    let report = analyze_service_connectivity(&cluster, &connectivity("api")).await.unwrap();
    assert_eq!(report.findings.len(), 1);
    assert_eq!(
        report.findings[0].message,
        "Service port 80/TCP targets port 8080, but no container declares this port"
    );
}

#[tokio::test]
async fn test_selector_without_pods_is_critical() {
    let cluster = api_cluster();
    let report = analyze_service_connectivity(&cluster, &connectivity("api")).await.unwrap();
    assert!(report.has_severity(Severity::Critical));
    assert!(report.render().contains("Skipped: no matched pods to validate against."));
}

#[tokio::test]
async fn test_topology_requires_a_namespace() {
    let cluster = FakeCluster::new();
    let err = map_service_topology(&cluster, &TopologyInput { namespace: "all".into() }).await.unwrap_err();
    assert!(matches!(err, KdError::InvalidArgument(_)));
    assert_eq!(cluster.call_count("list_services"), 0);
}

#[tokio::test]
async fn test_topology_flags_services_without_backends() {
    let mut cluster = api_cluster();
    cluster.services.push(create_mock_service("orphan", "shop", &[("app", "orphan")], 80, 80));
    cluster.endpoints.push(create_mock_endpoints("orphan", "shop", &[], &[]));
    cluster.pods.push(create_ready_pod("api-1", "shop", &[("app", "api")]));

    let report = map_service_topology(&cluster, &TopologyInput { namespace: "shop".into() }).await.unwrap();
    let critical = report.findings_of(Severity::Critical);
    assert_eq!(critical.len(), 1);
    assert_eq!(critical[0].message, "Service 'orphan' has 0 endpoints: no pods match its selector");
    let text = report.render();
    assert!(text.contains("Service Topology Map (namespace: shop)"));
    assert!(text.contains("TOPOLOGY DIAGRAM"));
}
