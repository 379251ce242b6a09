//! Tests for the cluster health overview

use crate::common::*;
use kubedoctor::diagnose::cluster::{cluster_health_overview, ClusterInput};
use kubedoctor::diagnose::Severity;

const GI: i64 = 1024 * 1024 * 1024;

fn one_node() -> FakeCluster {
    let mut cluster = FakeCluster::new();
    cluster.nodes.push(create_mock_node("node-1", true, "2", "8Gi"));
    cluster
}

fn table_row(text: &str, first: &str) -> Option<usize> {
    text.lines().position(|l| l.split_whitespace().next() == Some(first))
}

#[tokio::test]
async fn test_service_without_ready_endpoints_is_dead() {
    let mut cluster = one_node();
    cluster.services.push(create_mock_service("api", "shop", &[("app", "api")], 80, 8080));
    cluster.endpoints.push(create_mock_endpoints("api", "shop", &[], &["10.0.0.1", "10.0.0.2"]));
    cluster.services.push(create_mock_service("web", "shop", &[("app", "web")], 80, 8080));
    cluster.endpoints.push(create_mock_endpoints("web", "shop", &["10.0.0.3"], &["10.0.0.4"]));

    let report = cluster_health_overview(&cluster, &ClusterInput::default()).await.unwrap();
    let critical = report.findings_of(Severity::Critical);
    assert_eq!(critical.len(), 1);
    assert_eq!(critical[0].message, "shop/api: 0/2 endpoints ready (DEAD)");
    let warnings = report.findings_of(Severity::Warning);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].message, "shop/web: 1/2 not ready (DEGRADED)");
}

#[tokio::test]
async fn test_external_name_and_selectorless_services_are_skipped() {
    let mut cluster = one_node();
    cluster.services.push(create_mock_service("api", "shop", &[("app", "api")], 80, 8080));
    cluster.endpoints.push(create_mock_endpoints("api", "shop", &["10.0.0.1"], &[]));
    cluster.services.push(create_mock_service("manual", "shop", &[], 80, 8080));
    let mut external = create_mock_service("billing", "shop", &[("app", "billing")], 443, 443);
    if let Some(spec) = external.spec.as_mut() {
        spec.type_ = Some("ExternalName".to_string());
        spec.external_name = Some("billing.example.com".to_string());
    }
    cluster.services.push(external);

    let report = cluster_health_overview(&cluster, &ClusterInput::default()).await.unwrap();
    assert_eq!(cluster.call_count("get_endpoints"), 1);
    assert!(report.findings.is_empty());
    assert!(report.render().contains("All 1 services with selectors have healthy endpoints"));
}

#[tokio::test]
async fn test_endpoint_lookup_failure_is_noted() {
    let mut cluster = one_node();
    cluster.services.push(create_mock_service("api", "shop", &[("app", "api")], 80, 8080));
    cluster.failing.insert("get_endpoints");

    let report = cluster_health_overview(&cluster, &ClusterInput::default()).await.unwrap();
    let text = report.render();
    assert!(text.contains("(could not fetch endpoints for shop/api: Timeout waiting for get_endpoints)"));
    assert!(text.contains("0 services with selectors healthy, 1 not checked"));
    assert!(!text.contains("have healthy endpoints"));
}

#[tokio::test]
async fn test_namespaces_sorted_by_unhealthy_count() {
    let mut cluster = one_node();
    cluster.pods.push(create_crashing_pod("a-1", "alpha", &[]));
    cluster.pods.push(create_crashing_pod("b-1", "beta", &[]));
    cluster.pods.push(create_crashing_pod("b-2", "beta", &[]));
    let mut restarting = create_ready_pod("g-1", "gamma", &[]);
    set_container_status(&mut restarting, true, None, 7);
    cluster.pods.push(restarting);
    cluster.pods.push(create_ready_pod("d-1", "delta", &[]));

    let report = cluster_health_overview(&cluster, &ClusterInput::default()).await.unwrap();
    let text = report.render();
    let beta = table_row(&text, "beta").unwrap();
    let alpha = table_row(&text, "alpha").unwrap();
    let gamma = table_row(&text, "gamma").unwrap();
    assert!(beta < alpha && alpha < gamma);
    assert!(table_row(&text, "delta").is_none());
    assert!(report.findings.iter().any(|f| f.message == "3 unhealthy pods cluster-wide"));
    assert!(report
        .findings
        .iter()
        .any(|f| f.message == "1 pod(s) with high restarts in namespace 'gamma'"));
}

#[tokio::test]
async fn test_warning_events_within_the_last_hour() {
    let mut cluster = one_node();
    cluster.events.push(create_mock_event("shop", "Warning", "BackOff", 10, true));
    cluster.events.push(create_mock_event("shop", "Warning", "FailedMount", 120, true));
    // no lastTimestamp: falls back to creation time
    cluster.events.push(create_mock_event("shop", "Warning", "FailedScheduling", 5, false));
    cluster.events.push(create_mock_event("shop", "Normal", "Pulled", 1, true));

    let report = cluster_health_overview(&cluster, &ClusterInput::default()).await.unwrap();
    assert_eq!(report.findings.len(), 1);
    assert_eq!(report.findings[0].message, "2 warning events in the last hour");
    let text = report.render();
    assert!(text.contains("    BackOff: 1"));
    assert!(text.contains("    FailedScheduling: 1"));
    assert!(!text.contains("FailedMount"));
    assert!(!text.contains("Pulled"));
}

#[tokio::test]
async fn test_sections_degrade_independently() {
    let mut cluster = one_node();
    cluster.failing.insert("list_pods");
    cluster.failing.insert("list_services");
    cluster.failing.insert("list_events");
    cluster.failing.insert("list_ingresses");

    let report = cluster_health_overview(&cluster, &ClusterInput::default()).await.unwrap();
    let text = report.render();
    assert!(text.contains("1/1 nodes ready"));
    assert!(text.contains("(metrics-server not available)"));
    assert!(text.contains("(could not list pods: Timeout waiting for list_pods)"));
    assert!(text.contains("(could not list services: Timeout waiting for list_services)"));
    assert!(text.contains("(could not list events: Timeout waiting for list_events)"));
    assert!(text.contains("(could not list kube-system pods: Timeout waiting for list_pods)"));
    assert!(report.findings.is_empty());
    assert_eq!(report.diagrams.len(), 1);
}

#[tokio::test]
async fn test_utilization_uses_node_metrics() {
    let mut cluster = one_node();
    cluster.nodes.push(create_mock_node("node-2", false, "2", "8Gi"));
    cluster.node_usage = Some(vec![create_node_usage("node-1", 500, 2 * GI), create_node_usage("node-2", 500, 2 * GI)]);

    let report = cluster_health_overview(&cluster, &ClusterInput::default()).await.unwrap();
    let text = report.render();
    assert!(text.contains("CPU:    1000m / 4000m (25.0%)"));
    assert!(text.contains("Memory: 4.0Gi / 16.0Gi (25.0%)"));
    assert!(text.contains("1/2 nodes ready"));
    let critical = report.findings_of(Severity::Critical);
    assert_eq!(critical.len(), 1);
    assert_eq!(critical[0].message, "Node 'node-2' is NotReady");
}

#[tokio::test]
async fn test_node_list_failure_is_an_error() {
    let mut cluster = one_node();
    cluster.failing.insert("list_nodes");
    assert!(cluster_health_overview(&cluster, &ClusterInput::default()).await.is_err());
}
