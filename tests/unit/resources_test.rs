//! Tests for the resource engines

use crate::common::*;
use kubedoctor::diagnose::resources::{
    analyze_node_capacity, analyze_resource_efficiency, analyze_resource_usage, check_resource_quotas,
    top_resource_consumers, EfficiencyInput, NodeCapacityInput, QuotaInput, ResourceUsageInput, SortBy,
    TopConsumersInput,
};
use kubedoctor::diagnose::Severity;

const GI: i64 = 1024 * 1024 * 1024;

fn limited_pod(name: &str) -> k8s_openapi::api::core::v1::Pod {
    with_resources(create_ready_pod(name, "shop", &[("app", "api")]), "500m", "512Mi", "1000m", "1Gi")
}

#[tokio::test]
async fn test_cpu_over_ninety_percent_of_limit_is_critical() {
    let mut cluster = FakeCluster::new();
    cluster.pods.push(limited_pod("api-1"));
    cluster.pod_usage = Some(vec![create_pod_usage("shop", "api-1", 950, GI / 2)]);

    let report = analyze_resource_usage(&cluster, &ResourceUsageInput { namespace: "shop".into() }).await.unwrap();
    let critical = report.findings_of(Severity::Critical);
    assert_eq!(critical.len(), 1);
    assert_eq!(critical[0].message, "Pod 'api-1' CPU usage at 95.0% of limit (950m/1000m)");
    // memory at 50% of limit stays quiet
    assert!(report.findings_of(Severity::Warning).is_empty());
    assert!(report.render().contains("RESOURCE USAGE CHART"));
}

#[tokio::test]
async fn test_usage_without_metrics_is_noted_not_flagged() {
    let mut cluster = FakeCluster::new();
    cluster.pods.push(limited_pod("api-1"));

    let report = analyze_resource_usage(&cluster, &ResourceUsageInput { namespace: "shop".into() }).await.unwrap();
    assert!(report.findings.is_empty());
    assert!(report.diagrams.is_empty());
    let text = report.render();
    assert!(text.contains("metrics-server not available: usage data unavailable"));
    assert!(text.contains("Usage: N/A"));
    // per-pod rows never show a measured-looking zero
    assert!(text.contains("N/A/500m/1000m"));
    assert!(text.contains("N/A/512.0Mi/1.0Gi"));
    assert!(!text.contains("0m/500m/1000m"));
    assert!(!text.contains("0B/512.0Mi"));
}

#[tokio::test]
async fn test_pods_without_requests_or_limits_are_flagged() {
    let mut cluster = FakeCluster::new();
    cluster.pods.push(create_ready_pod("bare", "shop", &[]));
    cluster.pod_usage = Some(vec![create_pod_usage("shop", "bare", 10, 1024)]);

    let report = analyze_resource_usage(&cluster, &ResourceUsageInput { namespace: "shop".into() }).await.unwrap();
    assert_eq!(report.findings.len(), 1);
    assert_eq!(report.findings[0].severity, Severity::Warning);
    assert!(report.findings[0].message.contains("missing resource limits/requests"));
}

#[tokio::test]
async fn test_node_capacity_flags_not_ready_and_request_pressure() {
    let mut cluster = FakeCluster::new();
    cluster.nodes.push(create_mock_node("node-1", true, "2", "8Gi"));
    cluster.nodes.push(create_mock_node("node-2", false, "2", "8Gi"));
    cluster.pods.push(with_resources(create_mock_pod("busy", "shop", "Running"), "1900m", "1Gi", "", ""));

    let report = analyze_node_capacity(&cluster, &NodeCapacityInput::default()).await.unwrap();
    let messages: Vec<&str> = report.findings.iter().map(|f| f.message.as_str()).collect();
    assert!(messages.contains(&"Node 'node-1' CPU requests at 95.0% of allocatable: scheduling may fail"));
    assert!(messages.contains(&"Node 'node-2' is NotReady"));
    assert!(report.render().contains("metrics-server not available: actual usage data unavailable"));
}

#[tokio::test]
async fn test_quota_at_warn_percent_is_flagged() {
    let mut cluster = FakeCluster::new();
    cluster.quotas.push(create_mock_quota("compute", "shop", &[("cpu", "900m", "1"), ("memory", "1Gi", "4Gi")]));

    let report = check_resource_quotas(&cluster, &QuotaInput::default()).await.unwrap();
    assert_eq!(report.findings.len(), 1);
    assert_eq!(report.findings[0].message, "Quota 'compute' in namespace 'shop': cpu at 90.0% (900m/1)");
    let text = report.render();
    assert!(text.contains("90.0% [WARNING]"));
    assert!(text.contains("Total: 1 quotas checked, 1 warnings"));

    let relaxed = QuotaInput {
        namespace: Some("shop".into()),
        warn_percent: Some(95.0),
    };
    assert!(check_resource_quotas(&cluster, &relaxed).await.unwrap().findings.is_empty());
}

#[tokio::test]
async fn test_no_quotas() {
    let cluster = FakeCluster::new();
    let report = check_resource_quotas(&cluster, &QuotaInput::default()).await.unwrap();
    assert!(report.render().contains("No resource quotas found."));
}

#[tokio::test]
async fn test_top_consumers_require_metrics() {
    let cluster = FakeCluster::new();
    let report = top_resource_consumers(&cluster, &TopConsumersInput::default()).await.unwrap();
    assert!(report.findings.is_empty());
    assert!(report.render().contains("usage ranking requires pod metrics"));
}

#[tokio::test]
async fn test_top_consumers_rank_by_memory() {
    let mut cluster = FakeCluster::new();
    cluster.pod_usage = Some(vec![
        create_pod_usage("shop", "small", 900, GI / 4),
        create_pod_usage("shop", "large", 100, 2 * GI),
        create_pod_usage("ops", "medium", 50, GI),
    ]);
    let input = TopConsumersInput {
        namespace: None,
        sort_by: SortBy::Memory,
        limit: Some(2),
    };

    let report = top_resource_consumers(&cluster, &input).await.unwrap();
    let text = report.render();
    assert!(text.contains("Top 2 Resource Consumers by memory (namespace: all)"));
    let large = text.find("large").unwrap();
    let medium = text.find("medium").unwrap();
    assert!(large < medium);
    assert!(!text.contains("small"));
    assert_eq!(report.diagrams.len(), 1);
}

#[tokio::test]
async fn test_efficiency_waste_is_floored_and_packing_per_node() {
    let mut cluster = FakeCluster::new();
    cluster.nodes.push(create_mock_node("node-1", true, "2", "8Gi"));
    cluster.nodes.push(create_mock_node("node-2", true, "2", "8Gi"));
    // bursting above its CPU request, using half its memory request
    cluster
        .pods
        .push(with_resources(create_ready_pod("api-1", "shop", &[("app", "api")]), "500m", "2Gi", "1000m", "4Gi"));
    cluster.pod_usage = Some(vec![create_pod_usage("shop", "api-1", 900, GI)]);

    let report = analyze_resource_efficiency(&cluster, &EfficiencyInput { namespace: Some("shop".into()) })
        .await
        .unwrap();
    let text = report.render();
    assert!(text.contains("Total CPU Waste: 0m (efficiency: 180.0%)"));
    assert!(text.contains("Total Memory Waste: 1.0Gi (efficiency: 50.0%)"));
    assert!(text.contains("Bin Packing Efficiency (per Node)"));

    let node_1 = text.lines().find(|l| l.starts_with("node-1")).unwrap();
    assert_eq!(node_1.split_whitespace().collect::<Vec<_>>(), vec!["node-1", "1", "25.0%", "25.0%"]);
    let node_2 = text.lines().find(|l| l.starts_with("node-2")).unwrap();
    assert_eq!(node_2.split_whitespace().collect::<Vec<_>>(), vec!["node-2", "0", "0.0%", "0.0%"]);
    assert!(report.findings.is_empty());
}

#[tokio::test]
async fn test_efficiency_without_metrics_skips_waste() {
    let mut cluster = FakeCluster::new();
    cluster.pods.push(limited_pod("api-1"));

    let report = analyze_resource_efficiency(&cluster, &EfficiencyInput::default()).await.unwrap();
    let text = report.render();
    assert!(text.contains("metrics-server not available: waste calculations unavailable"));
    assert!(!text.contains("Total CPU Waste"));
    assert!(!text.contains("Right-Sizing Opportunities"));
}
