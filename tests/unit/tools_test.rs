//! Tests for the tool registry and dispatcher

use crate::common::*;
use kubedoctor::config::AppConfig;
use kubedoctor::error::KdError;
use kubedoctor::tools::{find, invoke, invoke_with, registry};
use serde_json::{json, Value};

#[test]
fn test_registry_lists_every_tool() {
    let names: Vec<&str> = registry().iter().map(|t| t.name).collect();
    assert_eq!(names.len(), 18);
    assert_eq!(names[0], "diagnose_request_path");
    for name in ["diagnose_service", "check_dns_health", "map_service_topology", "analyze_service_connectivity"] {
        assert!(names.contains(&name), "missing {}", name);
    }
}

#[test]
fn test_tool_schemas_are_objects() {
    for tool in registry() {
        assert_eq!(tool.parameters["type"], "object", "{}", tool.name);
        assert!(!tool.description.is_empty());
    }
    let spec = find("diagnose_pod").unwrap();
    assert_eq!(spec.parameters["required"], json!(["namespace", "pod"]));
    assert!(find("delete_everything").is_none());
}

#[tokio::test]
async fn test_unknown_tool() {
    let cluster = FakeCluster::new();
    let err = invoke(&cluster, "delete_everything", json!({})).await.unwrap_err();
    assert!(matches!(err, KdError::UnknownTool(ref name) if name == "delete_everything"));
    assert!(cluster.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_arguments_never_reach_the_cluster() {
    let cluster = FakeCluster::new();
    for (tool, args) in [
        ("diagnose_service", json!({ "namespace": "shop" })),
        ("diagnose_pod", json!({ "namespace": "shop", "pod": "" })),
        ("diagnose_request_path", json!({ "hostname": 42 })),
        ("top_resource_consumers", json!({ "sort_by": "disk" })),
    ] {
        let err = invoke(&cluster, tool, args).await.unwrap_err();
        assert!(matches!(err, KdError::InvalidArgument(_)), "{}: {:?}", tool, err);
    }
    assert!(cluster.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_all_namespace_is_normalized() {
    let mut cluster = FakeCluster::new();
    cluster.pods.push(create_crashing_pod("api-1", "shop", &[]));
    cluster.pods.push(create_crashing_pod("job-1", "ops", &[]));

    let report = invoke(&cluster, "find_unhealthy_pods", json!({ "namespace": "all" })).await.unwrap();
    assert_eq!(report.findings.len(), 2);
    assert!(report.title.contains("namespace: all"));

    let report = invoke(&cluster, "find_unhealthy_pods", Value::Null).await.unwrap();
    assert_eq!(report.findings.len(), 2);
}

#[tokio::test]
async fn test_single_namespace_tools_reject_all_synonyms() {
    let cluster = FakeCluster::new();
    for ns in ["all", "*", " all "] {
        for (tool, args) in [
            ("analyze_network_policies", json!({ "namespace": ns })),
            ("diagnose_namespace", json!({ "namespace": ns })),
            ("analyze_resource_usage", json!({ "namespace": ns })),
            ("map_service_topology", json!({ "namespace": ns })),
            ("diagnose_service", json!({ "namespace": ns, "service": "api" })),
            ("diagnose_pod", json!({ "namespace": ns, "pod": "api-1" })),
            ("analyze_service_connectivity", json!({ "namespace": ns, "service": "api" })),
            ("analyze_service_logs", json!({ "namespace": ns, "deployment": "api" })),
        ] {
            let err = invoke(&cluster, tool, args).await.unwrap_err();
            assert!(
                matches!(err, KdError::InvalidArgument(ref msg) if msg.contains("requires a specific namespace")),
                "{} with {:?}: {:?}",
                tool,
                ns,
                err
            );
        }
    }
    assert!(cluster.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_argument_aliases() {
    let mut cluster = FakeCluster::new();
    cluster.services.push(create_mock_service("api", "shop", &[("app", "api")], 80, 8080));
    let report = invoke(
        &cluster,
        "analyze_service_connectivity",
        json!({ "namespace": "shop", "service_name": "api" }),
    )
    .await
    .unwrap();
    assert!(report.title.starts_with("Service Connectivity Analysis: api"));
}

#[tokio::test]
async fn test_config_fills_unset_tunables() {
    let mut cluster = FakeCluster::new();
    cluster.quotas.push(create_mock_quota("compute", "shop", &[("cpu", "700m", "1")]));

    let report = invoke(&cluster, "check_resource_quotas", json!({})).await.unwrap();
    assert!(report.findings.is_empty());

    let config = AppConfig {
        quota_warn_percent: 60.0,
        ..Default::default()
    };
    let report = invoke_with(&cluster, &config, "check_resource_quotas", json!({})).await.unwrap();
    assert_eq!(report.findings.len(), 1);

    // explicit arguments win over config
    let report = invoke_with(&cluster, &config, "check_resource_quotas", json!({ "warn_percent": 75.0 }))
        .await
        .unwrap();
    assert!(report.findings.is_empty());
}

#[tokio::test]
async fn test_cancellation_propagates() {
    let mut cluster = FakeCluster::new();
    cluster.pods.push(create_ready_pod("api-1", "shop", &[]));
    cluster.cancel();
    let err = invoke(&cluster, "diagnose_namespace", json!({ "namespace": "shop" })).await.unwrap_err();
    assert!(matches!(err, KdError::Cancelled));
}
