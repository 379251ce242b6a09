//! Tests for pod and namespace diagnosis

use crate::common::*;
use kubedoctor::diagnose::pod::{diagnose_pod, find_unhealthy_pods, PodInput, UnhealthyPodsInput};
use kubedoctor::diagnose::workload::{diagnose_namespace, NamespaceInput};
use kubedoctor::diagnose::Severity;
use std::sync::atomic::Ordering;

fn pod_input(name: &str) -> PodInput {
    PodInput {
        namespace: "shop".into(),
        pod: name.into(),
    }
}

#[tokio::test]
async fn test_crash_looping_pod() {
    let mut cluster = FakeCluster::new();
    cluster.pods.push(create_crashing_pod("api-1", "shop", &[("app", "api")]));
    cluster.logs.insert("api-1".to_string(), "panic: config missing\n".to_string());

    let report = diagnose_pod(&cluster, &pod_input("api-1")).await.unwrap();
    let critical = report.findings_of(Severity::Critical);
    assert_eq!(critical.len(), 1);
    assert_eq!(critical[0].message, "Container 'main' is in CrashLoopBackOff");
    assert!(report
        .findings_of(Severity::Warning)
        .iter()
        .any(|f| f.message == "Container 'main' has high restart count: 12"));
    assert_eq!(report.findings_of(Severity::Info).len(), 2);

    let text = report.render();
    assert!(text.contains("RECENT LOGS (container 'main', previous instance)"));
    assert!(text.contains("panic: config missing"));
    assert_eq!(cluster.log_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_healthy_pod_with_limits_has_no_findings() {
    let mut cluster = FakeCluster::new();
    cluster
        .pods
        .push(with_resources(create_ready_pod("api-1", "shop", &[]), "100m", "128Mi", "500m", "256Mi"));

    let report = diagnose_pod(&cluster, &pod_input("api-1")).await.unwrap();
    assert!(report.findings.is_empty());
    assert_eq!(cluster.log_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_pod_is_not_found() {
    let cluster = FakeCluster::new();
    let err = diagnose_pod(&cluster, &pod_input("ghost")).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_find_unhealthy_pods_across_namespaces() {
    let mut cluster = FakeCluster::new();
    cluster.pods.push(create_ready_pod("web-1", "shop", &[]));
    cluster.pods.push(create_crashing_pod("api-1", "shop", &[]));
    cluster.pods.push(create_mock_pod("batch-1", "ops", "Pending"));

    let report = find_unhealthy_pods(&cluster, &UnhealthyPodsInput::default()).await.unwrap();
    assert_eq!(report.findings_of(Severity::Critical).len(), 2);
    assert_eq!(report.findings[0].message, "Pod 'shop/api-1' is unhealthy: CrashLoopBackOff");
    assert!(report.render().contains("2 unhealthy pods out of 3 total"));

    let scoped = find_unhealthy_pods(&cluster, &UnhealthyPodsInput { namespace: Some("ops".into()) })
        .await
        .unwrap();
    assert_eq!(scoped.findings.len(), 1);
}

#[tokio::test]
async fn test_no_unhealthy_pods() {
    let mut cluster = FakeCluster::new();
    cluster.pods.push(create_ready_pod("web-1", "shop", &[]));
    let report = find_unhealthy_pods(&cluster, &UnhealthyPodsInput::default()).await.unwrap();
    assert!(report.findings.is_empty());
    assert!(report.render().contains("No unhealthy pods found."));
}

#[tokio::test]
async fn test_namespace_rollup() {
    let mut cluster = FakeCluster::new();
    cluster.pods.push(create_crashing_pod("api-1", "shop", &[("app", "api")]));
    cluster.pods.push(create_ready_pod("api-2", "shop", &[("app", "api")]));
    cluster.deployments.push(create_mock_deployment("api", "shop", 3, 1));

    let report = diagnose_namespace(&cluster, &NamespaceInput { namespace: "shop".into() }).await.unwrap();
    let messages: Vec<&str> = report.findings.iter().map(|f| f.message.as_str()).collect();
    assert_eq!(
        messages,
        vec![
            "1 unhealthy pods",
            "1 pods with >5 restarts",
            "1 deployments with unavailable replicas",
        ]
    );
    assert!(report.render().contains("3 issue(s) found"));
}

#[tokio::test]
async fn test_namespace_sub_lookup_failures_become_notes() {
    let mut cluster = FakeCluster::new();
    cluster.pods.push(create_ready_pod("api-1", "shop", &[]));
    cluster.failing.insert("list_pvcs");
    cluster.failing.insert("list_jobs");

    let report = diagnose_namespace(&cluster, &NamespaceInput { namespace: "shop".into() }).await.unwrap();
    assert!(report.findings.is_empty());
    let text = report.render();
    assert!(text.contains("could not list PVCs"));
    assert!(text.contains("could not list jobs"));
    assert!(text.contains("Namespace appears healthy. No issues found."));
}
