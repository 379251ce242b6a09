//! Tests for service dependency inference

use crate::common::*;
use kubedoctor::diagnose::topology::{infer_dependencies, infer_service_dependencies};
use kubedoctor::diagnose::Confidence;

fn edges(cluster: &FakeCluster) -> Vec<(String, String, Confidence)> {
    infer_dependencies("shop", &cluster.services, &cluster.pods)
        .into_iter()
        .map(|d| (d.from_service, d.to_service, d.confidence))
        .collect()
}

fn shop() -> FakeCluster {
    let mut cluster = FakeCluster::new();
    for name in ["api", "db", "cache", "web"] {
        cluster.services.push(create_mock_service(name, "shop", &[("app", name)], 80, 8080));
    }
    cluster
}

#[test]
fn test_service_host_env_is_high_confidence() {
    let mut cluster = shop();
    cluster.pods.push(with_env(
        create_ready_pod("api-1", "shop", &[("app", "api")]),
        &[("DB_SERVICE_HOST", "10.0.0.5"), ("UNKNOWN_SERVICE_HOST", "10.0.0.9")],
    ));

    assert_eq!(edges(&cluster), vec![("api".to_string(), "db".to_string(), Confidence::High)]);
}

#[test]
fn test_dns_name_in_value_is_medium_confidence() {
    let mut cluster = shop();
    cluster.pods.push(with_env(
        create_ready_pod("web-1", "shop", &[("app", "web")]),
        &[("API_URL", "http://api.shop:80"), ("CACHE_URL", "redis://cache.other:6379")],
    ));

    assert_eq!(edges(&cluster), vec![("web".to_string(), "api".to_string(), Confidence::Medium)]);
}

#[test]
fn test_self_references_are_ignored() {
    let mut cluster = shop();
    cluster.pods.push(with_env(
        create_ready_pod("api-1", "shop", &[("app", "api")]),
        &[("API_SERVICE_HOST", "10.0.0.10"), ("SELF_URL", "http://api.shop.svc")],
    ));

    assert!(edges(&cluster).is_empty());
}

#[test]
fn test_edges_are_deduplicated_by_pair() {
    let mut cluster = shop();
    let env = [
        ("DB_SERVICE_HOST", "10.0.0.5"),
        ("DB_URL", "postgres://db.shop.svc:5432"),
        ("CACHE_URL", "redis://cache.shop.svc:6379"),
    ];
    cluster.pods.push(with_env(create_ready_pod("api-1", "shop", &[("app", "api")]), &env));
    cluster.pods.push(with_env(create_ready_pod("api-2", "shop", &[("app", "api")]), &env));

    // the first sighting of a pair keeps its confidence
    assert_eq!(
        edges(&cluster),
        vec![
            ("api".to_string(), "db".to_string(), Confidence::High),
            ("api".to_string(), "cache".to_string(), Confidence::Medium),
        ]
    );
}

#[test]
fn test_pods_outside_any_service_contribute_nothing() {
    let mut cluster = shop();
    cluster.pods.push(with_env(create_ready_pod("debug", "shop", &[("run", "debug")]), &[("DB_SERVICE_HOST", "10.0.0.5")]));

    assert!(edges(&cluster).is_empty());
}

#[tokio::test]
async fn test_infer_service_dependencies_reads_one_namespace() {
    let mut cluster = shop();
    cluster.services.push(create_mock_service("api", "ops", &[("app", "api")], 80, 8080));
    cluster.pods.push(with_env(
        create_ready_pod("api-ops", "ops", &[("app", "api")]),
        &[("WEB_SERVICE_HOST", "10.0.0.7")],
    ));
    cluster.pods.push(with_env(
        create_ready_pod("api-1", "shop", &[("app", "api")]),
        &[("DB_SERVICE_HOST", "10.0.0.5")],
    ));

    let deps = infer_service_dependencies(&cluster, "shop").await.unwrap();
    assert_eq!(deps.len(), 1);
    assert_eq!(deps[0].from_service, "api");
    assert_eq!(deps[0].to_service, "db");
    assert_eq!(deps[0].namespace, "shop");
}
