//! Tests for the ingress audit

use crate::common::*;
use kubedoctor::diagnose::ingress::{analyze_all_ingresses, IngressAuditInput};
use kubedoctor::diagnose::Severity;

fn shop() -> IngressAuditInput {
    IngressAuditInput {
        namespace: Some("shop".into()),
    }
}

fn api_cluster(ready: &[&str], not_ready: &[&str]) -> FakeCluster {
    let mut cluster = FakeCluster::new();
    cluster.services.push(create_mock_service("api", "shop", &[("app", "api")], 80, 8080));
    cluster.endpoints.push(create_mock_endpoints("api", "shop", ready, not_ready));
    cluster
}

#[tokio::test]
async fn test_healthy_ingress_has_no_findings() {
    let mut cluster = api_cluster(&["10.0.0.1"], &[]);
    cluster
        .ingresses
        .push(create_mock_ingress("web", "shop", "shop.example.com", "/api", "Prefix", "api", 80, true));

    let report = analyze_all_ingresses(&cluster, &shop()).await.unwrap();
    assert!(report.findings.is_empty());
    let text = report.render();
    assert!(text.contains("Endpoints: 1 ready"));
    assert!(text.contains("Secret: web-tls"));
    assert!(text.contains("No host/path conflicts detected."));
    assert!(text.contains("No issues found. All ingresses look healthy."));
}

#[tokio::test]
async fn test_backend_without_ready_endpoints_is_critical() {
    let mut cluster = api_cluster(&[], &["10.0.0.1", "10.0.0.2"]);
    cluster
        .ingresses
        .push(create_mock_ingress("web", "shop", "shop.example.com", "/api", "Prefix", "api", 80, true));

    let report = analyze_all_ingresses(&cluster, &shop()).await.unwrap();
    let critical = report.findings_of(Severity::Critical);
    assert_eq!(critical.len(), 1);
    assert_eq!(
        critical[0].message,
        "Service 'api' has 0/2 ready endpoints: shop.example.com/api will return 502/503"
    );
    assert!(report.findings_of(Severity::Warning).is_empty());
}

#[tokio::test]
async fn test_partially_ready_backend_is_a_warning() {
    let mut cluster = api_cluster(&["10.0.0.1"], &["10.0.0.2"]);
    cluster
        .ingresses
        .push(create_mock_ingress("web", "shop", "shop.example.com", "/api", "Prefix", "api", 80, true));

    let report = analyze_all_ingresses(&cluster, &shop()).await.unwrap();
    assert!(report.findings_of(Severity::Critical).is_empty());
    let warnings = report.findings_of(Severity::Warning);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].message, "Service 'api' has 1/2 ready endpoints");
}

#[tokio::test]
async fn test_missing_backend_and_undeclared_port() {
    let mut cluster = api_cluster(&["10.0.0.1"], &[]);
    cluster
        .ingresses
        .push(create_mock_ingress("docs", "shop", "docs.example.com", "/", "Prefix", "docs", 80, false));
    cluster
        .ingresses
        .push(create_mock_ingress("admin", "shop", "admin.example.com", "/", "Prefix", "api", 9090, true));

    let report = analyze_all_ingresses(&cluster, &shop()).await.unwrap();
    let messages: Vec<&str> = report.findings.iter().map(|f| f.message.as_str()).collect();
    assert!(messages.contains(&"Backend service 'docs' NOT FOUND"));
    assert!(messages.contains(&"Port '9090' not defined on service 'api'"));
    assert!(messages.contains(&"Ingress 'docs' has no TLS configured: traffic is unencrypted"));
    assert!(report.actions.contains(&"Create service 'docs' in namespace 'shop'".to_string()));
}

#[tokio::test]
async fn test_tls_without_secret_is_a_warning() {
    let mut cluster = api_cluster(&["10.0.0.1"], &[]);
    let mut ing = create_mock_ingress("web", "shop", "shop.example.com", "/", "Prefix", "api", 80, true);
    if let Some(tls) = ing.spec.as_mut().and_then(|s| s.tls.as_mut()) {
        tls[0].secret_name = None;
    }
    cluster.ingresses.push(ing);

    let report = analyze_all_ingresses(&cluster, &shop()).await.unwrap();
    assert_eq!(report.findings.len(), 1);
    assert_eq!(report.findings[0].severity, Severity::Warning);
    assert_eq!(report.findings[0].message, "No TLS secret specified: may use default certificate");
}

#[tokio::test]
async fn test_overlapping_paths_across_ingresses() {
    let mut cluster = api_cluster(&["10.0.0.1"], &[]);
    cluster
        .ingresses
        .push(create_mock_ingress("web", "shop", "shop.example.com", "/api", "Prefix", "api", 80, true));
    cluster
        .ingresses
        .push(create_mock_ingress("v1", "shop", "shop.example.com", "/api/v1", "Prefix", "api", 80, true));

    let report = analyze_all_ingresses(&cluster, &shop()).await.unwrap();
    assert_eq!(report.findings.len(), 1);
    assert_eq!(
        report.findings[0].message,
        "Potential conflict: host 'shop.example.com' path '/api' (ingress: shop/web) overlaps with path '/api/v1' (ingress: shop/v1)"
    );
    assert!(report.render().contains("Ingresses audited: 2"));
}

#[tokio::test]
async fn test_no_ingresses() {
    let cluster = FakeCluster::new();
    let report = analyze_all_ingresses(&cluster, &IngressAuditInput::default()).await.unwrap();
    assert!(report.findings.is_empty());
    assert!(report.render().contains("No ingresses found."));
    assert!(report.diagrams.is_empty());
}

#[tokio::test]
async fn test_endpoint_lookup_failure_is_reported_inline() {
    let mut cluster = api_cluster(&["10.0.0.1"], &[]);
    cluster
        .ingresses
        .push(create_mock_ingress("web", "shop", "shop.example.com", "/", "Prefix", "api", 80, true));
    cluster.failing.insert("get_endpoints");

    let report = analyze_all_ingresses(&cluster, &shop()).await.unwrap();
    assert!(report.findings.is_empty());
    assert!(report.render().contains("Endpoints: could not check (Timeout waiting for get_endpoints)"));
}
