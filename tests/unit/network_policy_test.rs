//! Tests for the network policy audit

use crate::common::*;
use k8s_openapi::api::networking::v1::NetworkPolicyIngressRule;
use kubedoctor::diagnose::network_policy::{analyze_network_policies, analyze_policy, NetworkPolicyInput, RuleSet};
use kubedoctor::diagnose::Severity;

fn input(ns: &str) -> NetworkPolicyInput {
    NetworkPolicyInput { namespace: ns.to_string() }
}

#[tokio::test]
async fn test_no_policies_is_a_single_default_allow_warning() {
    let mut cluster = FakeCluster::new();
    cluster.pods.push(create_ready_pod("web-1", "shop", &[("app", "web")]));

    let report = analyze_network_policies(&cluster, &input("shop")).await.unwrap();
    assert_eq!(report.findings.len(), 1);
    assert_eq!(report.findings[0].severity, Severity::Warning);
    assert!(report.findings[0].message.contains("allowed by default"));

    assert_eq!(report.diagrams.len(), 1);
    let flow = report.diagrams[0].as_flowchart().unwrap();
    assert_eq!(flow.nodes().len(), 3);
    assert_eq!(flow.edges().len(), 2);
    assert!(flow.nodes().iter().any(|n| n.label == "Any Source"));
    assert!(flow.nodes().iter().any(|n| n.label == "All Pods in shop"));
    assert!(flow.nodes().iter().any(|n| n.label == "Any Destination"));

    let text = report.render();
    assert!(!text.contains("Policy Summary"));
    assert!(!text.contains("Allow/Deny Matrix"));
}

#[test]
fn test_ingress_type_with_no_rules_is_deny_all() {
    let np = create_mock_network_policy("lockdown", "shop", &[("app", "db")], Some(vec!["Ingress"]), Some(vec![]));
    assert_eq!(analyze_policy(&np).ingress, RuleSet::DenyAll);

    let absent = create_mock_network_policy("lockdown", "shop", &[("app", "db")], Some(vec!["Ingress"]), None);
    assert_eq!(analyze_policy(&absent).ingress, RuleSet::DenyAll);
}

#[test]
fn test_unset_types_mean_ingress_only() {
    let np = create_mock_network_policy("web", "shop", &[], None, Some(vec![NetworkPolicyIngressRule::default()]));
    let a = analyze_policy(&np);
    assert_eq!(a.types, vec!["Ingress".to_string()]);
    assert_eq!(a.egress, RuleSet::Unrestricted);
    assert!(matches!(a.ingress, RuleSet::Allow(_)));
}

#[tokio::test]
async fn test_deny_all_policy_is_critical_and_covers_selected_pods() {
    let mut cluster = FakeCluster::new();
    cluster.pods.push(create_ready_pod("db-0", "shop", &[("app", "db")]));
    cluster.pods.push(create_ready_pod("web-1", "shop", &[("app", "web")]));
    cluster.network_policies.push(create_mock_network_policy(
        "db-lockdown",
        "shop",
        &[("app", "db")],
        Some(vec!["Ingress"]),
        Some(vec![]),
    ));

    let report = analyze_network_policies(&cluster, &input("shop")).await.unwrap();
    assert!(report
        .findings_of(Severity::Critical)
        .iter()
        .any(|f| f.message.contains("'db-lockdown'") && f.message.contains("DENIED")));
    let uncovered = report.findings_of(Severity::Warning);
    assert_eq!(uncovered.len(), 1);
    assert!(uncovered[0].message.starts_with("1 pods have no matching network policy"));
    assert!(report.render().contains("Uncovered pods: web-1"));
}
