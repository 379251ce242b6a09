//! NetworkPolicy audit: effective types, allow/deny matrix and pod coverage
//!
//! A policy typed for a direction with an empty rule list denies all traffic
//! in that direction. A direction absent from the effective types is not
//! restricted by that policy at all.

use super::describe;
use super::health;
use super::selector::{self, matches_label_selector};
use super::types::{Finding, ResourceRef};
use super::Report;
use crate::client::{ClusterAccess, ListQuery};
use crate::error::Result;
use crate::mermaid::{Diagram, Direction, EdgeKind, Flowchart, Shape, Style};
use k8s_openapi::api::networking::v1::{NetworkPolicy, NetworkPolicyPeer, NetworkPolicyPort};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkPolicyInput {
    pub namespace: String,
}

/// What one policy says about one traffic direction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleSet {
    /// Direction not among the policy's effective types
    Unrestricted,
    /// Typed for the direction with zero rules
    DenyAll,
    /// Allowed peers per rule, with the rule's port label
    Allow(Vec<AllowRule>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowRule {
    pub peers: Vec<String>,
    pub ports: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PolicyAnalysis {
    pub name: String,
    pub selector: LabelSelector,
    pub types: Vec<String>,
    pub ingress: RuleSet,
    pub egress: RuleSet,
}

impl PolicyAnalysis {
    pub fn selects_all(&self) -> bool {
        selector::is_empty_selector(&self.selector)
    }
}

/// Explicit `policyTypes`, or Ingress alone when unset
pub fn effective_types(np: &NetworkPolicy) -> Vec<String> {
    match np.spec.as_ref().and_then(|s| s.policy_types.as_ref()) {
        Some(types) if !types.is_empty() => types.clone(),
        _ => vec!["Ingress".to_string()],
    }
}

fn describe_peer(peer: &NetworkPolicyPeer) -> String {
    if let Some(block) = &peer.ip_block {
        return match block.except.as_ref().filter(|e| !e.is_empty()) {
            Some(except) => format!("{} except {}", block.cidr, except.join(",")),
            None => block.cidr.clone(),
        };
    }
    match (&peer.pod_selector, &peer.namespace_selector) {
        (Some(pods), Some(ns)) => format!("pods({}) in namespaces({})", selector::describe(pods), selector::describe(ns)),
        (Some(pods), None) => format!("pods({})", selector::describe(pods)),
        (None, Some(ns)) => format!("namespaces({})", selector::describe(ns)),
        (None, None) => "any".to_string(),
    }
}

fn describe_ports(ports: Option<&Vec<NetworkPolicyPort>>) -> Option<String> {
    let parts: Vec<String> = ports
        .into_iter()
        .flatten()
        .filter_map(|p| {
            let port = p.port.as_ref().map(describe::int_or_string)?;
            let proto = p.protocol.as_deref().unwrap_or("TCP");
            Some(match p.end_port {
                Some(end) => format!("{}-{}/{}", port, end, proto),
                None => format!("{}/{}", port, proto),
            })
        })
        .collect();
    (!parts.is_empty()).then(|| parts.join(","))
}

/// Peers and ports of one ingress or egress rule
type RawRule<'a> = (Option<&'a Vec<NetworkPolicyPeer>>, Option<&'a Vec<NetworkPolicyPort>>);

fn rule_set(typed: bool, rules: Vec<RawRule<'_>>, any_label: &str) -> RuleSet {
    if !typed {
        return RuleSet::Unrestricted;
    }
    if rules.is_empty() {
        return RuleSet::DenyAll;
    }
    RuleSet::Allow(
        rules
            .into_iter()
            .map(|(peers, ports)| {
                let peers: Vec<String> = match peers.filter(|p| !p.is_empty()) {
                    Some(peers) => peers.iter().map(describe_peer).collect(),
                    None => vec![any_label.to_string()],
                };
                AllowRule {
                    peers,
                    ports: describe_ports(ports),
                }
            })
            .collect(),
    )
}

pub fn analyze_policy(np: &NetworkPolicy) -> PolicyAnalysis {
    let types = effective_types(np);
    let spec = np.spec.as_ref();
    let ingress_rules: Vec<RawRule<'_>> = spec
        .and_then(|s| s.ingress.as_ref())
        .map(|rules| rules.iter().map(|r| (r.from.as_ref(), r.ports.as_ref())).collect())
        .unwrap_or_default();
    let egress_rules: Vec<RawRule<'_>> = spec
        .and_then(|s| s.egress.as_ref())
        .map(|rules| rules.iter().map(|r| (r.to.as_ref(), r.ports.as_ref())).collect())
        .unwrap_or_default();

    PolicyAnalysis {
        name: describe::name(&np.metadata).to_string(),
        selector: spec.map(|s| s.pod_selector.clone()).unwrap_or_default(),
        ingress: rule_set(types.iter().any(|t| t == "Ingress"), ingress_rules, "any source"),
        egress: rule_set(types.iter().any(|t| t == "Egress"), egress_rules, "any destination"),
        types,
    }
}

fn matrix_lines(report: &mut Report, direction: &str, rules: &RuleSet) {
    match rules {
        RuleSet::Unrestricted => {}
        RuleSet::DenyAll => report.line(format!("    {}: DENY ALL", direction)),
        RuleSet::Allow(rules) => {
            for (i, rule) in rules.iter().enumerate() {
                let ports = rule.ports.as_deref().map(|p| format!(" on {}", p)).unwrap_or_default();
                report.line(format!("    {} Rule {}: ALLOW {}{}", direction, i + 1, rule.peers.join("; "), ports));
            }
        }
    }
}

pub async fn analyze_network_policies(cluster: &dyn ClusterAccess, input: &NetworkPolicyInput) -> Result<Report> {
    let ns = input.namespace.as_str();
    let policies = cluster.list_network_policies(Some(ns)).await?;
    let pods = cluster.list_pods(Some(ns), &ListQuery::default()).await?;
    let mut report = Report::new(format!("Network Policy Analysis (namespace: {})", ns));

    if policies.is_empty() {
        report.flag(
            Finding::warning("No network policies found in this namespace: all traffic is allowed by default")
                .with_subject(ResourceRef::namespace(ns))
                .with_remediation(format!("Add a default-deny NetworkPolicy to namespace '{}' and allow required flows", ns)),
        );
        report.line(format!("  {} pods are running without any network policy protection.", pods.len()));

        let mut flow = Flowchart::new(Direction::LeftRight);
        let src = flow.add_node("ANY_SRC", "Any Source", Shape::Stadium);
        let all = flow.add_styled_node("NS", &format!("All Pods in {}", ns), Shape::Rect, Style::Warning);
        let dst = flow.add_node("ANY_DST", "Any Destination", Shape::Stadium);
        flow.add_edge(&src, &all, Some("allowed"), EdgeKind::Solid);
        flow.add_edge(&all, &dst, Some("allowed"), EdgeKind::Solid);
        report.diagram(Diagram::Flowchart { heading: "NETWORK FLOW DIAGRAM".into(), chart: flow });
        return Ok(report);
    }

    let analyses: Vec<PolicyAnalysis> = policies.iter().map(analyze_policy).collect();

    report.subsection("Policy Summary");
    let rows: Vec<Vec<String>> = policies
        .iter()
        .zip(&analyses)
        .map(|(np, a)| {
            let spec = np.spec.as_ref();
            vec![
                a.name.clone(),
                selector::describe(&a.selector),
                spec.and_then(|s| s.ingress.as_ref()).map_or(0, Vec::len).to_string(),
                spec.and_then(|s| s.egress.as_ref()).map_or(0, Vec::len).to_string(),
                a.types.join(","),
            ]
        })
        .collect();
    report.table(&["POLICY", "POD SELECTOR", "INGRESS RULES", "EGRESS RULES", "TYPES"], &rows);

    let active: Vec<_> = pods.iter().filter(|p| health::is_pod_active(p)).collect();
    let mut covered = 0;
    let mut uncovered = Vec::new();
    for pod in &active {
        let matching: Vec<&str> = analyses
            .iter()
            .filter(|a| matches_label_selector(&a.selector, pod.metadata.labels.as_ref()))
            .map(|a| a.name.as_str())
            .collect();
        if matching.is_empty() {
            uncovered.push(describe::name(&pod.metadata));
        } else {
            covered += 1;
        }
    }

    report.subsection("Pod Coverage");
    report.kv("Active Pods", active.len().to_string());
    report.kv("Covered by Policy", covered.to_string());
    report.kv("No Policy Match", uncovered.len().to_string());

    report.subsection("Allow/Deny Matrix");
    for a in &analyses {
        report.line(format!("\n  Policy: {}", a.name));
        report.line(format!("    Selects: {}", selector::describe(&a.selector)));
        matrix_lines(&mut report, "Ingress", &a.ingress);
        matrix_lines(&mut report, "Egress", &a.egress);
    }

    if !uncovered.is_empty() {
        report.add(
            Finding::warning(format!(
                "{} pods have no matching network policy: all traffic allowed by default",
                uncovered.len()
            ))
            .with_subject(ResourceRef::namespace(ns)),
        );
        report.line(format!("\n  Uncovered pods: {}", uncovered.join(", ")));
    }
    for a in &analyses {
        let subject = ResourceRef::new("NetworkPolicy", Some(ns), &a.name);
        if a.ingress == RuleSet::DenyAll {
            report.add(
                Finding::critical(format!(
                    "Policy '{}' has Ingress type but no ingress rules: all inbound traffic DENIED to matched pods",
                    a.name
                ))
                .with_subject(subject.clone()),
            );
        }
        if a.egress == RuleSet::DenyAll {
            report.add(
                Finding::critical(format!(
                    "Policy '{}' has Egress type but no egress rules: all outbound traffic DENIED from matched pods (including DNS)",
                    a.name
                ))
                .with_subject(subject.clone())
                .with_remediation(format!("Allow DNS egress (UDP/TCP 53) in policy '{}' if pods need name resolution", a.name)),
            );
        }
        if a.selects_all() {
            report.add(Finding::info(format!("Policy '{}' selects ALL pods in namespace", a.name)).with_subject(subject));
        }
    }

    report.diagram(Diagram::Flowchart { heading: "NETWORK FLOW DIAGRAM".into(), chart: flow_diagram(&analyses) });
    Ok(report)
}

fn flow_diagram(analyses: &[PolicyAnalysis]) -> Flowchart {
    let mut flow = Flowchart::new(Direction::LeftRight);

    flow.begin_subgraph("allowed_traffic", "Allowed Traffic");
    for a in analyses {
        let target = flow.add_node(
            &format!("target/{}", a.name),
            &format!("Pods: {}", selector::describe(&a.selector)),
            Shape::Rect,
        );
        if let RuleSet::Allow(rules) = &a.ingress {
            for (i, rule) in rules.iter().enumerate() {
                for (j, peer) in rule.peers.iter().enumerate() {
                    let src = flow.add_node(&format!("src/{}/{}/{}", a.name, i, j), peer, Shape::Stadium);
                    flow.add_edge(&src, &target, rule.ports.as_deref(), EdgeKind::Solid);
                }
            }
        }
        if let RuleSet::Allow(rules) = &a.egress {
            for (i, rule) in rules.iter().enumerate() {
                for (j, peer) in rule.peers.iter().enumerate() {
                    let dst = flow.add_node(&format!("dst/{}/{}/{}", a.name, i, j), peer, Shape::Stadium);
                    flow.add_edge(&target, &dst, rule.ports.as_deref(), EdgeKind::Solid);
                }
            }
        }
    }
    flow.end_subgraph();

    let denied: Vec<&PolicyAnalysis> = analyses
        .iter()
        .filter(|a| a.ingress == RuleSet::DenyAll || a.egress == RuleSet::DenyAll)
        .collect();
    if !denied.is_empty() {
        flow.begin_subgraph("denied_traffic", "Denied by Policy");
        for a in denied {
            let target = flow.add_styled_node(
                &format!("deny_target/{}", a.name),
                &format!("Pods: {}", selector::describe(&a.selector)),
                Shape::Rect,
                Style::Critical,
            );
            if a.ingress == RuleSet::DenyAll {
                let src = flow.add_node(&format!("deny_src/{}", a.name), "All Inbound", Shape::Stadium);
                flow.add_edge(&src, &target, Some("denied"), EdgeKind::Dotted);
            }
            if a.egress == RuleSet::DenyAll {
                let dst = flow.add_node(&format!("deny_dst/{}", a.name), "All Outbound", Shape::Stadium);
                flow.add_edge(&target, &dst, Some("denied"), EdgeKind::Dotted);
            }
        }
        flow.end_subgraph();
    }
    flow
}
