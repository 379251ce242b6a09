//! Cluster-wide health overview
//!
//! Only the node list is required. Each later section degrades to a note when
//! its lookup fails so a missing metrics-server or controller never aborts the
//! overview.

use super::describe;
use super::health::{self, NODE_UTILIZATION_WARN_PERCENT};
use super::quantity::{node_quantities, CpuMem};
use super::topology;
use super::types::{Finding, ResourceRef};
use super::{soft, Report};
use crate::client::{event_timestamp, ClusterAccess, ListQuery};
use crate::error::Result;
use crate::mermaid::{Diagram, Direction, EdgeKind, Flowchart, Shape, Style};
use crate::output::{format_bytes, percent};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterInput {}

/// Ingresses drawn in the topology diagram
const MAX_DIAGRAM_INGRESSES: usize = 5;

#[derive(Default)]
struct NamespaceTally {
    total: usize,
    unhealthy: usize,
    high_restarts: usize,
}

pub async fn cluster_health_overview(cluster: &dyn ClusterAccess, _input: &ClusterInput) -> Result<Report> {
    let nodes = cluster.list_nodes().await?;
    let mut report = Report::new("Cluster Health Overview");

    report.subsection("Nodes");
    let mut ready = 0;
    for node in &nodes {
        let name = describe::name(&node.metadata);
        let status = health::node_status(node);
        if status == "Ready" {
            ready += 1;
        } else {
            report.flag(
                Finding::critical(format!("Node '{}' is {}", name, status))
                    .with_subject(ResourceRef::node(name))
                    .with_remediation(format!("Inspect kubelet and conditions on node '{}'", name)),
            );
        }
        for pressure in health::node_pressures(node) {
            report.flag(Finding::warning(format!("Node '{}' has {}", name, pressure)).with_subject(ResourceRef::node(name)));
        }
    }
    report.line(format!("  {}/{} nodes ready", ready, nodes.len()));

    report.subsection("Resource Utilization");
    match topology::fetch_node_metrics(cluster).await?.available() {
        Some(usage) if !usage.is_empty() => {
            let mut capacity = CpuMem::default();
            for node in &nodes {
                capacity.add(node_quantities(node.status.as_ref().and_then(|s| s.capacity.as_ref())).0);
            }
            let mut used = CpuMem::default();
            for u in usage.values() {
                used.add(u.usage);
            }
            let cpu_pct = percent(used.cpu_millis, capacity.cpu_millis);
            let mem_pct = percent(used.memory_bytes, capacity.memory_bytes);
            report.line(format!("  CPU:    {}m / {}m ({:.1}%)", used.cpu_millis, capacity.cpu_millis, cpu_pct));
            report.line(format!(
                "  Memory: {} / {} ({:.1}%)",
                format_bytes(used.memory_bytes),
                format_bytes(capacity.memory_bytes),
                mem_pct
            ));
            if cpu_pct > NODE_UTILIZATION_WARN_PERCENT {
                report.flag(Finding::warning(format!("Cluster CPU utilization above {:.0}%", NODE_UTILIZATION_WARN_PERCENT)));
            }
            if mem_pct > NODE_UTILIZATION_WARN_PERCENT {
                report.flag(Finding::warning(format!("Cluster memory utilization above {:.0}%", NODE_UTILIZATION_WARN_PERCENT)));
            }
        }
        _ => report.line("  (metrics-server not available)"),
    }

    report.subsection("Pod Health by Namespace");
    match soft(cluster.list_pods(None, &ListQuery::default()).await)? {
        Ok(pods) => {
            let mut tally: BTreeMap<String, NamespaceTally> = BTreeMap::new();
            for pod in &pods {
                let entry = tally.entry(describe::namespace(&pod.metadata).to_string()).or_default();
                entry.total += 1;
                if !health::is_pod_healthy(pod) {
                    entry.unhealthy += 1;
                }
                if health::has_high_restarts(health::pod_restarts(pod)) {
                    entry.high_restarts += 1;
                }
            }
            let mut troubled: Vec<(&String, &NamespaceTally)> =
                tally.iter().filter(|(_, t)| t.unhealthy > 0 || t.high_restarts > 0).collect();
            if troubled.is_empty() {
                report.line(format!("  All {} pods healthy across {} namespaces", pods.len(), tally.len()));
            } else {
                troubled.sort_by(|a, b| b.1.unhealthy.cmp(&a.1.unhealthy));
                let rows: Vec<Vec<String>> = troubled
                    .iter()
                    .map(|(ns, t)| vec![ns.to_string(), t.total.to_string(), t.unhealthy.to_string(), t.high_restarts.to_string()])
                    .collect();
                report.table(&["NAMESPACE", "TOTAL", "UNHEALTHY", "HIGH RESTARTS"], &rows);
                let unhealthy: usize = tally.values().map(|t| t.unhealthy).sum();
                if unhealthy > 0 {
                    report.flag(
                        Finding::warning(format!("{} unhealthy pods cluster-wide", unhealthy))
                            .with_remediation("Use find_unhealthy_pods to list failing pods"),
                    );
                }
                for (ns, t) in &troubled {
                    if t.high_restarts > 0 {
                        report.add(
                            Finding::warning(format!("{} pod(s) with high restarts in namespace '{}'", t.high_restarts, ns))
                                .with_subject(ResourceRef::namespace(ns)),
                        );
                    }
                }
            }
        }
        Err(e) => {
            warn!(error = %e, "pod listing failed");
            report.note(format!("could not list pods: {}", e));
        }
    }

    report.subsection("Service Endpoint Health");
    match soft(cluster.list_services(None).await)? {
        Ok(services) => {
            let mut unhealthy = 0;
            let mut checked = 0;
            let mut skipped = 0;
            for svc in &services {
                if describe::is_external_name(svc) || describe::service_selector(svc).is_none() {
                    continue;
                }
                let ns = describe::namespace(&svc.metadata);
                let name = describe::name(&svc.metadata);
                let ep = match soft(topology::get_service_endpoint_health(cluster, ns, name).await)? {
                    Ok(ep) => ep,
                    Err(e) => {
                        report.note(format!("could not fetch endpoints for {}/{}: {}", ns, name, e));
                        skipped += 1;
                        continue;
                    }
                };
                checked += 1;
                if ep.ready_count == 0 {
                    report.flag(
                        Finding::critical(format!(
                            "{}/{}: 0/{} endpoints ready (DEAD)",
                            ns, name, ep.total_endpoints
                        ))
                        .with_subject(ResourceRef::service(ns, name)),
                    );
                    unhealthy += 1;
                } else if ep.not_ready_count > 0 {
                    report.flag(
                        Finding::warning(format!(
                            "{}/{}: {}/{} not ready (DEGRADED)",
                            ns, name, ep.not_ready_count, ep.total_endpoints
                        ))
                        .with_subject(ResourceRef::service(ns, name)),
                    );
                    unhealthy += 1;
                }
            }
            if unhealthy == 0 && skipped == 0 {
                report.line(format!("  All {} services with selectors have healthy endpoints", checked));
            } else if unhealthy == 0 {
                report.line(format!("  {} services with selectors healthy, {} not checked", checked, skipped));
            }
        }
        Err(e) => report.note(format!("could not list services: {}", e)),
    }

    report.subsection("Recent Warnings (last hour)");
    match soft(cluster.list_events(None, &ListQuery::default()).await)? {
        Ok(events) => {
            let cutoff = Utc::now() - Duration::hours(1);
            let mut reasons: BTreeMap<String, usize> = BTreeMap::new();
            for e in events.iter().filter(|e| topology::is_warning_event(e)) {
                if event_timestamp(e).map_or(false, |t| t > cutoff) {
                    *reasons.entry(e.reason.clone().unwrap_or_default()).or_default() += 1;
                }
            }
            let count: usize = reasons.values().sum();
            if count == 0 {
                report.line("  No warning events in the last hour");
            } else {
                report.flag(Finding::warning(format!("{} warning events in the last hour", count)));
                for (reason, n) in &reasons {
                    report.line(format!("    {}: {}", reason, n));
                }
            }
        }
        Err(e) => report.note(format!("could not list events: {}", e)),
    }

    report.subsection("kube-system Health");
    match soft(cluster.list_pods(Some("kube-system"), &ListQuery::default()).await)? {
        Ok(pods) => {
            let unhealthy = pods.iter().filter(|p| !health::is_pod_healthy(p)).count();
            if unhealthy > 0 {
                report.flag(
                    Finding::critical(format!("kube-system: {}/{} unhealthy", unhealthy, pods.len()))
                        .with_subject(ResourceRef::namespace("kube-system"))
                        .with_remediation("Check control-plane and system add-on pods in kube-system"),
                );
            } else {
                report.line(format!("  All {} pods healthy", pods.len()));
            }
        }
        Err(e) => report.note(format!("could not list kube-system pods: {}", e)),
    }

    report.subsection("Overall Assessment");
    let summary = report.summary();
    if summary.issue_count() == 0 {
        report.line("  Cluster is healthy. No issues found.");
    } else {
        report.line(format!("  {} issue(s) found. Review findings above.", summary.issue_count()));
    }

    let mut flow = Flowchart::new(Direction::TopBottom);
    flow.begin_subgraph("cluster", "Cluster");
    for node in &nodes {
        let name = describe::name(&node.metadata);
        let status = health::node_status(node);
        let id = flow.add_node(&format!("node/{}", name), &format!("{}<br/>{}", name, status), Shape::Rect);
        let style = if status == "Ready" && health::node_pressures(node).is_empty() {
            Style::Healthy
        } else if status == "Ready" {
            Style::Warning
        } else {
            Style::Critical
        };
        flow.set_style(&id, style);
    }
    flow.end_subgraph();

    if let Ok(ingresses) = soft(cluster.list_ingresses(None).await)? {
        if !ingresses.is_empty() {
            let internet = flow.add_styled_node("internet", "Internet", Shape::Circle, Style::External);
            for ing in ingresses.iter().take(MAX_DIAGRAM_INGRESSES) {
                let name = describe::name(&ing.metadata);
                let (hosts, _, _) = describe::ingress_details(ing);
                let host = hosts.first().map(String::as_str).unwrap_or("*");
                let id = flow.add_node(
                    &format!("ing/{}/{}", describe::namespace(&ing.metadata), name),
                    &format!("Ingress: {}<br/>{}", name, host),
                    Shape::TrapAlt,
                );
                flow.add_edge(&internet, &id, None, EdgeKind::Solid);
            }
        }
    }
    report.diagram(Diagram::Flowchart { heading: "CLUSTER TOPOLOGY".into(), chart: flow });
    Ok(report)
}
