//! Single-service deep dive
//!
//! Every section after the service lookup is best-effort: a failed sub-lookup
//! leaves a note in its section and the run continues.

use super::describe::{self, format_service_ports};
use super::health;
use super::quantity::container_resources;
use super::selector::{matches_map, to_query};
use super::topology;
use super::types::{Finding, ResourceRef};
use super::{soft, Report};
use crate::client::ClusterAccess;
use crate::error::{KdError, Result};
use crate::mermaid::{Diagram, Direction, EdgeKind, Flowchart, Shape, Style};
use crate::output::{format_age, format_bytes, format_labels, truncate_name};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceInput {
    pub namespace: String,
    #[serde(alias = "service_name")]
    pub service: String,
}

/// Events shown in the recent-events section
const MAX_EVENTS_SHOWN: usize = 10;

pub async fn diagnose_service(cluster: &dyn ClusterAccess, input: &ServiceInput) -> Result<Report> {
    let ns = input.namespace.as_str();
    let name = input.service.as_str();
    let svc = cluster
        .get_service(ns, name)
        .await?
        .ok_or_else(|| KdError::not_found("Service", format!("{}/{}", ns, name)))?;

    let subject = ResourceRef::service(ns, name);
    let mut report = Report::new(format!("Service Diagnosis: {} (namespace: {})", name, ns));

    report.subsection("Service Configuration");
    report.kv("Type", describe::service_type(&svc));
    report.kv("ClusterIP", describe::cluster_ip(&svc));
    report.kv("Ports", format_service_ports(&svc));
    report.kv("Selector", format_labels(describe::service_selector(&svc)));
    report.kv(
        "Session Affinity",
        svc.spec.as_ref().and_then(|s| s.session_affinity.as_deref()).unwrap_or("None"),
    );
    report.kv("Age", format_age(svc.metadata.creation_timestamp.as_ref()));

    report.subsection("Endpoint Health");
    let endpoints = match soft(topology::get_service_endpoint_health(cluster, ns, name).await)? {
        Ok(ep) => {
            report.line(format!(
                "  Total: {}, Ready: {}, NotReady: {}",
                ep.total_endpoints, ep.ready_count, ep.not_ready_count
            ));
            if ep.total_endpoints == 0 {
                report.flag(
                    Finding::critical("Service has 0 endpoints: no pods match the selector")
                        .with_subject(subject.clone())
                        .with_remediation(format!("Check that pods matching selector of '{}' exist and are running", name)),
                );
            } else if ep.ready_count == 0 {
                report.flag(
                    Finding::critical(format!("0 ready, {} not ready endpoint(s)", ep.not_ready_count))
                        .with_subject(subject.clone()),
                );
            } else if ep.not_ready_count > 0 {
                report.flag(
                    Finding::warning(format!("{} endpoint(s) not ready", ep.not_ready_count)).with_subject(subject.clone()),
                );
            } else {
                report.ok("All endpoints ready");
            }
            Some(ep)
        }
        Err(e) => {
            report.flag(Finding::critical(format!("Could not get endpoints: {}", e)).with_subject(subject.clone()));
            None
        }
    };

    let selector = describe::service_selector(&svc);
    report.subsection("Backing Pods");
    let pods = if selector.is_none() {
        report.line("  N/A: no selector");
        Vec::new()
    } else {
        match soft(topology::get_pods_for_service(cluster, &svc).await)? {
            Ok(pods) => pods,
            Err(e) => {
                report.note(format!("could not list backing pods: {}", e));
                Vec::new()
            }
        }
    };
    if selector.is_some() {
        if pods.is_empty() {
            report.line("  No pods match the selector");
        } else {
            let rows: Vec<Vec<String>> = pods
                .iter()
                .map(|p| {
                    let (ready, total, restarts) = health::pod_container_summary(p);
                    vec![
                        describe::name(&p.metadata).to_string(),
                        health::pod_phase_reason(p),
                        format!("{}/{}", ready, total),
                        restarts.to_string(),
                        health::pod_node(p).to_string(),
                        format_age(p.metadata.creation_timestamp.as_ref()),
                    ]
                })
                .collect();
            report.table(&["POD", "STATUS", "READY", "RESTARTS", "NODE", "AGE"], &rows);

            let unhealthy: Vec<_> = pods.iter().filter(|p| !health::is_pod_healthy(p)).collect();
            for p in &unhealthy {
                let pod_name = describe::name(&p.metadata);
                report.add(
                    Finding::critical(format!("Pod '{}' is unhealthy: {}", pod_name, health::pod_phase_reason(p)))
                        .with_subject(ResourceRef::pod(ns, pod_name))
                        .with_remediation(format!("Diagnose pod '{}' with diagnose_pod tool", pod_name)),
                );
            }
            if !unhealthy.is_empty() {
                report.line(format!("  {}/{} pods are unhealthy", unhealthy.len(), pods.len()));
            }
            for p in &pods {
                let restarts = health::pod_restarts(p);
                if health::has_high_restarts(restarts) {
                    let pod_name = describe::name(&p.metadata);
                    report.flag(
                        Finding::warning(format!("Pod '{}' has {} restarts", pod_name, restarts))
                            .with_subject(ResourceRef::pod(ns, pod_name)),
                    );
                }
            }
        }
    }

    report.subsection("Resource Usage");
    if selector.is_none() {
        report.line("  N/A: no selector");
    } else {
        let query = selector.map(to_query);
        let metrics = topology::fetch_pod_metrics(cluster, Some(ns), query.as_deref()).await?;
        match metrics.available() {
            None => report.line("  (metrics-server not available)"),
            Some(usage) => {
                for p in &pods {
                    let pod_name = describe::name(&p.metadata);
                    let Some(pu) = usage.get(&format!("{}/{}", ns, pod_name)) else { continue };
                    for c in p.spec.as_ref().map(|s| s.containers.as_slice()).unwrap_or(&[]) {
                        let Some(cu) = pu.container(&c.name) else { continue };
                        let limits = container_resources(c).limits;
                        let cpu_limit = if limits.cpu_millis > 0 { format!("{}m", limits.cpu_millis) } else { "no limit".into() };
                        let mem_limit = if limits.memory_bytes > 0 { format_bytes(limits.memory_bytes) } else { "no limit".into() };
                        report.line(format!(
                            "  {}/{}: CPU {}m/{}  Mem {}/{}",
                            pod_name,
                            c.name,
                            cu.usage.cpu_millis,
                            cpu_limit,
                            format_bytes(cu.usage.memory_bytes),
                            mem_limit
                        ));
                    }
                }
            }
        }
    }

    report.subsection("Ingress Exposure");
    let mut routes = Vec::new();
    match soft(cluster.list_ingresses(Some(ns)).await)? {
        Ok(ingresses) => {
            routes = topology::ingress_routes_to(&ingresses, ns, name);
            if routes.is_empty() {
                report.line("  Not exposed via any Ingress");
            }
            for (ing, host, path) in &routes {
                report.line(format!("  Ingress '{}': {}{}", ing, host, path));
            }
        }
        Err(e) => report.note(format!("could not list ingresses: {}", e)),
    }

    report.subsection("Network Policies");
    match soft(cluster.list_network_policies(Some(ns)).await)? {
        Ok(policies) if policies.is_empty() => report.line("  No network policies in namespace (all traffic allowed)"),
        Ok(policies) => {
            let empty = Default::default();
            let svc_labels = selector.unwrap_or(&empty);
            let mut applied = 0;
            for np in &policies {
                let match_labels = np
                    .spec
                    .as_ref()
                    .and_then(|s| s.pod_selector.match_labels.as_ref())
                    .cloned()
                    .unwrap_or_default();
                if matches_map(&match_labels, Some(svc_labels)) {
                    report.line(format!("  Policy '{}' applies to this service's pods", describe::name(&np.metadata)));
                    applied += 1;
                }
            }
            if applied == 0 {
                report.line("  No network policies target this service's pods (all traffic allowed)");
            }
        }
        Err(e) => report.note(format!("could not list network policies: {}", e)),
    }

    match soft(topology::events_for(cluster, ns, name).await)? {
        Ok(events) if !events.is_empty() => {
            report.subsection("Recent Events");
            for e in events.iter().take(MAX_EVENTS_SHOWN) {
                let marker = if topology::is_warning_event(e) { "[WARNING] " } else { "" };
                let count = e.count.filter(|c| *c > 1).map(|c| format!(" (x{})", c)).unwrap_or_default();
                report.line(format!(
                    "  {}{}: {}{}",
                    marker,
                    e.reason.as_deref().unwrap_or(""),
                    e.message.as_deref().unwrap_or(""),
                    count
                ));
            }
        }
        Ok(_) => {}
        Err(e) => report.note(format!("could not fetch events: {}", e)),
    }

    report.subsection("Assessment");
    if report.summary().issue_count() == 0 {
        report.line("  Service appears healthy. All endpoints ready, pods running.");
    } else {
        report.line(format!("  {} finding(s) identified. Review details above.", report.summary().issue_count()));
    }

    let svc_style = match &endpoints {
        Some(ep) => ep.verdict().style(),
        None => Style::Critical,
    };
    let mut flow = Flowchart::new(Direction::LeftRight);
    let svc_id = flow.add_styled_node(
        &format!("svc/{}", name),
        &format!("Service: {}<br/>{}", name, format_service_ports(&svc)),
        Shape::Rect,
        svc_style,
    );
    for (ing, host, path) in &routes {
        let ing_id = flow.add_styled_node(
            &format!("ing/{}", ing),
            &format!("Ingress: {}<br/>{}{}", ing, host, path),
            Shape::TrapAlt,
            Style::External,
        );
        flow.add_edge(&ing_id, &svc_id, None, EdgeKind::Solid);
    }
    for p in &pods {
        let pod_name = describe::name(&p.metadata);
        let pod_id = flow.add_styled_node(
            &format!("pod/{}", pod_name),
            &truncate_name(pod_name, 28),
            Shape::Round,
            health::pod_verdict(p).style(),
        );
        flow.link(&svc_id, &pod_id);
    }
    report.diagram(Diagram::Flowchart { heading: "SERVICE CONTEXT".into(), chart: flow });
    Ok(report)
}
