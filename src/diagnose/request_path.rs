//! Request-path trace: Ingress → Service → Endpoints/Pods → resource usage
//!
//! The trace stops early only when no ingress routes the request, when the
//! matched path has no backend service, or when that service is missing.
//! Every other problem becomes a finding and the walk continues.

use super::describe::{self, backend_port, format_service_ports, path_type, path_value};
use super::health::{self, UsageLevel};
use super::namespace;
use super::quantity::container_resources;
use super::topology::{self, IngressMatch};
use super::types::{EndpointHealth, Finding, Metrics, ResourceRef, Severity};
use super::{soft, Report};
use crate::client::ClusterAccess;
use crate::error::Result;
use crate::mermaid::{Arrow, Diagram, Direction, EdgeKind, Flowchart, SequenceDiagram, Shape, Style};
use crate::output::{format_age, format_bytes, format_labels, percent, truncate_name};
use k8s_openapi::api::core::v1::{Pod, Service};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestPathInput {
    pub hostname: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
}

/// Worst severity among findings added since `start`
fn worst_since(report: &Report, start: usize) -> Option<Severity> {
    report.findings[start..].iter().map(|f| f.severity).min()
}

fn stage_style(worst: Option<Severity>) -> Style {
    match worst {
        Some(Severity::Critical) => Style::Critical,
        Some(Severity::Warning) => Style::Warning,
        _ => Style::Healthy,
    }
}

pub async fn diagnose_request_path(cluster: &dyn ClusterAccess, input: &RequestPathInput) -> Result<Report> {
    let host = input.hostname.trim();
    let path = input.path.as_deref().filter(|p| !p.is_empty()).unwrap_or("/");
    let scope = namespace::normalize(input.namespace.as_deref());
    let mut report = Report::new(format!("Request Path: https://{}{}", host, path));

    // [1] INGRESS
    let Some(matched) = topology::find_ingress_for_host_path(cluster, scope, host, path).await? else {
        report.line(format!(
            "Searched {} namespace(s) for an Ingress rule matching host+path.",
            namespace::display(scope)
        ));
        report.add(
            Finding::critical(format!("No Ingress found for {}{}", host, path))
                .with_remediation(format!("Create an Ingress resource with host: {} and path: {}", host, path)),
        );
        report.action("Use analyze_all_ingresses to review existing Ingress resources");
        return Ok(report);
    };
    debug!(ingress = matched.name(), "matched ingress");

    let ing_ns = matched.namespace().to_string();
    let ingress_start = report.findings.len();
    let has_tls = trace_ingress(cluster, &mut report, &matched).await?;
    let ingress_style = stage_style(worst_since(&report, ingress_start));

    let mut flow = Flowchart::new(Direction::TopBottom);
    let internet = flow.add_styled_node("internet", "Internet", Shape::Circle, Style::External);
    let ing_id = flow.add_styled_node(
        &format!("ing/{}", matched.name()),
        &format!("Ingress: {}<br/>{}{}", matched.name(), matched.host, path_value(&matched.path)),
        Shape::TrapAlt,
        ingress_style,
    );
    flow.add_edge(&internet, &ing_id, Some(if has_tls { "HTTPS" } else { "HTTP" }), EdgeKind::Solid);

    // [2] SERVICE
    report.subsection("[2] SERVICE");
    let Some(svc_name) = matched.backend_service().map(str::to_string) else {
        report.flag(Finding::critical("No backend service configured in Ingress path").with_subject(ResourceRef::ingress(&ing_ns, matched.name())));
        report.diagram(Diagram::Flowchart { heading: "TOPOLOGY".into(), chart: flow });
        return Ok(report);
    };
    let svc_port = backend_port(Some(&matched.path.backend));

    let svc = match soft(cluster.get_service(&ing_ns, &svc_name).await)? {
        Ok(Some(svc)) => svc,
        Ok(None) => {
            report.flag(
                Finding::critical(format!("Backend service '{}' not found in namespace '{}'", svc_name, ing_ns))
                    .with_subject(ResourceRef::service(&ing_ns, &svc_name))
                    .with_remediation(format!("Create service '{}' in namespace '{}'", svc_name, ing_ns)),
            );
            let missing = flow.add_styled_node(&format!("svc/{}", svc_name), &format!("Service: {}<br/>(missing)", svc_name), Shape::Rect, Style::Critical);
            flow.add_edge(&ing_id, &missing, Some(svc_port.as_str()), EdgeKind::Solid);
            report.diagram(Diagram::Flowchart { heading: "TOPOLOGY".into(), chart: flow });
            return Ok(report);
        }
        Err(e) => {
            report.flag(
                Finding::critical(format!("Could not fetch backend service '{}': {}", svc_name, e))
                    .with_subject(ResourceRef::service(&ing_ns, &svc_name)),
            );
            report.diagram(Diagram::Flowchart { heading: "TOPOLOGY".into(), chart: flow });
            return Ok(report);
        }
    };
    trace_service(cluster, &mut report, &svc, &svc_port).await?;

    // [3] ENDPOINTS / PODS
    report.subsection("[3] ENDPOINTS");
    let endpoints = match soft(topology::get_service_endpoint_health(cluster, &ing_ns, &svc_name).await)? {
        Ok(h) => Some(h),
        Err(e) => {
            report.flag(Finding::critical(format!("Could not get endpoints: {}", e)).with_subject(ResourceRef::service(&ing_ns, &svc_name)));
            None
        }
    };
    if let Some(ep) = &endpoints {
        check_endpoints(&mut report, &svc, ep);
    }

    let pods = match soft(topology::get_pods_for_service(cluster, &svc).await)? {
        Ok(p) => p,
        Err(e) => {
            report.note(format!("could not list backing pods: {}", e));
            Vec::new()
        }
    };
    check_pods(&mut report, &pods);

    let svc_style = match &endpoints {
        Some(ep) => ep.verdict().style(),
        None => Style::Critical,
    };
    let svc_id = flow.add_styled_node(
        &format!("svc/{}", svc_name),
        &format!("Service: {}<br/>port {}", svc_name, svc_port),
        Shape::Rect,
        svc_style,
    );
    flow.add_edge(&ing_id, &svc_id, Some(svc_port.as_str()), EdgeKind::Solid);

    // [4] RESOURCE USAGE
    report.subsection("[4] RESOURCE USAGE");
    let selector = describe::service_selector(&svc).map(super::selector::to_query);
    let metrics = topology::fetch_pod_metrics(cluster, Some(&ing_ns), selector.as_deref()).await?;
    let pressured = check_usage(&mut report, &pods, &metrics);

    if pods.is_empty() {
        let none = flow.add_styled_node(&format!("pods/{}", svc_name), "No backing pods", Shape::Round, Style::Critical);
        flow.link(&svc_id, &none);
    }
    for pod in &pods {
        let name = describe::name(&pod.metadata);
        let mut style = health::pod_verdict(pod).style();
        if let Some(level) = pressured.iter().find(|(p, _)| p == name).map(|(_, l)| *l) {
            style = match (style, level) {
                (Style::Critical, _) | (_, UsageLevel::Critical) => Style::Critical,
                _ => Style::Warning,
            };
        }
        let pod_id = flow.add_styled_node(&format!("pod/{}", name), &truncate_name(name, 30), Shape::Round, style);
        flow.link(&svc_id, &pod_id);
    }
    report.diagram(Diagram::Flowchart { heading: "TOPOLOGY".into(), chart: flow });

    if let Some(first) = pods.first() {
        report.diagram(Diagram::Sequence {
            heading: "REQUEST FLOW".into(),
            chart: request_sequence(&matched, &svc_name, &svc_port, first, path, has_tls, endpoints.as_ref()),
        });
    }
    Ok(report)
}

/// Returns whether TLS covers the host
async fn trace_ingress(cluster: &dyn ClusterAccess, report: &mut Report, matched: &IngressMatch) -> Result<bool> {
    let ing = &matched.ingress;
    let ns = matched.namespace().to_string();
    report.subsection("[1] INGRESS");
    report.kv("Name", format!("{}/{}", ns, matched.name()));
    report.kv("Host", &matched.host);
    report.kv("Path", path_value(&matched.path));
    report.kv("Path Type", path_type(&matched.path));
    report.kv("Ingress Class", describe::ingress_class(ing));

    let agic = describe::agic_annotations(ing);
    if !agic.is_empty() {
        report.line("  AGIC Annotations:");
        for (k, v) in &agic {
            report.line(format!("    {}: {}", k, v));
        }
    }

    let tls_secret = ing.spec.as_ref().and_then(|s| s.tls.as_ref()).and_then(|tls| {
        tls.iter()
            .find(|t| t.hosts.as_ref().map_or(false, |h| h.iter().any(|h| *h == matched.host)))
            .map(|t| t.secret_name.clone().unwrap_or_else(|| "<default certificate>".to_string()))
    });
    let has_tls = tls_secret.is_some();
    match tls_secret {
        Some(secret) => report.kv("TLS", secret),
        None => report.flag(
            Finding::warning("No TLS configured for this host")
                .with_subject(ResourceRef::ingress(&ns, matched.name()))
                .with_remediation(format!("Configure TLS for {}", matched.host)),
        ),
    }

    match soft(topology::events_for(cluster, &ns, matched.name()).await)? {
        Ok(events) => {
            let warnings: Vec<_> = events.iter().filter(|e| topology::is_warning_event(e)).collect();
            if !warnings.is_empty() {
                report.flag(
                    Finding::warning(format!("{} warning events on Ingress", warnings.len()))
                        .with_subject(ResourceRef::ingress(&ns, matched.name())),
                );
                for e in warnings {
                    report.line(format!(
                        "    - {}: {}",
                        e.reason.as_deref().unwrap_or(""),
                        e.message.as_deref().unwrap_or("")
                    ));
                }
            }
        }
        Err(e) => report.note(format!("could not fetch ingress events: {}", e)),
    }
    Ok(has_tls)
}

async fn trace_service(cluster: &dyn ClusterAccess, report: &mut Report, svc: &Service, port: &str) -> Result<()> {
    let name = describe::name(&svc.metadata);
    let ns = describe::namespace(&svc.metadata);
    report.kv("Name", name);
    report.kv("Type", describe::service_type(svc));
    report.kv("ClusterIP", describe::cluster_ip(svc));
    report.kv("Port", format!("{} → {}", port, format_service_ports(svc)));
    report.kv("Selector", format_labels(describe::service_selector(svc)));

    match soft(topology::events_for(cluster, ns, name).await)? {
        Ok(events) => {
            let warnings = events.iter().filter(|e| topology::is_warning_event(e)).count();
            if warnings > 0 {
                report.flag(
                    Finding::warning(format!("{} warning events on Service", warnings))
                        .with_subject(ResourceRef::service(ns, name)),
                );
            }
        }
        Err(e) => report.note(format!("could not fetch service events: {}", e)),
    }
    Ok(())
}

fn check_endpoints(report: &mut Report, svc: &Service, ep: &EndpointHealth) {
    let name = describe::name(&svc.metadata);
    let ns = describe::namespace(&svc.metadata);
    let subject = ResourceRef::service(ns, name);
    report.kv("Ready", format!("{}/{}", ep.ready_count, ep.total_endpoints));

    if ep.total_endpoints == 0 {
        report.flag(
            Finding::critical("Service has 0 endpoints: no pods match the selector")
                .with_subject(subject)
                .with_remediation(format!(
                    "Check that pods with labels {} exist in namespace {}",
                    format_labels(describe::service_selector(svc)),
                    ns
                )),
        );
    } else if ep.ready_count == 0 {
        report.flag(
            Finding::critical(format!(
                "Service has 0 ready, {} not ready endpoint(s): no backend can serve traffic",
                ep.not_ready_count
            ))
            .with_subject(subject)
            .with_remediation(format!("Check readiness of pods behind service '{}'", name)),
        );
    } else if ep.not_ready_count > 0 {
        report.flag(
            Finding::warning(format!(
                "{} ready, {} not ready endpoint(s)",
                ep.ready_count, ep.not_ready_count
            ))
            .with_subject(subject),
        );
    }
    for addr in &ep.not_ready_addresses {
        report.line(format!(
            "    - not ready: {} ({})",
            addr.pod_name.as_deref().unwrap_or("<no pod>"),
            addr.ip
        ));
    }
}

fn check_pods(report: &mut Report, pods: &[Pod]) {
    if pods.is_empty() {
        report.line("  PODS: none");
        return;
    }
    report.line("  PODS:");
    let rows: Vec<Vec<String>> = pods
        .iter()
        .map(|p| {
            let (ready, total, restarts) = health::pod_container_summary(p);
            vec![
                describe::name(&p.metadata).to_string(),
                health::pod_node(p).to_string(),
                format!("{}/{}", ready, total),
                restarts.to_string(),
                health::pod_phase_reason(p),
                format_age(p.metadata.creation_timestamp.as_ref()),
            ]
        })
        .collect();
    report.table(&["POD", "NODE", "READY", "RESTARTS", "STATUS", "AGE"], &rows);

    for pod in pods {
        let name = describe::name(&pod.metadata);
        let ns = describe::namespace(&pod.metadata);
        let subject = ResourceRef::pod(ns, name);

        if !health::is_pod_healthy(pod) {
            report.flag(
                Finding::critical(format!("Pod '{}' is unhealthy: {}", name, health::pod_phase_reason(pod)))
                    .with_subject(subject.clone())
                    .with_remediation(format!("Diagnose pod '{}' with diagnose_pod tool", name)),
            );
        }
        let restarts = health::pod_restarts(pod);
        if health::has_high_restarts(restarts) {
            report.flag(Finding::warning(format!("Pod '{}' has {} restarts", name, restarts)).with_subject(subject.clone()));
        }

        let containers = pod.spec.as_ref().map(|s| s.containers.as_slice()).unwrap_or(&[]);
        for c in containers {
            if container_resources(c).limits.is_zero() {
                report.flag(
                    Finding::info(format!("Pod '{}' container '{}' has no resource limits", name, c.name))
                        .with_subject(subject.clone()),
                );
            }
            if !health::has_readiness_probe(c) {
                report.flag(
                    Finding::warning(format!("Pod '{}' container '{}' has no readiness probe", name, c.name))
                        .with_subject(subject.clone())
                        .with_remediation(format!("Add readiness probe to container '{}'", c.name)),
                );
            }
            if !health::has_liveness_probe(c) {
                report.flag(
                    Finding::info(format!("Pod '{}' container '{}' has no liveness probe", name, c.name))
                        .with_subject(subject.clone()),
                );
            }
        }
    }
}

/// Per-container usage against limits; returns pods whose usage crossed a threshold
fn check_usage(
    report: &mut Report,
    pods: &[Pod],
    metrics: &Metrics<std::collections::BTreeMap<String, crate::client::PodUsage>>,
) -> Vec<(String, UsageLevel)> {
    let mut pressured = Vec::new();
    let Some(usage) = metrics.available() else {
        report.line("  (metrics-server not available)");
        return pressured;
    };

    for pod in pods {
        let name = describe::name(&pod.metadata);
        let ns = describe::namespace(&pod.metadata);
        let Some(pod_usage) = usage.get(&format!("{}/{}", ns, name)) else {
            report.line(format!("  {}: no metrics reported", name));
            continue;
        };
        let containers = pod.spec.as_ref().map(|s| s.containers.as_slice()).unwrap_or(&[]);
        for c in containers {
            let Some(cu) = pod_usage.container(&c.name) else { continue };
            let limits = container_resources(c).limits;
            let subject = ResourceRef::pod(ns, name);

            let cpu_pct = (limits.cpu_millis > 0).then(|| percent(cu.usage.cpu_millis, limits.cpu_millis));
            let mem_pct = (limits.memory_bytes > 0).then(|| percent(cu.usage.memory_bytes, limits.memory_bytes));

            if let Some(pct) = cpu_pct {
                match health::usage_level(pct) {
                    UsageLevel::Critical => {
                        report.flag(Finding::critical(format!("{}/{}: CPU at {:.0}% of limit", name, c.name, pct)).with_subject(subject.clone()));
                        pressured.push((name.to_string(), UsageLevel::Critical));
                    }
                    UsageLevel::Warning => {
                        report.flag(Finding::warning(format!("{}/{}: CPU at {:.0}% of limit", name, c.name, pct)).with_subject(subject.clone()));
                        pressured.push((name.to_string(), UsageLevel::Warning));
                    }
                    UsageLevel::Normal => {}
                }
            }
            if let Some(pct) = mem_pct {
                match health::usage_level(pct) {
                    UsageLevel::Critical => {
                        report.flag(
                            Finding::critical(format!("{}/{}: Memory at {:.0}% of limit, OOM risk", name, c.name, pct))
                                .with_subject(subject.clone())
                                .with_remediation(format!("Increase memory limit for {}/{}", name, c.name)),
                        );
                        pressured.push((name.to_string(), UsageLevel::Critical));
                    }
                    UsageLevel::Warning => {
                        report.flag(Finding::warning(format!("{}/{}: Memory at {:.0}% of limit", name, c.name, pct)).with_subject(subject.clone()));
                        pressured.push((name.to_string(), UsageLevel::Warning));
                    }
                    UsageLevel::Normal => {}
                }
            }

            let fmt_pct = |p: Option<f64>| p.map(|v| format!("{:.0}%", v)).unwrap_or_else(|| "N/A".to_string());
            let cpu_limit = if limits.cpu_millis > 0 { format!("{}m", limits.cpu_millis) } else { "no limit".to_string() };
            let mem_limit = if limits.memory_bytes > 0 { format_bytes(limits.memory_bytes) } else { "no limit".to_string() };
            report.line(format!(
                "  {}/{}: CPU {}m/{} ({})  Mem {}/{} ({})",
                name,
                c.name,
                cu.usage.cpu_millis,
                cpu_limit,
                fmt_pct(cpu_pct),
                format_bytes(cu.usage.memory_bytes),
                mem_limit,
                fmt_pct(mem_pct)
            ));
        }
    }
    pressured
}

fn request_sequence(
    matched: &IngressMatch,
    svc_name: &str,
    svc_port: &str,
    first_pod: &Pod,
    path: &str,
    has_tls: bool,
    endpoints: Option<&EndpointHealth>,
) -> SequenceDiagram {
    let mut seq = SequenceDiagram::new();
    let client = seq.participant("client", "Client");
    let ing = seq.participant("ing", &format!("Ingress {}", matched.name()));
    let svc = seq.participant("svc", &format!("Service {}", svc_name));
    let pod = seq.participant("pod", &format!("Pod {}", truncate_name(describe::name(&first_pod.metadata), 25)));

    let scheme = if has_tls { "HTTPS" } else { "HTTP" };
    seq.message(&client, &ing, &format!("{} GET {}", scheme, path), Arrow::Solid);

    let mut notes = vec!["Route matching".to_string()];
    if has_tls {
        notes.push("TLS termination".to_string());
    }
    for (k, v) in describe::agic_annotations(&matched.ingress) {
        match k.as_str() {
            "request-timeout" => notes.push(format!("Timeout: {}s", v)),
            "backend-protocol" => notes.push(format!("Backend: {}", v)),
            _ => {}
        }
    }
    seq.note_over(&[&ing], &notes.join("<br/>"));

    seq.message(&ing, &svc, &format!("Forward to {}", svc_port), Arrow::Solid);
    let (ready, total) = endpoints.map(|e| (e.ready_count, e.total_endpoints)).unwrap_or((0, 0));
    seq.note_over(&[&svc], &format!("{}/{} endpoints ready", ready, total));
    seq.message(&svc, &pod, "Forward to pod", Arrow::Solid);
    seq.message(&pod, &svc, "Response", Arrow::Dotted);
    seq.message(&svc, &ing, "Response", Arrow::Dotted);
    seq.message(&ing, &client, "Response", Arrow::Dotted);
    seq
}
