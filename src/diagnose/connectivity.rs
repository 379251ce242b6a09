//! Service connectivity, endpoint health listing and namespace topology maps

use super::describe::{self, path_value};
use super::health;
use super::namespace;
use super::network_policy::{analyze_policy, RuleSet};
use super::selector::matches_label_selector;
use super::topology;
use super::types::{EndpointHealth, Finding, ResourceRef};
use super::{soft, Report};
use crate::client::ClusterAccess;
use crate::error::{KdError, Result};
use crate::mermaid::{Diagram, Direction, EdgeKind, Flowchart, Shape, Style};
use crate::output::{format_age, format_labels};
use k8s_openapi::api::core::v1::{ContainerPort, Pod, Service, ServicePort};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectivityInput {
    pub namespace: String,
    #[serde(alias = "service_name")]
    pub service: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointHealthInput {
    #[serde(default)]
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopologyInput {
    pub namespace: String,
}

/// Endpoint status of one service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EndpointStatus {
    External,
    NoSelector,
    Dead,
    Degraded,
    Healthy,
}

impl EndpointStatus {
    pub fn label(&self) -> &'static str {
        match self {
            EndpointStatus::External => "EXTERNAL",
            EndpointStatus::NoSelector => "NO-SELECTOR",
            EndpointStatus::Dead => "DEAD",
            EndpointStatus::Degraded => "DEGRADED",
            EndpointStatus::Healthy => "HEALTHY",
        }
    }
}

/// ExternalName first, then selector-less with no addresses, then readiness
pub fn classify_endpoints(svc: &Service, ep: &EndpointHealth) -> EndpointStatus {
    if describe::is_external_name(svc) {
        EndpointStatus::External
    } else if ep.total_endpoints == 0 && describe::service_selector(svc).is_none() {
        EndpointStatus::NoSelector
    } else if ep.ready_count == 0 {
        EndpointStatus::Dead
    } else if ep.not_ready_count > 0 {
        EndpointStatus::Degraded
    } else {
        EndpointStatus::Healthy
    }
}

pub async fn list_endpoint_health(cluster: &dyn ClusterAccess, input: &EndpointHealthInput) -> Result<Report> {
    let scope = namespace::normalize(input.namespace.as_deref());
    let services = cluster.list_services(scope).await?;
    let mut report = Report::new(format!("Endpoint Health Report (namespace: {})", namespace::display(scope)));

    if services.is_empty() {
        report.line("No services found.");
        return Ok(report);
    }

    let (mut healthy, mut degraded, mut dead) = (0, 0, 0);
    let mut rows = Vec::new();
    for svc in &services {
        let ns = describe::namespace(&svc.metadata);
        let name = describe::name(&svc.metadata);
        let subject = ResourceRef::service(ns, name);
        let ep = match soft(topology::get_service_endpoint_health(cluster, ns, name).await)? {
            Ok(ep) => ep,
            Err(e) => {
                rows.push(vec![
                    name.to_string(),
                    ns.to_string(),
                    describe::service_type(svc).to_string(),
                    "?".into(),
                    "?".into(),
                    "?".into(),
                    "ERROR".into(),
                ]);
                report.add(
                    Finding::warning(format!("Could not check endpoint health for service '{}/{}': {}", ns, name, e))
                        .with_subject(subject),
                );
                continue;
            }
        };
        let status = classify_endpoints(svc, &ep);
        match status {
            EndpointStatus::Dead => {
                dead += 1;
                report.add(
                    Finding::critical(format!(
                        "Service '{}/{}' has 0 ready endpoints: all traffic will fail",
                        ns, name
                    ))
                    .with_subject(subject)
                    .with_remediation(format!("Run diagnose_service for '{}' in namespace '{}'", name, ns)),
                );
            }
            EndpointStatus::Degraded => {
                degraded += 1;
                report.add(
                    Finding::warning(format!(
                        "Service '{}/{}' has not-ready endpoints ({}/{} ready): partial availability",
                        ns, name, ep.ready_count, ep.total_endpoints
                    ))
                    .with_subject(subject),
                );
            }
            EndpointStatus::Healthy => healthy += 1,
            EndpointStatus::External | EndpointStatus::NoSelector => {}
        }
        rows.push(vec![
            name.to_string(),
            ns.to_string(),
            describe::service_type(svc).to_string(),
            ep.total_endpoints.to_string(),
            ep.ready_count.to_string(),
            ep.not_ready_count.to_string(),
            status.label().to_string(),
        ]);
    }
    report.table(&["SERVICE", "NAMESPACE", "TYPE", "TOTAL-EP", "READY", "NOT-READY", "STATUS"], &rows);
    report.line(format!(
        "\nSummary: {} healthy, {} degraded, {} dead out of {} services",
        healthy,
        degraded,
        dead,
        services.len()
    ));
    Ok(report)
}

/// Target port of a service port resolved against the backing pods' container ports.
///
/// Returns the numeric target when known and whether some container declares it.
pub fn resolve_target_port(sp: &ServicePort, pods: &[Pod]) -> (String, bool) {
    let container_ports: Vec<&ContainerPort> = pods
        .iter()
        .flat_map(|p| p.spec.iter().flat_map(|s| s.containers.iter()))
        .flat_map(|c| c.ports.iter().flatten())
        .collect();
    match &sp.target_port {
        Some(IntOrString::String(named)) => {
            let found = container_ports.iter().any(|cp| cp.name.as_deref() == Some(named.as_str()));
            (named.clone(), found)
        }
        Some(IntOrString::Int(port)) if *port != 0 => {
            let port = *port;
            (port.to_string(), container_ports.iter().any(|cp| cp.container_port == port))
        }
        _ => (sp.port.to_string(), container_ports.iter().any(|cp| cp.container_port == sp.port)),
    }
}

fn declares_any_port(pods: &[Pod]) -> bool {
    pods.iter()
        .flat_map(|p| p.spec.iter().flat_map(|s| s.containers.iter()))
        .any(|c| c.ports.as_ref().map_or(false, |p| !p.is_empty()))
}

pub async fn analyze_service_connectivity(cluster: &dyn ClusterAccess, input: &ConnectivityInput) -> Result<Report> {
    let ns = input.namespace.as_str();
    let name = input.service.as_str();
    let subject = ResourceRef::service(ns, name);
    let mut report = Report::new(format!("Service Connectivity Analysis: {} (namespace: {})", name, ns));

    report.subsection("Check 1: Service Exists");
    let Some(svc) = cluster.get_service(ns, name).await? else {
        report.flag(
            Finding::critical(format!("Service '{}/{}' not found", ns, name))
                .with_subject(subject)
                .with_remediation("Verify the service name and namespace"),
        );
        report.action("Use list_endpoint_health to see available services");
        return Ok(report);
    };
    let selector = describe::service_selector(&svc);
    report.kv("Type", describe::service_type(&svc));
    report.kv("Cluster IP", describe::cluster_ip(&svc));
    report.kv("Selector", format_labels(selector));
    report.kv("Ports", describe::format_service_ports(&svc));
    report.ok("Service exists");

    report.subsection("Check 2: Selector Matches Pods");
    let mut pods: Vec<Pod> = Vec::new();
    if selector.is_none() {
        report.line("  Service has no selector (headless/ExternalName)");
    } else {
        match soft(topology::get_pods_for_service(cluster, &svc).await)? {
            Ok(found) if found.is_empty() => report.flag(
                Finding::critical(format!(
                    "No pods match selector {}: service cannot route traffic",
                    format_labels(selector)
                ))
                .with_subject(subject.clone())
                .with_remediation("Align the service selector with the pod template labels"),
            ),
            Ok(found) => {
                let healthy = found.iter().filter(|p| health::is_pod_healthy(p)).count();
                report.line(format!(
                    "  {} pods match selector ({} healthy, {} unhealthy)",
                    found.len(),
                    healthy,
                    found.len() - healthy
                ));
                if healthy == 0 {
                    report.flag(Finding::critical("All matching pods are unhealthy").with_subject(subject.clone()));
                } else if healthy < found.len() {
                    report.flag(
                        Finding::warning(format!("{} of {} matching pods are unhealthy", found.len() - healthy, found.len()))
                            .with_subject(subject.clone()),
                    );
                } else {
                    report.ok("All matching pods are healthy");
                }
                pods = found;
            }
            Err(e) => report.flag(
                Finding::warning(format!("Could not list pods matching selector: {}", e)).with_subject(subject.clone()),
            ),
        }
    }

    report.subsection("Check 3: Endpoints Ready");
    let endpoints = match soft(topology::get_service_endpoint_health(cluster, ns, name).await)? {
        Ok(ep) => {
            report.kv("Total Endpoints", ep.total_endpoints.to_string());
            report.kv("Ready", ep.ready_count.to_string());
            report.kv("Not Ready", ep.not_ready_count.to_string());
            if ep.total_endpoints == 0 && selector.is_some() {
                report.flag(
                    Finding::critical("No endpoints: service has no backends to route to").with_subject(subject.clone()),
                );
            } else if ep.ready_count == 0 && ep.total_endpoints > 0 {
                report.flag(
                    Finding::critical("All endpoints are not ready: service is effectively down").with_subject(subject.clone()),
                );
            } else if ep.not_ready_count > 0 {
                report.flag(
                    Finding::warning(format!("{} of {} endpoints not ready", ep.not_ready_count, ep.total_endpoints))
                        .with_subject(subject.clone()),
                );
            } else if ep.ready_count > 0 {
                report.ok(format!("All {} endpoints are ready", ep.ready_count));
            }
            Some(ep)
        }
        Err(e) => {
            report.flag(Finding::warning(format!("Could not check endpoints: {}", e)).with_subject(subject.clone()));
            None
        }
    };

    report.subsection("Check 4: Port Mapping Validation");
    if pods.is_empty() {
        report.line("  Skipped: no matched pods to validate against.");
    } else {
        let checkable = declares_any_port(&pods);
        for sp in svc.spec.as_ref().and_then(|s| s.ports.as_ref()).into_iter().flatten() {
            let proto = sp.protocol.as_deref().unwrap_or("TCP");
            let (target, declared) = resolve_target_port(sp, &pods);
            if checkable && !declared {
                report.flag(
                    Finding::warning(format!(
                        "Service port {}/{} targets port {}, but no container declares this port",
                        sp.port, proto, target
                    ))
                    .with_subject(subject.clone())
                    .with_remediation(format!("Fix targetPort of port {} on service '{}'", sp.port, name)),
                );
            } else {
                report.line(format!("  Port {}/{} -> target {}: OK", sp.port, proto, target));
            }
        }
    }

    report.subsection("Check 5: Network Policies");
    let mut restricting: Vec<(String, String)> = Vec::new();
    match soft(cluster.list_network_policies(Some(ns)).await)? {
        Ok(policies) if policies.is_empty() => {
            report.line("  No network policies in namespace: all traffic allowed by default");
        }
        Ok(policies) => {
            for np in &policies {
                let analysis = analyze_policy(np);
                let Some(pod) = pods
                    .iter()
                    .find(|p| matches_label_selector(&analysis.selector, p.metadata.labels.as_ref()))
                else {
                    continue;
                };
                report.line(format!("  Policy '{}' affects service pods", analysis.name));
                if analysis.ingress == RuleSet::DenyAll {
                    report.flag(
                        Finding::warning(format!(
                            "Policy '{}' denies all ingress: may block traffic to this service",
                            analysis.name
                        ))
                        .with_subject(ResourceRef::new("NetworkPolicy", Some(ns), &analysis.name))
                        .with_remediation(format!("Add an ingress rule to policy '{}' for the service's clients", analysis.name)),
                    );
                }
                restricting.push((analysis.name.clone(), describe::name(&pod.metadata).to_string()));
            }
            if restricting.is_empty() {
                report.line("  No network policies target this service's pods");
            }
        }
        Err(e) => report.note(format!("could not check network policies: {}", e)),
    }

    report.subsection("Check 6: Ingress Exposure");
    let routes = match soft(cluster.list_ingresses(Some(ns)).await)? {
        Ok(ingresses) => {
            let routes = topology::ingress_routes_to(&ingresses, ns, name);
            for (ing, host, path) in &routes {
                report.line(format!("  Ingress '{}' exposes this service via {}{}", ing, host, path));
            }
            if routes.is_empty() {
                report.line("  Service is not exposed via any Ingress (internal only)");
            }
            routes
        }
        Err(e) => {
            report.note(format!("could not check ingresses: {}", e));
            Vec::new()
        }
    };

    report.subsection("Overall Assessment");
    let issues = report.summary().issue_count();
    if issues == 0 {
        report.line("  Service connectivity looks healthy. No issues found.");
    } else {
        report.line(format!("  {} issue(s) found. Review findings above.", issues));
    }

    let mut flow = Flowchart::new(Direction::TopBottom);
    let svc_id = flow.add_node(
        &format!("svc/{}", name),
        &format!("Service: {}<br/>{}", name, describe::format_service_ports(&svc)),
        Shape::Round,
    );
    for (ing, host, path) in &routes {
        let ing_id = flow.add_styled_node(
            &format!("ing/{}", ing),
            &format!("Ingress: {}<br/>{}", ing, host),
            Shape::TrapAlt,
            Style::Info,
        );
        flow.add_edge(&ing_id, &svc_id, Some(path), EdgeKind::Solid);
    }
    if let Some(ep) = &endpoints {
        let style = if ep.total_endpoints == 0 && selector.is_some() {
            Style::Critical
        } else if ep.not_ready_count > 0 {
            Style::Warning
        } else {
            Style::Healthy
        };
        flow.set_style(&svc_id, style);
    }
    for pod in &pods {
        let pod_name = describe::name(&pod.metadata);
        let pod_id = flow.add_styled_node(
            &format!("pod/{}", pod_name),
            &format!("{}<br/>{}", pod_name, health::pod_phase_reason(pod)),
            Shape::Rect,
            health::pod_verdict(pod).style(),
        );
        flow.link(&svc_id, &pod_id);
    }
    for (policy, pod_name) in &restricting {
        let np_id = flow.add_styled_node(&format!("np/{}", policy), &format!("NetPol: {}", policy), Shape::Diamond, Style::Warning);
        if let Some(pod_id) = flow.node_id(&format!("pod/{}", pod_name)).map(str::to_string) {
            flow.add_edge(&np_id, &pod_id, Some("restricts"), EdgeKind::Dotted);
        }
    }
    report.diagram(Diagram::Flowchart { heading: "CONNECTIVITY DIAGRAM".into(), chart: flow });
    Ok(report)
}

pub async fn map_service_topology(cluster: &dyn ClusterAccess, input: &TopologyInput) -> Result<Report> {
    let ns = namespace::normalize(Some(input.namespace.as_str()))
        .ok_or_else(|| KdError::InvalidArgument("map_service_topology requires a specific namespace, not 'all'".into()))?;
    let services = cluster.list_services(Some(ns)).await?;
    let mut report = Report::new(format!("Service Topology Map (namespace: {})", ns));

    report.subsection("Services");
    if services.is_empty() {
        report.line("  No services found in this namespace.");
        return Ok(report);
    }

    struct ServiceView<'a> {
        svc: &'a Service,
        pods: Vec<Pod>,
        endpoints: Option<EndpointHealth>,
    }

    let mut views = Vec::with_capacity(services.len());
    for svc in &services {
        let svc_name = describe::name(&svc.metadata);
        let pods = soft(topology::get_pods_for_service(cluster, svc).await)?.unwrap_or_default();
        let endpoints = soft(topology::get_service_endpoint_health(cluster, ns, svc_name).await)?.ok();
        views.push(ServiceView { svc, pods, endpoints });
    }

    let rows: Vec<Vec<String>> = views
        .iter()
        .map(|v| {
            vec![
                describe::name(&v.svc.metadata).to_string(),
                describe::service_type(v.svc).to_string(),
                describe::cluster_ip(v.svc).to_string(),
                describe::format_service_ports(v.svc),
                v.pods.len().to_string(),
                v.endpoints
                    .as_ref()
                    .map(|e| format!("{}/{}", e.ready_count, e.total_endpoints))
                    .unwrap_or_else(|| "?".to_string()),
                format_age(v.svc.metadata.creation_timestamp.as_ref()),
            ]
        })
        .collect();
    report.table(&["SERVICE", "TYPE", "CLUSTER-IP", "PORTS", "PODS", "READY-EP", "AGE"], &rows);
    report.line(format!("\n{} services", services.len()));

    let ingresses = match soft(cluster.list_ingresses(Some(ns)).await)? {
        Ok(list) => list,
        Err(e) => {
            report.note(format!("could not list ingresses: {}", e));
            Vec::new()
        }
    };
    if !ingresses.is_empty() {
        report.subsection("Ingresses");
        let rows: Vec<Vec<String>> = ingresses
            .iter()
            .map(|ing| {
                let (hosts, paths, backends) = describe::ingress_details(ing);
                let tls = ing.spec.as_ref().and_then(|s| s.tls.as_ref()).map_or(false, |t| !t.is_empty());
                vec![
                    describe::name(&ing.metadata).to_string(),
                    hosts.join(", "),
                    paths.join(", "),
                    backends.join(", "),
                    if tls { "Yes" } else { "No" }.to_string(),
                ]
            })
            .collect();
        report.table(&["INGRESS", "HOSTS", "PATHS", "BACKEND-SERVICES", "TLS"], &rows);
        report.line(format!("\n{} ingresses", ingresses.len()));
    }

    let deps = match soft(topology::infer_service_dependencies(cluster, ns).await)? {
        Ok(deps) => deps,
        Err(e) => {
            report.note(format!("could not infer dependencies: {}", e));
            Vec::new()
        }
    };
    if !deps.is_empty() {
        report.subsection("Inferred Service Dependencies");
        let rows: Vec<Vec<String>> = deps
            .iter()
            .map(|d| vec![d.from_service.clone(), d.to_service.clone(), d.confidence.to_string(), d.source.to_string()])
            .collect();
        report.table(&["FROM", "TO", "CONFIDENCE", "SOURCE"], &rows);
    }

    for v in &views {
        let svc_name = describe::name(&v.svc.metadata);
        let subject = ResourceRef::service(ns, svc_name);
        match &v.endpoints {
            Some(ep) if ep.total_endpoints == 0 && describe::service_selector(v.svc).is_some() => report.add(
                Finding::critical(format!("Service '{}' has 0 endpoints: no pods match its selector", svc_name))
                    .with_subject(subject.clone()),
            ),
            Some(ep) if ep.not_ready_count > 0 => report.add(
                Finding::warning(format!(
                    "Service '{}' has {} not-ready endpoints out of {} total",
                    svc_name, ep.not_ready_count, ep.total_endpoints
                ))
                .with_subject(subject.clone()),
            ),
            _ => {}
        }
        if describe::service_selector(v.svc).is_none() && !describe::is_external_name(v.svc) {
            report.add(Finding::info(format!("Service '{}' has no selector (headless/external)", svc_name)).with_subject(subject));
        }
    }

    let mut flow = Flowchart::new(Direction::TopBottom);
    if !ingresses.is_empty() {
        let internet = flow.add_styled_node("internet", "Internet", Shape::Circle, Style::Info);
        flow.begin_subgraph("ingresses", "Ingresses");
        let ids: Vec<String> = ingresses
            .iter()
            .map(|ing| {
                let ing_name = describe::name(&ing.metadata);
                let (hosts, _, _) = describe::ingress_details(ing);
                flow.add_node(
                    &format!("ing/{}", ing_name),
                    &format!("{}<br/>{}", ing_name, hosts.join(", ")),
                    Shape::TrapAlt,
                )
            })
            .collect();
        flow.end_subgraph();
        for id in &ids {
            flow.link(&internet, id);
        }
    }

    flow.begin_subgraph("services", &format!("Services ({})", ns));
    for v in &views {
        let svc_name = describe::name(&v.svc.metadata);
        let style = match &v.endpoints {
            Some(ep) if ep.total_endpoints == 0 && describe::service_selector(v.svc).is_some() => Style::Critical,
            Some(ep) if ep.not_ready_count > 0 => Style::Warning,
            _ => Style::Healthy,
        };
        flow.add_styled_node(
            &format!("svc/{}", svc_name),
            &format!("{}<br/>{}", svc_name, describe::service_type(v.svc)),
            Shape::Round,
            style,
        );
    }
    flow.end_subgraph();

    for ing in &ingresses {
        let ing_id = flow.add_node(&format!("ing/{}", describe::name(&ing.metadata)), "", Shape::TrapAlt);
        for rule in ing.spec.as_ref().and_then(|s| s.rules.as_ref()).into_iter().flatten() {
            let host = rule.host.as_deref().unwrap_or("");
            for p in rule.http.iter().flat_map(|h| h.paths.iter()) {
                let Some(backend) = describe::backend_service(Some(&p.backend)) else { continue };
                let existing = flow.node_id(&format!("svc/{}", backend)).map(str::to_string);
                let svc_id = match existing {
                    Some(id) => id,
                    None => flow.add_styled_node(
                        &format!("svc/{}", backend),
                        &format!("{} (missing)", backend),
                        Shape::Round,
                        Style::Critical,
                    ),
                };
                flow.add_edge(&ing_id, &svc_id, Some(&format!("{}{}", host, path_value(p))), EdgeKind::Solid);
            }
        }
    }

    flow.begin_subgraph("pods", "Pods");
    let mut seen = BTreeSet::new();
    for v in &views {
        for pod in &v.pods {
            let pod_name = describe::name(&pod.metadata);
            if seen.insert(pod_name.to_string()) {
                flow.add_styled_node(
                    &format!("pod/{}", pod_name),
                    &format!("{}<br/>{}", pod_name, health::pod_phase_reason(pod)),
                    Shape::Rect,
                    if health::is_pod_healthy(pod) { Style::Healthy } else { Style::Critical },
                );
            }
        }
    }
    flow.end_subgraph();

    for v in &views {
        let svc_id = flow.add_node(&format!("svc/{}", describe::name(&v.svc.metadata)), "", Shape::Round);
        for pod in &v.pods {
            let pod_id = flow.add_node(&format!("pod/{}", describe::name(&pod.metadata)), "", Shape::Rect);
            flow.link(&svc_id, &pod_id);
        }
    }

    for d in &deps {
        let from = flow.node_id(&format!("svc/{}", d.from_service)).map(str::to_string);
        let to = flow.node_id(&format!("svc/{}", d.to_service)).map(str::to_string);
        if let (Some(from), Some(to)) = (from, to) {
            flow.add_edge(&from, &to, Some(&d.confidence.to_string()), EdgeKind::Dotted);
        }
    }
    report.diagram(Diagram::Flowchart { heading: "TOPOLOGY DIAGRAM".into(), chart: flow });
    Ok(report)
}
