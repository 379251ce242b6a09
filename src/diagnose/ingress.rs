//! Ingress audit: backends, TLS and cross-ingress host/path conflicts

use super::describe::{self, backend_port, path_type, path_value};
use super::namespace;
use super::topology;
use super::types::{Finding, ResourceRef, Severity};
use super::{soft, Report};
use crate::client::ClusterAccess;
use crate::error::Result;
use crate::mermaid::{Diagram, Direction, EdgeKind, Flowchart, Shape, Style};
use crate::output::format_age;
use k8s_openapi::api::core::v1::Service;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngressAuditInput {
    #[serde(default)]
    pub namespace: Option<String>,
}

/// One routed path recorded for conflict detection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    pub ingress: String,
    pub path: String,
    pub path_type: String,
}

/// Overlapping paths on the same host owned by different ingresses
pub fn find_conflicts(routes: &BTreeMap<String, Vec<RouteEntry>>) -> Vec<(String, RouteEntry, RouteEntry)> {
    let mut conflicts = Vec::new();
    for (host, entries) in routes {
        for (i, a) in entries.iter().enumerate() {
            for b in &entries[i + 1..] {
                if a.ingress != b.ingress && describe::paths_overlap(&a.path, &b.path) {
                    conflicts.push((host.clone(), a.clone(), b.clone()));
                }
            }
        }
    }
    conflicts
}

/// Whether a backend port (number or name) is declared on the service
pub fn service_has_port(svc: &Service, port: &str) -> bool {
    svc.spec
        .as_ref()
        .and_then(|s| s.ports.as_ref())
        .map_or(false, |ports| {
            ports
                .iter()
                .any(|p| p.port.to_string() == port || p.name.as_deref() == Some(port))
        })
}

pub async fn analyze_all_ingresses(cluster: &dyn ClusterAccess, input: &IngressAuditInput) -> Result<Report> {
    let scope = namespace::normalize(input.namespace.as_deref());
    let ingresses = cluster.list_ingresses(scope).await?;
    let mut report = Report::new(format!("Ingress Audit (namespace: {})", namespace::display(scope)));

    if ingresses.is_empty() {
        report.line("No ingresses found.");
        return Ok(report);
    }

    let mut routes: BTreeMap<String, Vec<RouteEntry>> = BTreeMap::new();
    let mut flow = Flowchart::new(Direction::LeftRight);
    let internet = flow.add_styled_node("internet", "Internet", Shape::Circle, Style::External);

    for ing in &ingresses {
        let name = describe::name(&ing.metadata);
        let ns = describe::namespace(&ing.metadata);
        let subject = ResourceRef::ingress(ns, name);
        let start = report.findings.len();

        report.subsection(&format!("Ingress: {}/{}", ns, name));
        report.kv("Class", describe::ingress_class(ing));
        report.kv("Age", format_age(ing.metadata.creation_timestamp.as_ref()));
        let agic = describe::agic_annotations(ing);
        if !agic.is_empty() {
            report.line(format!("  AGIC Annotations ({}):", agic.len()));
            for (k, v) in &agic {
                report.line(format!("    {}: {}", k, v));
            }
        }

        let ing_id = flow.add_node(&format!("ing/{}/{}", ns, name), &format!("Ingress: {}", name), Shape::TrapAlt);
        flow.link(&internet, &ing_id);

        let rules = ing.spec.as_ref().and_then(|s| s.rules.as_ref());
        for rule in rules.into_iter().flatten() {
            let host = rule.host.clone().filter(|h| !h.is_empty()).unwrap_or_else(|| "*".to_string());
            report.line(format!("\n  Host: {}", host));
            let Some(http) = &rule.http else {
                report.flag(Finding::warning(format!("Host '{}' rule has no HTTP paths defined", host)).with_subject(subject.clone()));
                continue;
            };

            for p in &http.paths {
                let path = path_value(p);
                routes.entry(host.clone()).or_default().push(RouteEntry {
                    ingress: format!("{}/{}", ns, name),
                    path: path.to_string(),
                    path_type: path_type(p).to_string(),
                });
                report.line(format!("    Path: {} (type: {})", path, path_type(p)));

                let Some(backend) = describe::backend_service(Some(&p.backend)) else {
                    report.flag(
                        Finding::critical(format!("{}{}: no service backend configured", host, path)).with_subject(subject.clone()),
                    );
                    continue;
                };
                let port = backend_port(Some(&p.backend));
                report.line(format!("      Backend: {}:{}", backend, port));

                let svc_key = format!("svc/{}/{}", ns, backend);
                let svc = match soft(cluster.get_service(ns, backend).await)? {
                    Ok(Some(svc)) => svc,
                    Ok(None) => {
                        report.flag(
                            Finding::critical(format!("Backend service '{}' NOT FOUND", backend))
                                .with_subject(ResourceRef::service(ns, backend))
                                .with_remediation(format!("Create service '{}' in namespace '{}'", backend, ns)),
                        );
                        let id = flow.add_styled_node(&svc_key, &format!("{} (missing)", backend), Shape::Rect, Style::Critical);
                        flow.add_edge(&ing_id, &id, Some(path), EdgeKind::Solid);
                        continue;
                    }
                    Err(e) => {
                        report.note(format!("could not fetch service '{}': {}", backend, e));
                        continue;
                    }
                };

                if port != "<none>" && !service_has_port(&svc, &port) {
                    report.flag(
                        Finding::warning(format!("Port '{}' not defined on service '{}'", port, backend))
                            .with_subject(ResourceRef::service(ns, backend)),
                    );
                }

                let style = match soft(topology::get_service_endpoint_health(cluster, ns, backend).await)? {
                    Ok(ep) if ep.ready_count == 0 => {
                        let count = if ep.total_endpoints == 0 {
                            "0 endpoints".to_string()
                        } else {
                            format!("0/{} ready endpoints", ep.total_endpoints)
                        };
                        report.flag(
                            Finding::critical(format!("Service '{}' has {}: {}{} will return 502/503", backend, count, host, path))
                                .with_subject(ResourceRef::service(ns, backend)),
                        );
                        Style::Critical
                    }
                    Ok(ep) if ep.not_ready_count > 0 => {
                        report.flag(
                            Finding::warning(format!(
                                "Service '{}' has {}/{} ready endpoints",
                                backend, ep.ready_count, ep.total_endpoints
                            ))
                            .with_subject(ResourceRef::service(ns, backend)),
                        );
                        ep.verdict().style()
                    }
                    Ok(ep) => {
                        report.line(format!("      Endpoints: {} ready", ep.ready_count));
                        Style::Healthy
                    }
                    Err(e) => {
                        report.line(format!("      Endpoints: could not check ({})", e));
                        Style::Info
                    }
                };
                let id = flow.add_styled_node(&svc_key, backend, Shape::Rect, style);
                flow.add_edge(&ing_id, &id, Some(path), EdgeKind::Solid);
            }
        }

        let tls = ing.spec.as_ref().and_then(|s| s.tls.as_ref()).filter(|t| !t.is_empty());
        match tls {
            Some(entries) => {
                report.line("\n  TLS Configuration:");
                for t in entries {
                    report.line(format!("    Hosts: {}", t.hosts.as_deref().unwrap_or(&[]).join(", ")));
                    match t.secret_name.as_deref().filter(|s| !s.is_empty()) {
                        Some(secret) => report.line(format!("    Secret: {}", secret)),
                        None => report.flag(
                            Finding::warning("No TLS secret specified: may use default certificate").with_subject(subject.clone()),
                        ),
                    }
                }
            }
            None => report.flag(
                Finding::info(format!("Ingress '{}' has no TLS configured: traffic is unencrypted", name))
                    .with_subject(subject.clone()),
            ),
        }

        let worst = report.findings[start..].iter().map(|f| f.severity).min();
        flow.set_style(
            &ing_id,
            match worst {
                Some(Severity::Critical) => Style::Critical,
                Some(Severity::Warning) => Style::Warning,
                _ => Style::Healthy,
            },
        );
    }

    report.subsection("Host/Path Conflict Analysis");
    let conflicts = find_conflicts(&routes);
    if conflicts.is_empty() {
        report.line("  No host/path conflicts detected.");
    }
    for (host, a, b) in &conflicts {
        report.flag(
            Finding::warning(format!(
                "Potential conflict: host '{}' path '{}' (ingress: {}) overlaps with path '{}' (ingress: {})",
                host, a.path, a.ingress, b.path, b.ingress
            ))
            .with_remediation("Consolidate overlapping host/path rules into a single Ingress"),
        );
    }

    report.subsection("Audit Summary");
    report.kv("Ingresses audited", ingresses.len().to_string());
    let issues = report.summary().issue_count();
    if issues == 0 {
        report.line("  No issues found. All ingresses look healthy.");
    } else {
        report.line(format!("  {} issue(s) found. Review findings above.", issues));
    }
    report.diagram(Diagram::Flowchart { heading: "INGRESS ROUTES".into(), chart: flow });
    Ok(report)
}
