//! Topology resolvers: one hop of the resource graph each
//!
//! Legitimately absent objects resolve to `None` or an empty list; only
//! transport, timeout and cancellation failures are errors.

use super::describe::{self, path_type, path_value};
use super::selector::{matches_map, to_query};
use super::types::{Confidence, DependencySource, EndpointAddress, EndpointHealth, Metrics, ResourceRef, ServiceDependency};
use crate::client::{ClusterAccess, ListQuery, NodeUsage, PodUsage};
use crate::error::{KdError, Result};
use k8s_openapi::api::core::v1::{Endpoints, Event, Pod, Service};
use k8s_openapi::api::networking::v1::{HTTPIngressPath, Ingress};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// An ingress rule path that routes a queried host and path
#[derive(Debug, Clone)]
pub struct IngressMatch {
    pub ingress: Ingress,
    pub host: String,
    pub path: HTTPIngressPath,
}

impl IngressMatch {
    pub fn name(&self) -> &str {
        describe::name(&self.ingress.metadata)
    }

    pub fn namespace(&self) -> &str {
        describe::namespace(&self.ingress.metadata)
    }

    pub fn backend_service(&self) -> Option<&str> {
        describe::backend_service(Some(&self.path.backend))
    }
}

/// Path match by pathType: Exact needs equality, everything else is a prefix test
pub fn match_path(pattern: &str, path: &str, path_type: &str) -> bool {
    match path_type {
        "Exact" => path == pattern,
        _ => path.starts_with(pattern),
    }
}

/// First rule path across `ingresses` whose host equals `host` and whose path matches.
///
/// Order is the order given; no precedence between overlapping ingresses is applied.
pub fn select_ingress(ingresses: &[Ingress], host: &str, path: &str) -> Option<IngressMatch> {
    for ing in ingresses {
        let rules = ing.spec.as_ref().and_then(|s| s.rules.as_ref());
        for rule in rules.into_iter().flatten() {
            if rule.host.as_deref().unwrap_or("") != host {
                continue;
            }
            let Some(http) = &rule.http else { continue };
            for p in &http.paths {
                if match_path(path_value(p), path, path_type(p)) {
                    return Some(IngressMatch {
                        ingress: ing.clone(),
                        host: host.to_string(),
                        path: p.clone(),
                    });
                }
            }
        }
    }
    None
}

pub async fn find_ingress_for_host_path(
    cluster: &dyn ClusterAccess,
    namespace: Option<&str>,
    host: &str,
    path: &str,
) -> Result<Option<IngressMatch>> {
    let ingresses = cluster.list_ingresses(namespace).await?;
    debug!(count = ingresses.len(), host, path, "scanning ingresses");
    Ok(select_ingress(&ingresses, host, path))
}

/// Pods selected by a Service; an empty selector resolves to no pods
pub async fn get_pods_for_service(cluster: &dyn ClusterAccess, svc: &Service) -> Result<Vec<Pod>> {
    let Some(selector) = describe::service_selector(svc) else {
        return Ok(Vec::new());
    };
    let ns = describe::namespace(&svc.metadata);
    let pods = cluster.list_pods(Some(ns), &ListQuery::labels(to_query(selector))).await?;
    Ok(pods
        .into_iter()
        .filter(|p| matches_map(selector, p.metadata.labels.as_ref()))
        .collect())
}

/// Sum ready and not-ready addresses across all subsets
pub fn endpoint_health_from(namespace: &str, service: &str, endpoints: Option<&Endpoints>) -> EndpointHealth {
    let mut health = EndpointHealth {
        service: Some(ResourceRef::service(namespace, service)),
        ..Default::default()
    };

    let to_addr = |a: &k8s_openapi::api::core::v1::EndpointAddress| EndpointAddress {
        ip: a.ip.clone(),
        pod_name: a
            .target_ref
            .as_ref()
            .filter(|r| r.kind.as_deref().map_or(true, |k| k == "Pod"))
            .and_then(|r| r.name.clone()),
        node_name: a.node_name.clone(),
    };

    for subset in endpoints.and_then(|e| e.subsets.as_ref()).into_iter().flatten() {
        for addr in subset.addresses.iter().flatten() {
            health.ready_addresses.push(to_addr(addr));
        }
        for addr in subset.not_ready_addresses.iter().flatten() {
            health.not_ready_addresses.push(to_addr(addr));
        }
    }
    health.ready_count = health.ready_addresses.len();
    health.not_ready_count = health.not_ready_addresses.len();
    health.total_endpoints = health.ready_count + health.not_ready_count;
    health
}

/// Endpoint health of a service; a missing Endpoints object counts as zero endpoints
pub async fn get_service_endpoint_health(
    cluster: &dyn ClusterAccess,
    namespace: &str,
    service: &str,
) -> Result<EndpointHealth> {
    let endpoints = cluster.get_endpoints(namespace, service).await?;
    Ok(endpoint_health_from(namespace, service, endpoints.as_ref()))
}

/// `FOO_BAR_SERVICE_HOST` decodes to `foo-bar`
pub fn decode_service_host_env(name: &str) -> Option<String> {
    name.strip_suffix("_SERVICE_HOST")
        .filter(|s| !s.is_empty())
        .map(|s| s.replace('_', "-").to_lowercase())
}

/// Mine env vars of each service's pods for references to other services.
///
/// Each pod belongs to the first service (in the given order) selecting it.
/// `*_SERVICE_HOST` names give high confidence; `svc.namespace` substrings in
/// values give medium. Deduplicated by (from, to).
pub fn infer_dependencies(namespace: &str, services: &[Service], pods: &[Pod]) -> Vec<ServiceDependency> {
    let names: Vec<&str> = services.iter().map(|s| describe::name(&s.metadata)).collect();
    let known: BTreeSet<&str> = names.iter().copied().collect();

    let mut owned: BTreeMap<&str, Vec<&Pod>> = BTreeMap::new();
    for pod in pods {
        let owner = services.iter().find(|svc| {
            describe::service_selector(svc).map_or(false, |sel| matches_map(sel, pod.metadata.labels.as_ref()))
        });
        if let Some(svc) = owner {
            owned.entry(describe::name(&svc.metadata)).or_default().push(pod);
        }
    }

    let mut deps = Vec::new();
    let mut seen = BTreeSet::new();
    let mut record = |deps: &mut Vec<ServiceDependency>, from: &str, to: &str, confidence| {
        if seen.insert((from.to_string(), to.to_string())) {
            deps.push(ServiceDependency {
                from_service: from.to_string(),
                to_service: to.to_string(),
                namespace: namespace.to_string(),
                confidence,
                source: DependencySource::Env,
            });
        }
    };

    for from in &names {
        let Some(svc_pods) = owned.get(from) else { continue };
        for pod in svc_pods {
            let containers = pod.spec.as_ref().map(|s| s.containers.as_slice()).unwrap_or(&[]);
            for env in containers.iter().flat_map(|c| c.env.iter().flatten()) {
                if let Some(target) = decode_service_host_env(&env.name) {
                    if known.contains(target.as_str()) && target != *from {
                        record(&mut deps, *from, target.as_str(), Confidence::High);
                    }
                }
                if let Some(value) = env.value.as_deref().filter(|v| !v.is_empty()) {
                    for candidate in &names {
                        if candidate != from && value.contains(&format!("{}.{}", candidate, namespace)) {
                            record(&mut deps, *from, *candidate, Confidence::Medium);
                        }
                    }
                }
            }
        }
    }
    deps
}

pub async fn infer_service_dependencies(cluster: &dyn ClusterAccess, namespace: &str) -> Result<Vec<ServiceDependency>> {
    let services = cluster.list_services(Some(namespace)).await?;
    let pods = cluster.list_pods(Some(namespace), &ListQuery::default()).await?;
    Ok(infer_dependencies(namespace, &services, &pods))
}

/// Ingress routes (ingress, host, path) whose backend is the given service
pub fn ingress_routes_to(ingresses: &[Ingress], namespace: &str, service: &str) -> Vec<(String, String, String)> {
    let mut routes = Vec::new();
    for ing in ingresses {
        if describe::namespace(&ing.metadata) != namespace {
            continue;
        }
        let name = describe::name(&ing.metadata).to_string();
        let Some(spec) = &ing.spec else { continue };
        if describe::backend_service(spec.default_backend.as_ref()) == Some(service) {
            routes.push((name.clone(), "*".to_string(), "(default backend)".to_string()));
        }
        for rule in spec.rules.iter().flatten() {
            let host = rule.host.clone().unwrap_or_else(|| "*".to_string());
            for p in rule.http.iter().flat_map(|h| h.paths.iter()) {
                if describe::backend_service(Some(&p.backend)) == Some(service) {
                    routes.push((name.clone(), host.clone(), path_value(p).to_string()));
                }
            }
        }
    }
    routes
}

/// Events whose involved object carries `name`, most recent first
pub async fn events_for(cluster: &dyn ClusterAccess, namespace: &str, name: &str) -> Result<Vec<Event>> {
    cluster.list_events(Some(namespace), &ListQuery::involving(name)).await
}

pub fn is_warning_event(event: &Event) -> bool {
    event.type_.as_deref() == Some("Warning")
}

/// Pod usage keyed by `namespace/name`, or an explicit unavailable state
pub async fn fetch_pod_metrics(
    cluster: &dyn ClusterAccess,
    namespace: Option<&str>,
    label_selector: Option<&str>,
) -> Result<Metrics<BTreeMap<String, PodUsage>>> {
    match cluster.pod_metrics(namespace, label_selector).await {
        Ok(items) => Ok(Metrics::Available(items.into_iter().map(|u| (u.key(), u)).collect())),
        Err(KdError::Cancelled) => Err(KdError::Cancelled),
        Err(e) => Ok(Metrics::Unavailable(e.to_string())),
    }
}

/// Node usage keyed by node name, or an explicit unavailable state
pub async fn fetch_node_metrics(cluster: &dyn ClusterAccess) -> Result<Metrics<BTreeMap<String, NodeUsage>>> {
    match cluster.node_metrics().await {
        Ok(items) => Ok(Metrics::Available(items.into_iter().map(|u| (u.name.clone(), u)).collect())),
        Err(KdError::Cancelled) => Err(KdError::Cancelled),
        Err(e) => Ok(Metrics::Unavailable(e.to_string())),
    }
}
