//! Display helpers for Services, Ingresses and object metadata

use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::{HTTPIngressPath, Ingress, IngressBackend};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;

/// Annotation prefix of the Azure Application Gateway ingress controller
pub const AGIC_PREFIX: &str = "appgw.ingress.kubernetes.io/";

pub fn name(meta: &ObjectMeta) -> &str {
    meta.name.as_deref().unwrap_or("unknown")
}

pub fn namespace(meta: &ObjectMeta) -> &str {
    meta.namespace.as_deref().unwrap_or("default")
}

pub fn service_type(svc: &Service) -> &str {
    svc.spec
        .as_ref()
        .and_then(|s| s.type_.as_deref())
        .unwrap_or("ClusterIP")
}

pub fn cluster_ip(svc: &Service) -> &str {
    svc.spec
        .as_ref()
        .and_then(|s| s.cluster_ip.as_deref())
        .unwrap_or("<none>")
}

/// Non-empty selector of a Service
pub fn service_selector(svc: &Service) -> Option<&BTreeMap<String, String>> {
    svc.spec
        .as_ref()
        .and_then(|s| s.selector.as_ref())
        .filter(|s| !s.is_empty())
}

pub fn is_external_name(svc: &Service) -> bool {
    service_type(svc) == "ExternalName"
}

/// `name(port→target)/PROTO` entries joined by `, `, or `<none>`
pub fn format_service_ports(svc: &Service) -> String {
    let ports = svc.spec.as_ref().and_then(|s| s.ports.as_ref());
    match ports {
        Some(ports) if !ports.is_empty() => ports
            .iter()
            .map(|p| {
                let target = p
                    .target_port
                    .as_ref()
                    .map(int_or_string)
                    .unwrap_or_else(|| p.port.to_string());
                let proto = p.protocol.as_deref().unwrap_or("TCP");
                let name = p.name.as_deref().filter(|n| !n.is_empty());
                match name {
                    Some(n) => format!("{}({}→{})/{}", n, p.port, target, proto),
                    None => format!("{}→{}/{}", p.port, target, proto),
                }
            })
            .collect::<Vec<_>>()
            .join(", "),
        _ => "<none>".to_string(),
    }
}

pub fn int_or_string(v: &k8s_openapi::apimachinery::pkg::util::intstr::IntOrString) -> String {
    use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
    match v {
        IntOrString::Int(i) => i.to_string(),
        IntOrString::String(s) => s.clone(),
    }
}

/// Ingress class from spec, then the legacy annotation, else `<none>`
pub fn ingress_class(ing: &Ingress) -> String {
    if let Some(class) = ing
        .spec
        .as_ref()
        .and_then(|s| s.ingress_class_name.as_deref())
        .filter(|c| !c.is_empty())
    {
        return class.to_string();
    }
    ing.metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get("kubernetes.io/ingress.class"))
        .cloned()
        .unwrap_or_else(|| "<none>".to_string())
}

/// AGIC annotations with the prefix stripped, sorted by key
pub fn agic_annotations(ing: &Ingress) -> Vec<(String, String)> {
    ing.metadata
        .annotations
        .as_ref()
        .map(|a| {
            a.iter()
                .filter_map(|(k, v)| k.strip_prefix(AGIC_PREFIX).map(|key| (key.to_string(), v.clone())))
                .collect()
        })
        .unwrap_or_default()
}

pub fn backend_service(backend: Option<&IngressBackend>) -> Option<&str> {
    backend
        .and_then(|b| b.service.as_ref())
        .map(|s| s.name.as_str())
        .filter(|n| !n.is_empty())
}

/// Port of an ingress backend as number or name, `<none>` when unset
pub fn backend_port(backend: Option<&IngressBackend>) -> String {
    let port = backend.and_then(|b| b.service.as_ref()).and_then(|s| s.port.as_ref());
    match port {
        Some(p) => match (p.number, p.name.as_deref()) {
            (Some(n), _) => n.to_string(),
            (None, Some(name)) => name.to_string(),
            _ => "<none>".to_string(),
        },
        None => "<none>".to_string(),
    }
}

pub fn path_type(path: &HTTPIngressPath) -> &str {
    if path.path_type.is_empty() {
        "Prefix"
    } else {
        path.path_type.as_str()
    }
}

pub fn path_value(path: &HTTPIngressPath) -> &str {
    path.path.as_deref().unwrap_or("/")
}

/// Hosts, paths and deduplicated backend services of an ingress
pub fn ingress_details(ing: &Ingress) -> (Vec<String>, Vec<String>, Vec<String>) {
    let mut hosts = Vec::new();
    let mut paths = Vec::new();
    let mut backends: Vec<String> = Vec::new();

    let Some(spec) = &ing.spec else {
        return (hosts, paths, backends);
    };

    if let Some(svc) = backend_service(spec.default_backend.as_ref()) {
        backends.push(svc.to_string());
    }
    for rule in spec.rules.iter().flatten() {
        hosts.push(rule.host.clone().unwrap_or_else(|| "*".to_string()));
        for p in rule.http.iter().flat_map(|h| h.paths.iter()) {
            paths.push(path_value(p).to_string());
            if let Some(svc) = backend_service(Some(&p.backend)) {
                if !backends.iter().any(|b| b == svc) {
                    backends.push(svc.to_string());
                }
            }
        }
    }
    (hosts, paths, backends)
}

/// Equal paths, or one a prefix of the other
pub fn paths_overlap(a: &str, b: &str) -> bool {
    a == b || a.starts_with(b) || b.starts_with(a)
}
