//! Tool registry: every diagnostic engine exposed as a named tool with a JSON
//! argument schema, plus a dispatcher that turns JSON arguments into typed
//! engine input.

use crate::client::ClusterAccess;
use crate::config::AppConfig;
use crate::diagnose::cluster::{cluster_health_overview, ClusterInput};
use crate::diagnose::connectivity::{
    analyze_service_connectivity, list_endpoint_health, map_service_topology, ConnectivityInput,
    EndpointHealthInput, TopologyInput,
};
use crate::diagnose::dns::{check_dns_health, DnsInput};
use crate::diagnose::ingress::{analyze_all_ingresses, IngressAuditInput};
use crate::diagnose::logs::{analyze_service_logs, ServiceLogsInput};
use crate::diagnose::namespace;
use crate::diagnose::network_policy::{analyze_network_policies, NetworkPolicyInput};
use crate::diagnose::pod::{diagnose_pod, find_unhealthy_pods, PodInput, UnhealthyPodsInput};
use crate::diagnose::request_path::{diagnose_request_path, RequestPathInput};
use crate::diagnose::resources::{
    analyze_node_capacity, analyze_resource_efficiency, analyze_resource_usage, check_resource_quotas,
    top_resource_consumers, EfficiencyInput, NodeCapacityInput, QuotaInput, ResourceUsageInput, TopConsumersInput,
};
use crate::diagnose::service::{diagnose_service, ServiceInput};
use crate::diagnose::workload::{diagnose_namespace, NamespaceInput};
use crate::diagnose::Report;
use crate::error::{KdError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::debug;

/// Name, description and argument schema of one tool
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

fn string_prop(description: &str) -> Value {
    json!({ "type": "string", "description": description })
}

fn schema(properties: &[(&str, Value)], required: &[&str]) -> Value {
    let props: Map<String, Value> = properties.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
    json!({
        "type": "object",
        "properties": props,
        "required": required,
    })
}

fn namespace_prop(optional: bool) -> Value {
    if optional {
        string_prop("Kubernetes namespace; omit, \"\" or \"all\" for all namespaces")
    } else {
        string_prop("Kubernetes namespace")
    }
}

/// Every tool, in presentation order
pub fn registry() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: "diagnose_request_path",
            description: "Trace a request from hostname and path through Ingress, Service and Pods, reporting the first broken hop",
            parameters: schema(
                &[
                    ("hostname", string_prop("Host the request is sent to, e.g. api.example.com")),
                    ("path", string_prop("Request path, defaults to /")),
                    ("namespace", namespace_prop(true)),
                ],
                &["hostname"],
            ),
        },
        ToolSpec {
            name: "diagnose_service",
            description: "Diagnose a service: selector, endpoints, backing pods, ingresses, events and dependencies",
            parameters: schema(
                &[("namespace", namespace_prop(false)), ("service", string_prop("Service name"))],
                &["namespace", "service"],
            ),
        },
        ToolSpec {
            name: "cluster_health_overview",
            description: "Cluster-wide health: nodes, pods per namespace, ingress topology and top restarting pods",
            parameters: schema(&[], &[]),
        },
        ToolSpec {
            name: "diagnose_pod",
            description: "Diagnose one pod: container states, conditions, events and previous logs of crash-looping containers",
            parameters: schema(
                &[("namespace", namespace_prop(false)), ("pod", string_prop("Pod name"))],
                &["namespace", "pod"],
            ),
        },
        ToolSpec {
            name: "find_unhealthy_pods",
            description: "List pods that are not running and ready",
            parameters: schema(&[("namespace", namespace_prop(true))], &[]),
        },
        ToolSpec {
            name: "diagnose_namespace",
            description: "Namespace health: pods, deployments, recent warning events and unbound PVCs",
            parameters: schema(&[("namespace", namespace_prop(false))], &["namespace"]),
        },
        ToolSpec {
            name: "analyze_all_ingresses",
            description: "Audit ingresses: backend services and endpoints, TLS secrets and host/path conflicts",
            parameters: schema(&[("namespace", namespace_prop(true))], &[]),
        },
        ToolSpec {
            name: "analyze_network_policies",
            description: "Explain the network policies of a namespace and flag deny-all and unprotected pods",
            parameters: schema(&[("namespace", namespace_prop(false))], &["namespace"]),
        },
        ToolSpec {
            name: "analyze_resource_usage",
            description: "Per-pod CPU and memory usage against requests and limits",
            parameters: schema(&[("namespace", namespace_prop(false))], &["namespace"]),
        },
        ToolSpec {
            name: "analyze_node_capacity",
            description: "Node allocatable capacity, scheduled requests, live usage and scheduling headroom",
            parameters: schema(&[], &[]),
        },
        ToolSpec {
            name: "analyze_resource_efficiency",
            description: "Requested-versus-used waste, bin packing and right-sizing suggestions",
            parameters: schema(&[("namespace", namespace_prop(true))], &[]),
        },
        ToolSpec {
            name: "check_resource_quotas",
            description: "Resource quota usage with warnings near the hard limit",
            parameters: schema(
                &[
                    ("namespace", namespace_prop(true)),
                    (
                        "warn_percent",
                        json!({ "type": "number", "description": "Usage percentage flagged as a warning" }),
                    ),
                ],
                &[],
            ),
        },
        ToolSpec {
            name: "top_resource_consumers",
            description: "Pods using the most CPU or memory (requires metrics-server)",
            parameters: schema(
                &[
                    ("namespace", namespace_prop(true)),
                    (
                        "sort_by",
                        json!({ "type": "string", "enum": ["cpu", "memory"], "description": "Sort key, defaults to cpu" }),
                    ),
                    ("limit", json!({ "type": "integer", "minimum": 1, "description": "Number of pods to show" })),
                ],
                &[],
            ),
        },
        ToolSpec {
            name: "check_dns_health",
            description: "CoreDNS pods, kube-dns service and DNS error patterns in CoreDNS logs",
            parameters: schema(&[], &[]),
        },
        ToolSpec {
            name: "analyze_service_logs",
            description: "Scan the logs of a deployment's pods for error patterns",
            parameters: schema(
                &[
                    ("namespace", namespace_prop(false)),
                    ("deployment", string_prop("Deployment name")),
                    ("pattern", string_prop("Regular expression matched per line")),
                    ("tail", json!({ "type": "integer", "minimum": 1, "description": "Lines fetched per container" })),
                ],
                &["namespace", "deployment"],
            ),
        },
        ToolSpec {
            name: "map_service_topology",
            description: "Map services, ingresses, pods and inferred dependencies of one namespace",
            parameters: schema(&[("namespace", namespace_prop(false))], &["namespace"]),
        },
        ToolSpec {
            name: "list_endpoint_health",
            description: "Endpoint status of every service: healthy, degraded or dead",
            parameters: schema(&[("namespace", namespace_prop(true))], &[]),
        },
        ToolSpec {
            name: "analyze_service_connectivity",
            description: "Step-by-step connectivity checks for one service, from selector to ingress exposure",
            parameters: schema(
                &[("namespace", namespace_prop(false)), ("service", string_prop("Service name"))],
                &["namespace", "service"],
            ),
        },
    ]
}

pub fn find(name: &str) -> Option<ToolSpec> {
    registry().into_iter().find(|t| t.name == name)
}

fn parse<T: DeserializeOwned>(tool: &str, args: Value) -> Result<T> {
    let args = match args {
        Value::Null => Value::Object(Map::new()),
        other => other,
    };
    serde_json::from_value(args).map_err(|e| KdError::InvalidArgument(format!("{}: {}", tool, e)))
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(KdError::InvalidArgument(format!("'{}' must not be empty", field)));
    }
    Ok(())
}

/// Namespace for tools scoped to exactly one namespace; the all-namespace synonyms are rejected
fn require_namespace(tool: &str, value: &str) -> Result<()> {
    require("namespace", value)?;
    if namespace::normalize(Some(value)).is_none() {
        return Err(KdError::InvalidArgument(format!(
            "{} requires a specific namespace, not '{}'",
            tool,
            value.trim()
        )));
    }
    Ok(())
}

fn normalize(namespace: Option<String>) -> Option<String> {
    namespace::normalize(namespace.as_deref()).map(str::to_string)
}

/// Run a tool with default configuration
pub async fn invoke(cluster: &dyn ClusterAccess, name: &str, args: Value) -> Result<Report> {
    invoke_with(cluster, &AppConfig::default(), name, args).await
}

/// Run a tool, filling unset tunables from `config`
pub async fn invoke_with(cluster: &dyn ClusterAccess, config: &AppConfig, name: &str, args: Value) -> Result<Report> {
    debug!(tool = name, "invoking tool");
    match name {
        "diagnose_request_path" => {
            let mut input: RequestPathInput = parse(name, args)?;
            require("hostname", &input.hostname)?;
            input.namespace = normalize(input.namespace);
            diagnose_request_path(cluster, &input).await
        }
        "diagnose_service" => {
            let input: ServiceInput = parse(name, args)?;
            require_namespace(name, &input.namespace)?;
            require("service", &input.service)?;
            diagnose_service(cluster, &input).await
        }
        "cluster_health_overview" => cluster_health_overview(cluster, &parse::<ClusterInput>(name, args)?).await,
        "diagnose_pod" => {
            let input: PodInput = parse(name, args)?;
            require_namespace(name, &input.namespace)?;
            require("pod", &input.pod)?;
            diagnose_pod(cluster, &input).await
        }
        "find_unhealthy_pods" => {
            let mut input: UnhealthyPodsInput = parse(name, args)?;
            input.namespace = normalize(input.namespace);
            find_unhealthy_pods(cluster, &input).await
        }
        "diagnose_namespace" => {
            let input: NamespaceInput = parse(name, args)?;
            require_namespace(name, &input.namespace)?;
            diagnose_namespace(cluster, &input).await
        }
        "analyze_all_ingresses" => {
            let mut input: IngressAuditInput = parse(name, args)?;
            input.namespace = normalize(input.namespace);
            analyze_all_ingresses(cluster, &input).await
        }
        "analyze_network_policies" => {
            let input: NetworkPolicyInput = parse(name, args)?;
            require_namespace(name, &input.namespace)?;
            analyze_network_policies(cluster, &input).await
        }
        "analyze_resource_usage" => {
            let input: ResourceUsageInput = parse(name, args)?;
            require_namespace(name, &input.namespace)?;
            analyze_resource_usage(cluster, &input).await
        }
        "analyze_node_capacity" => analyze_node_capacity(cluster, &parse::<NodeCapacityInput>(name, args)?).await,
        "analyze_resource_efficiency" => {
            let mut input: EfficiencyInput = parse(name, args)?;
            input.namespace = normalize(input.namespace);
            analyze_resource_efficiency(cluster, &input).await
        }
        "check_resource_quotas" => {
            let mut input: QuotaInput = parse(name, args)?;
            input.namespace = normalize(input.namespace);
            input.warn_percent = input.warn_percent.or(Some(config.quota_warn_percent));
            check_resource_quotas(cluster, &input).await
        }
        "top_resource_consumers" => {
            let mut input: TopConsumersInput = parse(name, args)?;
            input.namespace = normalize(input.namespace);
            input.limit = input.limit.filter(|l| *l > 0).or(Some(config.top_limit));
            top_resource_consumers(cluster, &input).await
        }
        "check_dns_health" => check_dns_health(cluster, &parse::<DnsInput>(name, args)?).await,
        "analyze_service_logs" => {
            let mut input: ServiceLogsInput = parse(name, args)?;
            require_namespace(name, &input.namespace)?;
            require("deployment", &input.deployment)?;
            input.tail = input.tail.filter(|t| *t > 0).or(Some(config.default_tail_lines));
            analyze_service_logs(cluster, &input).await
        }
        "map_service_topology" => {
            let input: TopologyInput = parse(name, args)?;
            require_namespace(name, &input.namespace)?;
            map_service_topology(cluster, &input).await
        }
        "list_endpoint_health" => {
            let mut input: EndpointHealthInput = parse(name, args)?;
            input.namespace = normalize(input.namespace);
            list_endpoint_health(cluster, &input).await
        }
        "analyze_service_connectivity" => {
            let input: ConnectivityInput = parse(name, args)?;
            require_namespace(name, &input.namespace)?;
            require("service", &input.service)?;
            analyze_service_connectivity(cluster, &input).await
        }
        other => Err(KdError::UnknownTool(other.to_string())),
    }
}
