//! CLI command definitions using clap

use crate::config::OutputFormat;
use crate::diagnose::resources::SortBy;
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};

/// Namespace used by namespaced tools when `-n` is not given
pub const DEFAULT_NAMESPACE: &str = "default";

#[derive(Parser)]
#[command(
    name = "kd",
    version,
    about = "Diagnose Kubernetes request paths, services and cluster health",
    long_about = None,
)]
pub struct Cli {
    /// Kubernetes context to use
    #[arg(long, global = true, env = "KD_CONTEXT")]
    pub context: Option<String>,

    /// Namespace to use ("all" for every namespace)
    #[arg(short = 'n', long, global = true, env = "KD_NAMESPACE")]
    pub namespace: Option<String>,

    /// Output format (defaults to the configured format)
    #[arg(short = 'o', long, global = true, value_enum)]
    pub output: Option<OutputFormat>,

    /// Enable verbose logging
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    // === Request path & services ===
    /// Trace a request through Ingress, Service and Pods
    Trace(TraceArgs),

    /// Diagnose a service
    #[command(alias = "svc")]
    Service(NameArgs),

    /// Step-by-step connectivity checks for a service
    #[command(alias = "conn")]
    Connectivity(NameArgs),

    /// Endpoint status of every service
    #[command(alias = "ep")]
    Endpoints,

    /// Service topology map of a namespace
    Topology,

    // === Workloads ===
    /// Diagnose a pod
    #[command(alias = "po")]
    Pod(NameArgs),

    /// Namespace health
    #[command(alias = "ns")]
    Namespace,

    /// Pods that are not running and ready
    Unhealthy,

    /// Scan a deployment's logs for error patterns
    Logs(LogsArgs),

    // === Cluster ===
    /// Cluster-wide health overview
    Cluster,

    /// Audit ingresses
    #[command(alias = "ing")]
    Ingresses,

    /// Explain network policies
    Netpol,

    /// CoreDNS health
    Dns,

    // === Resources ===
    /// Per-pod usage against requests and limits
    Resources,

    /// Node capacity and scheduling headroom
    #[command(alias = "no")]
    Nodes,

    /// Resource waste and right-sizing
    Efficiency,

    /// Resource quota usage
    Quotas(QuotaArgs),

    /// Top CPU or memory consumers
    Top(TopArgs),

    // === Tool surface ===
    /// List available tools
    Tools,

    /// Call a tool by name with JSON arguments
    Call(CallArgs),

    /// Serve the tools over HTTP
    Serve(ServeArgs),

    // === Completions ===
    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Clone)]
pub struct TraceArgs {
    /// Host the request is sent to
    pub hostname: String,

    /// Request path
    #[arg(long, default_value = "/")]
    pub path: String,
}

#[derive(Args, Clone)]
pub struct NameArgs {
    /// Resource name
    pub name: String,
}

#[derive(Args, Clone)]
pub struct LogsArgs {
    /// Deployment name
    pub deployment: String,

    /// Regular expression matched per line
    #[arg(short = 'p', long)]
    pub pattern: Option<String>,

    /// Number of lines to fetch per container
    #[arg(long)]
    pub tail: Option<i64>,
}

#[derive(Args, Clone)]
pub struct QuotaArgs {
    /// Usage percentage flagged as a warning
    #[arg(long)]
    pub warn_percent: Option<f64>,
}

#[derive(Args, Clone)]
pub struct TopArgs {
    /// Sort by cpu or memory
    #[arg(long, default_value = "cpu", value_parser = parse_sort_by)]
    pub sort_by: SortBy,

    /// Number of pods to show
    #[arg(short = 'l', long)]
    pub limit: Option<usize>,
}

fn parse_sort_by(s: &str) -> Result<SortBy, String> {
    serde_json::from_value(Value::String(s.to_lowercase())).map_err(|_| format!("invalid sort key '{}', expected cpu or memory", s))
}

#[derive(Args, Clone)]
pub struct CallArgs {
    /// Tool name
    pub tool: String,

    /// Arguments as a JSON object
    #[arg(default_value = "{}")]
    pub args: String,
}

#[derive(Args, Clone)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(short = 'p', long, default_value = "8080")]
    pub port: u16,

    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    pub bind: String,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}

impl Command {
    /// Tool name and JSON arguments for subcommands that map onto a single tool.
    ///
    /// Namespaced tools fall back to [`DEFAULT_NAMESPACE`]; tools that accept
    /// all namespaces pass `namespace` through untouched.
    pub fn tool_call(&self, namespace: Option<&str>) -> Option<(&'static str, Value)> {
        let ns = namespace.unwrap_or(DEFAULT_NAMESPACE);
        let call = match self {
            Command::Trace(a) => (
                "diagnose_request_path",
                json!({ "hostname": a.hostname, "path": a.path, "namespace": namespace }),
            ),
            Command::Service(a) => ("diagnose_service", json!({ "namespace": ns, "service": a.name })),
            Command::Connectivity(a) => ("analyze_service_connectivity", json!({ "namespace": ns, "service": a.name })),
            Command::Endpoints => ("list_endpoint_health", json!({ "namespace": namespace })),
            Command::Topology => ("map_service_topology", json!({ "namespace": ns })),
            Command::Pod(a) => ("diagnose_pod", json!({ "namespace": ns, "pod": a.name })),
            Command::Namespace => ("diagnose_namespace", json!({ "namespace": ns })),
            Command::Unhealthy => ("find_unhealthy_pods", json!({ "namespace": namespace })),
            Command::Logs(a) => (
                "analyze_service_logs",
                json!({ "namespace": ns, "deployment": a.deployment, "pattern": a.pattern, "tail": a.tail }),
            ),
            Command::Cluster => ("cluster_health_overview", json!({})),
            Command::Ingresses => ("analyze_all_ingresses", json!({ "namespace": namespace })),
            Command::Netpol => ("analyze_network_policies", json!({ "namespace": ns })),
            Command::Dns => ("check_dns_health", json!({})),
            Command::Resources => ("analyze_resource_usage", json!({ "namespace": ns })),
            Command::Nodes => ("analyze_node_capacity", json!({})),
            Command::Efficiency => ("analyze_resource_efficiency", json!({ "namespace": namespace })),
            Command::Quotas(a) => (
                "check_resource_quotas",
                json!({ "namespace": namespace, "warn_percent": a.warn_percent }),
            ),
            Command::Top(a) => (
                "top_resource_consumers",
                json!({ "namespace": namespace, "sort_by": a.sort_by.as_str(), "limit": a.limit }),
            ),
            Command::Tools | Command::Call(_) | Command::Serve(_) | Command::Completions(_) => return None,
        };
        Some(call)
    }
}
