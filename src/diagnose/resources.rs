//! Resource engines: per-pod usage against requests and limits, node capacity,
//! cluster efficiency, quota usage and top consumers.
//!
//! Live usage comes from metrics-server and is always optional. When it is not
//! installed the engines still report requests, limits and allocatable
//! figures and mark usage as unavailable instead of rendering zeros.

use super::describe;
use super::health::{self, UsageLevel, CRITICAL_PERCENT, REQUEST_WARN_PERCENT};
use super::namespace;
use super::quantity::{cpu_millis, memory_bytes, node_quantities, pod_resources, CpuMem, Resources};
use super::topology;
use super::types::{Finding, Metrics, ResourceRef};
use super::{soft, top_n_by, Report};
use crate::client::{ClusterAccess, ListQuery, PodUsage};
use crate::error::Result;
use crate::mermaid::{Diagram, XyChart};
use crate::output::{format_bytes, percent, truncate_name};
use k8s_openapi::api::core::v1::{Node, Pod, ResourceQuota};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Rows in usage charts
const CHART_LIMIT: usize = 10;
/// Threshold line drawn on the pod usage chart
const CHART_THRESHOLD: f64 = 80.0;
/// Efficiency below this is flagged as significant overprovisioning
const EFFICIENCY_WARN_PERCENT: f64 = 30.0;
/// Efficiency below this earns a right-sizing hint
const EFFICIENCY_INFO_PERCENT: f64 = 50.0;

pub const DEFAULT_TOP_LIMIT: usize = 10;
pub const DEFAULT_QUOTA_WARN_PERCENT: f64 = 80.0;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceUsageInput {
    pub namespace: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeCapacityInput {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EfficiencyInput {
    #[serde(default)]
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuotaInput {
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub warn_percent: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Cpu,
    #[serde(alias = "mem")]
    Memory,
}

impl SortBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortBy::Cpu => "cpu",
            SortBy::Memory => "memory",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopConsumersInput {
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default, alias = "resource")]
    pub sort_by: SortBy,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Per-pod usage classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PodCategory {
    Critical,
    Warning,
    Overprovisioned,
    MissingLimits,
    Ok,
}

impl PodCategory {
    pub fn label(&self) -> &'static str {
        match self {
            PodCategory::Critical => "CRITICAL",
            PodCategory::Warning => "WARNING",
            PodCategory::Overprovisioned => "OVERPROVISIONED",
            PodCategory::MissingLimits => "MISSING LIMITS",
            PodCategory::Ok => "OK",
        }
    }
}

/// Requests, limits and optional live usage of one pod
#[derive(Debug, Clone, PartialEq)]
pub struct PodUsageAnalysis {
    pub namespace: String,
    pub name: String,
    pub resources: Resources,
    pub usage: Option<CpuMem>,
}

impl PodUsageAnalysis {
    pub fn new(pod: &Pod, usage: Option<&PodUsage>) -> Self {
        Self {
            namespace: describe::namespace(&pod.metadata).to_string(),
            name: describe::name(&pod.metadata).to_string(),
            resources: pod_resources(pod),
            usage: usage.map(PodUsage::total),
        }
    }

    pub fn cpu_pct_of_limit(&self) -> Option<f64> {
        let used = self.usage?;
        (self.resources.limits.cpu_millis > 0).then(|| percent(used.cpu_millis, self.resources.limits.cpu_millis))
    }

    pub fn mem_pct_of_limit(&self) -> Option<f64> {
        let used = self.usage?;
        (self.resources.limits.memory_bytes > 0)
            .then(|| percent(used.memory_bytes, self.resources.limits.memory_bytes))
    }

    pub fn cpu_pct_of_request(&self) -> Option<f64> {
        let used = self.usage?;
        (self.resources.requests.cpu_millis > 0)
            .then(|| percent(used.cpu_millis, self.resources.requests.cpu_millis))
    }

    pub fn mem_pct_of_request(&self) -> Option<f64> {
        let used = self.usage?;
        (self.resources.requests.memory_bytes > 0)
            .then(|| percent(used.memory_bytes, self.resources.requests.memory_bytes))
    }

    fn level_of(pct: Option<f64>) -> UsageLevel {
        pct.map(health::usage_level).unwrap_or(UsageLevel::Normal)
    }

    /// Either metric over a threshold decides; the two are never averaged
    pub fn category(&self) -> PodCategory {
        let r = &self.resources;
        if r.missing_limits() && r.missing_requests() {
            return PodCategory::MissingLimits;
        }
        let cpu = Self::level_of(self.cpu_pct_of_limit());
        let mem = Self::level_of(self.mem_pct_of_limit());
        if cpu == UsageLevel::Critical || mem == UsageLevel::Critical {
            return PodCategory::Critical;
        }
        if cpu == UsageLevel::Warning || mem == UsageLevel::Warning {
            return PodCategory::Warning;
        }
        if let (Some(cpu_req), Some(mem_req)) = (self.cpu_pct_of_request(), self.mem_pct_of_request()) {
            if health::is_overprovisioned(cpu_req) && health::is_overprovisioned(mem_req) {
                return PodCategory::Overprovisioned;
            }
        }
        if r.missing_limits() {
            return PodCategory::MissingLimits;
        }
        PodCategory::Ok
    }

    /// Requested minus used, never negative
    pub fn waste(&self) -> Option<CpuMem> {
        self.usage.map(|used| waste(self.resources.requests, used))
    }
}

/// Requested minus used per resource, floored at zero
pub fn waste(requested: CpuMem, used: CpuMem) -> CpuMem {
    CpuMem {
        cpu_millis: (requested.cpu_millis - used.cpu_millis).max(0),
        memory_bytes: (requested.memory_bytes - used.memory_bytes).max(0),
    }
}

fn pct_cell(pct: Option<f64>) -> String {
    pct.map(|p| format!("{:.1}%", p)).unwrap_or_else(|| "N/A".to_string())
}

fn usage_map(metrics: &Metrics<BTreeMap<String, PodUsage>>) -> Option<&BTreeMap<String, PodUsage>> {
    metrics.available().filter(|m| !m.is_empty())
}

pub async fn analyze_resource_usage(cluster: &dyn ClusterAccess, input: &ResourceUsageInput) -> Result<Report> {
    let ns = input.namespace.as_str();
    let pods = cluster.list_pods(Some(ns), &ListQuery::default()).await?;
    let metrics = topology::fetch_pod_metrics(cluster, Some(ns), None).await?;
    let usage = usage_map(&metrics);

    let mut report = Report::new(format!("Resource Usage Analysis (namespace: {})", ns));
    if usage.is_none() {
        warn!(namespace = ns, "pod metrics unavailable");
        report.note("metrics-server not available: usage data unavailable");
    }

    let analyses: Vec<PodUsageAnalysis> = pods
        .iter()
        .filter(|p| health::is_pod_active(p))
        .map(|p| {
            let key = format!("{}/{}", describe::namespace(&p.metadata), describe::name(&p.metadata));
            PodUsageAnalysis::new(p, usage.and_then(|u| u.get(&key)))
        })
        .collect();

    let count = |c: PodCategory| analyses.iter().filter(|a| a.category() == c).count();
    report.subsection("Summary");
    report.kv("Active Pods Analyzed", analyses.len().to_string());
    report.kv("CRITICAL (>90% of limit)", count(PodCategory::Critical).to_string());
    report.kv("WARNING (>70% of limit)", count(PodCategory::Warning).to_string());
    report.kv("OVERPROVISIONED (<30% of request)", count(PodCategory::Overprovisioned).to_string());
    report.kv("MISSING LIMITS/REQUESTS", count(PodCategory::MissingLimits).to_string());

    let mut requests = CpuMem::default();
    let mut limits = CpuMem::default();
    let mut used = CpuMem::default();
    for a in &analyses {
        requests.add(a.resources.requests);
        limits.add(a.resources.limits);
        if let Some(u) = a.usage {
            used.add(u);
        }
    }
    report.line("\n  Namespace Totals:");
    report.line(format!(
        "    CPU Requests: {}m, Limits: {}m, Usage: {}",
        requests.cpu_millis,
        limits.cpu_millis,
        if usage.is_some() { format!("{}m", used.cpu_millis) } else { "N/A".to_string() }
    ));
    report.line(format!(
        "    Memory Requests: {}, Limits: {}, Usage: {}",
        format_bytes(requests.memory_bytes),
        format_bytes(limits.memory_bytes),
        if usage.is_some() { format_bytes(used.memory_bytes) } else { "N/A".to_string() }
    ));

    report.subsection("Pod Resource Details");
    let rows: Vec<Vec<String>> = analyses
        .iter()
        .map(|a| {
            let cpu_used = a.usage.map_or_else(|| "N/A".to_string(), |u| format!("{}m", u.cpu_millis));
            let mem_used = a.usage.map_or_else(|| "N/A".to_string(), |u| format_bytes(u.memory_bytes));
            vec![
                truncate_name(&a.name, 40),
                a.category().label().to_string(),
                format!("{}/{}m/{}m", cpu_used, a.resources.requests.cpu_millis, a.resources.limits.cpu_millis),
                pct_cell(a.cpu_pct_of_limit()),
                format!(
                    "{}/{}/{}",
                    mem_used,
                    format_bytes(a.resources.requests.memory_bytes),
                    format_bytes(a.resources.limits.memory_bytes)
                ),
                pct_cell(a.mem_pct_of_limit()),
            ]
        })
        .collect();
    report.table(&["POD", "CATEGORY", "CPU USE/REQ/LIM", "CPU%LIM", "MEM USE/REQ/LIM", "MEM%LIM"], &rows);

    for a in &analyses {
        let subject = ResourceRef::pod(&a.namespace, &a.name);
        let u = a.usage.unwrap_or_default();
        match a.category() {
            PodCategory::Critical | PodCategory::Warning => {
                if let Some(pct) = a.cpu_pct_of_limit() {
                    match health::usage_level(pct) {
                        UsageLevel::Critical => report.add(
                            Finding::critical(format!(
                                "Pod '{}' CPU usage at {:.1}% of limit ({}m/{}m)",
                                a.name, pct, u.cpu_millis, a.resources.limits.cpu_millis
                            ))
                            .with_subject(subject.clone()),
                        ),
                        UsageLevel::Warning => report.add(
                            Finding::warning(format!("Pod '{}' CPU usage at {:.1}% of limit", a.name, pct))
                                .with_subject(subject.clone()),
                        ),
                        UsageLevel::Normal => {}
                    }
                }
                if let Some(pct) = a.mem_pct_of_limit() {
                    match health::usage_level(pct) {
                        UsageLevel::Critical => report.add(
                            Finding::critical(format!(
                                "Pod '{}' memory usage at {:.1}% of limit ({}/{}): OOM risk",
                                a.name,
                                pct,
                                format_bytes(u.memory_bytes),
                                format_bytes(a.resources.limits.memory_bytes)
                            ))
                            .with_subject(subject.clone())
                            .with_remediation(format!("Increase memory limit for pod '{}'", a.name)),
                        ),
                        UsageLevel::Warning => report.add(
                            Finding::warning(format!("Pod '{}' memory usage at {:.1}% of limit", a.name, pct))
                                .with_subject(subject.clone()),
                        ),
                        UsageLevel::Normal => {}
                    }
                }
            }
            PodCategory::Overprovisioned => report.add(
                Finding::info(format!(
                    "Pod '{}' is overprovisioned: CPU {:.1}% of request, memory {:.1}% of request",
                    a.name,
                    a.cpu_pct_of_request().unwrap_or(0.0),
                    a.mem_pct_of_request().unwrap_or(0.0)
                ))
                .with_subject(subject)
                .with_remediation("Reduce requests on overprovisioned pods"),
            ),
            PodCategory::MissingLimits => report.add(
                Finding::warning(format!("Pod '{}' is missing resource limits/requests", a.name))
                    .with_subject(subject)
                    .with_remediation("Set CPU and memory requests and limits on every container"),
            ),
            PodCategory::Ok => {}
        }
    }

    if usage.is_some() {
        let charted: Vec<(String, f64)> = analyses
            .iter()
            .filter_map(|a| a.cpu_pct_of_limit().map(|p| (truncate_name(&a.name, 15), p)))
            .collect();
        let mut chart =
            XyChart::new("Top Pods by CPU Usage % of Limit", "CPU Usage % of Limit", 0.0, 120.0).with_threshold(CHART_THRESHOLD);
        for (name, pct) in top_n_by(&charted, CHART_LIMIT, |e| e.1) {
            chart.bar(name.clone(), *pct);
        }
        if !chart.is_empty() {
            report.diagram(Diagram::Chart { heading: "RESOURCE USAGE CHART".into(), chart });
        }
    }
    Ok(report)
}

/// Capacity, requests and optional usage of one node
#[derive(Debug, Clone, PartialEq)]
pub struct NodeCapacity {
    pub name: String,
    pub allocatable: CpuMem,
    pub pod_capacity: i64,
    pub requests: CpuMem,
    pub pod_count: usize,
    pub usage: Option<CpuMem>,
    pub conditions: Vec<String>,
}

impl NodeCapacity {
    pub fn cpu_request_pct(&self) -> f64 {
        percent(self.requests.cpu_millis, self.allocatable.cpu_millis)
    }

    pub fn mem_request_pct(&self) -> f64 {
        percent(self.requests.memory_bytes, self.allocatable.memory_bytes)
    }

    pub fn cpu_usage_pct(&self) -> Option<f64> {
        self.usage.map(|u| percent(u.cpu_millis, self.allocatable.cpu_millis))
    }

    pub fn mem_usage_pct(&self) -> Option<f64> {
        self.usage.map(|u| percent(u.memory_bytes, self.allocatable.memory_bytes))
    }

    /// Allocatable minus requested; negative when overcommitted
    pub fn headroom(&self) -> CpuMem {
        CpuMem {
            cpu_millis: self.allocatable.cpu_millis - self.requests.cpu_millis,
            memory_bytes: self.allocatable.memory_bytes - self.requests.memory_bytes,
        }
    }
}

/// Sum of requests and active pod count per node name
pub fn requests_by_node<'a>(pods: impl IntoIterator<Item = &'a Pod>) -> BTreeMap<String, (CpuMem, usize)> {
    let mut by_node: BTreeMap<String, (CpuMem, usize)> = BTreeMap::new();
    for pod in pods.into_iter().filter(|p| health::is_pod_active(p)) {
        let node = pod.spec.as_ref().and_then(|s| s.node_name.as_deref()).unwrap_or("");
        if node.is_empty() {
            continue;
        }
        let entry = by_node.entry(node.to_string()).or_default();
        entry.0.add(pod_resources(pod).requests);
        entry.1 += 1;
    }
    by_node
}

pub fn node_capacity(node: &Node, requests: Option<&(CpuMem, usize)>, usage: Option<CpuMem>) -> NodeCapacity {
    let (allocatable, pod_capacity) = node_quantities(node.status.as_ref().and_then(|s| s.allocatable.as_ref()));
    let mut conditions = Vec::new();
    if health::node_status(node) == "NotReady" {
        conditions.push("NotReady".to_string());
    }
    conditions.extend(health::node_pressures(node));
    let (req, count) = requests.copied().unwrap_or_default();
    NodeCapacity {
        name: describe::name(&node.metadata).to_string(),
        allocatable,
        pod_capacity,
        requests: req,
        pod_count: count,
        usage,
        conditions,
    }
}

fn flag_request_pressure(report: &mut Report, node: &str, resource: &str, pct: f64) {
    let subject = ResourceRef::node(node);
    if pct > CRITICAL_PERCENT {
        report.add(
            Finding::critical(format!(
                "Node '{}' {} requests at {:.1}% of allocatable: scheduling may fail",
                node, resource, pct
            ))
            .with_subject(subject)
            .with_remediation("Add nodes or reduce requests on the busiest nodes"),
        );
    } else if pct > REQUEST_WARN_PERCENT {
        report.add(
            Finding::warning(format!("Node '{}' {} requests at {:.1}% of allocatable", node, resource, pct)).with_subject(subject),
        );
    }
}

pub async fn analyze_node_capacity(cluster: &dyn ClusterAccess, _input: &NodeCapacityInput) -> Result<Report> {
    let nodes = cluster.list_nodes().await?;
    let pods = cluster.list_pods(None, &ListQuery::default()).await?;
    let metrics = topology::fetch_node_metrics(cluster).await?;
    let usage = metrics.available().filter(|m| !m.is_empty());

    let mut report = Report::new("Node Capacity Analysis");
    if usage.is_none() {
        warn!("node metrics unavailable");
        report.note("metrics-server not available: actual usage data unavailable");
    }

    let requests = requests_by_node(&pods);
    let analyses: Vec<NodeCapacity> = nodes
        .iter()
        .map(|n| {
            let name = describe::name(&n.metadata);
            node_capacity(n, requests.get(name), usage.and_then(|u| u.get(name)).map(|u| u.usage))
        })
        .collect();

    let rows: Vec<Vec<String>> = analyses
        .iter()
        .map(|n| {
            vec![
                n.name.clone(),
                format!("{}/{}", n.pod_count, n.pod_capacity),
                format!("{}m", n.allocatable.cpu_millis),
                format!("{}m", n.requests.cpu_millis),
                format!("{:.1}%", n.cpu_request_pct()),
                n.usage.map(|u| format!("{}m", u.cpu_millis)).unwrap_or_else(|| "N/A".to_string()),
                pct_cell(n.cpu_usage_pct()),
                format_bytes(n.allocatable.memory_bytes),
                format!("{:.1}%", n.mem_request_pct()),
                pct_cell(n.mem_usage_pct()),
                if n.conditions.is_empty() { "OK".to_string() } else { n.conditions.join(",") },
            ]
        })
        .collect();
    report.table(
        &[
            "NODE", "PODS", "CPU ALLOC", "CPU REQ", "CPU REQ%", "CPU USE", "CPU USE%", "MEM ALLOC", "MEM REQ%", "MEM USE%",
            "CONDITIONS",
        ],
        &rows,
    );

    report.subsection("Scheduling Headroom");
    let headroom: Vec<Vec<String>> = analyses
        .iter()
        .map(|n| {
            let h = n.headroom();
            vec![n.name.clone(), format!("{}m", h.cpu_millis), format_bytes(h.memory_bytes)]
        })
        .collect();
    report.table(&["NODE", "CPU HEADROOM", "MEMORY HEADROOM"], &headroom);

    for n in &analyses {
        let subject = ResourceRef::node(&n.name);
        for condition in &n.conditions {
            if condition == "NotReady" {
                report.add(Finding::critical(format!("Node '{}' is NotReady", n.name)).with_subject(subject.clone()));
            } else {
                report.add(Finding::warning(format!("Node '{}' has {}", n.name, condition)).with_subject(subject.clone()));
            }
        }
        flag_request_pressure(&mut report, &n.name, "CPU", n.cpu_request_pct());
        flag_request_pressure(&mut report, &n.name, "memory", n.mem_request_pct());
        if let Some(pct) = n.cpu_usage_pct().filter(|p| *p > CRITICAL_PERCENT) {
            report.add(
                Finding::critical(format!("Node '{}' actual CPU utilization at {:.1}%", n.name, pct)).with_subject(subject.clone()),
            );
        }
        if let Some(pct) = n.mem_usage_pct().filter(|p| *p > CRITICAL_PERCENT) {
            report.add(
                Finding::critical(format!("Node '{}' actual memory utilization at {:.1}%", n.name, pct))
                    .with_subject(subject.clone()),
            );
        }
        let h = n.headroom();
        if h.cpu_millis < 0 {
            report.add(
                Finding::warning(format!("Node '{}' is overcommitted on CPU by {}m", n.name, -h.cpu_millis))
                    .with_subject(subject.clone()),
            );
        }
        if h.memory_bytes < 0 {
            report.add(
                Finding::warning(format!(
                    "Node '{}' is overcommitted on memory by {}",
                    n.name,
                    format_bytes(-h.memory_bytes)
                ))
                .with_subject(subject),
            );
        }
    }

    if !analyses.is_empty() {
        let y_title = if usage.is_some() { "CPU Utilization %" } else { "CPU Request Utilization %" };
        let mut chart = XyChart::new("Per-Node CPU Utilization", y_title, 0.0, 120.0);
        for n in &analyses {
            chart.bar(truncate_name(&n.name, 15), n.cpu_usage_pct().unwrap_or_else(|| n.cpu_request_pct()));
        }
        report.diagram(Diagram::Chart { heading: "NODE CPU UTILIZATION CHART".into(), chart });
    }
    Ok(report)
}

pub async fn analyze_resource_efficiency(cluster: &dyn ClusterAccess, input: &EfficiencyInput) -> Result<Report> {
    let scope = namespace::normalize(input.namespace.as_deref());
    let pods = cluster.list_pods(scope, &ListQuery::default()).await?;
    let metrics = topology::fetch_pod_metrics(cluster, scope, None).await?;
    let usage = usage_map(&metrics);

    let mut report = Report::new(format!("Resource Efficiency Report (scope: {})", namespace::display(scope)));

    let active: Vec<&Pod> = pods.iter().filter(|p| health::is_pod_active(p)).collect();
    let analyses: Vec<PodUsageAnalysis> = active
        .iter()
        .map(|p| {
            let key = format!("{}/{}", describe::namespace(&p.metadata), describe::name(&p.metadata));
            PodUsageAnalysis::new(p, usage.and_then(|u| u.get(&key)))
        })
        .collect();

    let mut requested = CpuMem::default();
    let mut limited = CpuMem::default();
    let mut used = CpuMem::default();
    let mut no_requests = Vec::new();
    let mut no_limits = Vec::new();
    for a in &analyses {
        requested.add(a.resources.requests);
        limited.add(a.resources.limits);
        if let Some(u) = a.usage {
            used.add(u);
        }
        if a.resources.requests.is_zero() {
            no_requests.push(format!("{}/{}", a.namespace, a.name));
        }
        if a.resources.limits.is_zero() {
            no_limits.push(format!("{}/{}", a.namespace, a.name));
        }
    }

    report.subsection("Waste Analysis");
    let cpu_eff = percent(used.cpu_millis, requested.cpu_millis);
    let mem_eff = percent(used.memory_bytes, requested.memory_bytes);
    if usage.is_some() {
        let wasted = waste(requested, used);
        report.kv("Total CPU Requested", format!("{}m", requested.cpu_millis));
        report.kv("Total CPU Used", format!("{}m", used.cpu_millis));
        report.kv("Total CPU Waste", format!("{}m (efficiency: {:.1}%)", wasted.cpu_millis, cpu_eff));
        report.kv("Total Memory Requested", format_bytes(requested.memory_bytes));
        report.kv("Total Memory Used", format_bytes(used.memory_bytes));
        report.kv(
            "Total Memory Waste",
            format!("{} (efficiency: {:.1}%)", format_bytes(wasted.memory_bytes), mem_eff),
        );
    } else {
        report.note("metrics-server not available: waste calculations unavailable");
        report.kv(
            "Total CPU Requested",
            format!("{}m, Limits: {}m", requested.cpu_millis, limited.cpu_millis),
        );
        report.kv(
            "Total Memory Requested",
            format!("{}, Limits: {}", format_bytes(requested.memory_bytes), format_bytes(limited.memory_bytes)),
        );
    }

    match soft(cluster.list_nodes().await)? {
        Ok(nodes) if !nodes.is_empty() => {
            report.subsection("Bin Packing Efficiency (per Node)");
            let by_node = requests_by_node(active.iter().copied());
            let rows: Vec<Vec<String>> = nodes
                .iter()
                .map(|n| {
                    let cap = node_capacity(n, by_node.get(describe::name(&n.metadata)), None);
                    vec![
                        cap.name.clone(),
                        cap.pod_count.to_string(),
                        format!("{:.1}%", cap.cpu_request_pct()),
                        format!("{:.1}%", cap.mem_request_pct()),
                    ]
                })
                .collect();
            report.table(&["NODE", "PODS", "CPU PACKING", "MEMORY PACKING"], &rows);
        }
        Ok(_) => {}
        Err(e) => report.note(format!("could not list nodes: {}", e)),
    }

    if usage.is_some() {
        report.subsection("Right-Sizing Opportunities");
        let candidates: Vec<&PodUsageAnalysis> = analyses
            .iter()
            .filter(|a| !a.resources.requests.is_zero())
            .filter(|a| {
                a.cpu_pct_of_request().map_or(false, health::is_overprovisioned)
                    || a.mem_pct_of_request().map_or(false, health::is_overprovisioned)
            })
            .collect();
        if candidates.is_empty() {
            report.line("  No pods with usage below 30% of requests found.");
        } else {
            let rows: Vec<Vec<String>> = candidates
                .iter()
                .map(|a| {
                    let u = a.usage.unwrap_or_default();
                    vec![
                        truncate_name(&a.name, 35),
                        a.namespace.clone(),
                        format!("{}m/{}m", u.cpu_millis, a.resources.requests.cpu_millis),
                        format!("{:.1}%", a.cpu_pct_of_request().unwrap_or(0.0)),
                        format!("{}/{}", format_bytes(u.memory_bytes), format_bytes(a.resources.requests.memory_bytes)),
                        format!("{:.1}%", a.mem_pct_of_request().unwrap_or(0.0)),
                    ]
                })
                .collect();
            report.table(&["POD", "NAMESPACE", "CPU USE/REQ", "CPU%", "MEM USE/REQ", "MEM%"], &rows);
        }
    }

    if !no_requests.is_empty() {
        report.flag(
            Finding::warning(format!("{} pods have no resource requests set", no_requests.len())).with_remediation(format!(
                "Set resource requests on all {} pods without them to improve scheduling reliability",
                no_requests.len()
            )),
        );
        for p in &no_requests {
            report.line(format!("    - {}", p));
        }
    }
    if !no_limits.is_empty() {
        report.flag(
            Finding::warning(format!("{} pods have no resource limits set", no_limits.len())).with_remediation(format!(
                "Set resource limits on all {} pods without them to prevent resource contention",
                no_limits.len()
            )),
        );
        for p in &no_limits {
            report.line(format!("    - {}", p));
        }
    }

    if usage.is_some() {
        let wasted = waste(requested, used);
        if requested.cpu_millis > 0 {
            efficiency_finding(
                &mut report,
                "CPU",
                cpu_eff,
                format!("Reduce CPU requests for overprovisioned pods to reclaim {}m of wasted CPU", wasted.cpu_millis),
            );
        }
        if requested.memory_bytes > 0 {
            efficiency_finding(
                &mut report,
                "memory",
                mem_eff,
                format!(
                    "Reduce memory requests for overprovisioned pods to reclaim {} of wasted memory",
                    format_bytes(wasted.memory_bytes)
                ),
            );
        }
    }
    Ok(report)
}

fn efficiency_finding(report: &mut Report, resource: &str, efficiency: f64, remediation: String) {
    if efficiency < EFFICIENCY_WARN_PERCENT {
        report.add(
            Finding::warning(format!(
                "Overall {} efficiency is only {:.1}%: significant overprovisioning",
                resource, efficiency
            ))
            .with_remediation(remediation),
        );
    } else if efficiency < EFFICIENCY_INFO_PERCENT {
        report.add(
            Finding::info(format!("{} efficiency at {:.1}%: consider right-sizing workloads", resource, efficiency))
                .with_remediation(remediation),
        );
    }
}

/// One hard limit of a quota with its current usage
#[derive(Debug, Clone, PartialEq)]
pub struct QuotaLine {
    pub resource: String,
    pub used: String,
    pub hard: String,
    pub percent: f64,
}

fn quota_amount(resource: &str, raw: &str) -> i64 {
    if resource == "cpu" || resource.ends_with(".cpu") {
        cpu_millis(raw)
    } else {
        memory_bytes(raw)
    }
}

/// Used/hard per resource, in resource name order
pub fn quota_lines(quota: &ResourceQuota) -> Vec<QuotaLine> {
    let status = quota.status.as_ref();
    let used = status.and_then(|s| s.used.as_ref());
    status
        .and_then(|s| s.hard.as_ref())
        .map(|hard| {
            hard.iter()
                .map(|(resource, h)| {
                    let u = used.and_then(|m| m.get(resource)).map(|q| q.0.clone()).unwrap_or_else(|| "0".to_string());
                    QuotaLine {
                        resource: resource.clone(),
                        percent: percent(quota_amount(resource, &u), quota_amount(resource, &h.0)),
                        used: u,
                        hard: h.0.clone(),
                    }
                })
                .collect()
        })
        .unwrap_or_default()
}

pub async fn check_resource_quotas(cluster: &dyn ClusterAccess, input: &QuotaInput) -> Result<Report> {
    let scope = namespace::normalize(input.namespace.as_deref());
    let warn_at = input.warn_percent.unwrap_or(DEFAULT_QUOTA_WARN_PERCENT);
    let quotas = cluster.list_resource_quotas(scope).await?;
    let mut report = Report::new(format!("Resource Quota Usage (namespace: {})", namespace::display(scope)));

    if quotas.is_empty() {
        report.line("No resource quotas found.");
        return Ok(report);
    }

    let mut warnings = 0;
    for q in &quotas {
        let ns = describe::namespace(&q.metadata);
        let name = describe::name(&q.metadata);
        report.subsection(&format!("Namespace: {}, Quota: {}", ns, name));
        let lines = quota_lines(q);
        let rows: Vec<Vec<String>> = lines
            .iter()
            .map(|l| {
                let mut pct = format!("{:.1}%", l.percent);
                if l.percent >= warn_at {
                    pct.push_str(" [WARNING]");
                }
                vec![l.resource.clone(), l.used.clone(), l.hard.clone(), pct]
            })
            .collect();
        report.table(&["RESOURCE", "USED", "HARD", "USAGE %"], &rows);
        for l in lines.iter().filter(|l| l.percent >= warn_at) {
            warnings += 1;
            report.add(
                Finding::warning(format!(
                    "Quota '{}' in namespace '{}': {} at {:.1}% ({}/{})",
                    name, ns, l.resource, l.percent, l.used, l.hard
                ))
                .with_subject(ResourceRef::new("ResourceQuota", Some(ns), name))
                .with_remediation(format!("Raise quota '{}' or reduce usage in namespace '{}'", name, ns)),
            );
        }
    }
    report.line(format!("\nTotal: {} quotas checked, {} warnings", quotas.len(), warnings));
    Ok(report)
}

pub async fn top_resource_consumers(cluster: &dyn ClusterAccess, input: &TopConsumersInput) -> Result<Report> {
    let scope = namespace::normalize(input.namespace.as_deref());
    let limit = input.limit.filter(|l| *l > 0).unwrap_or(DEFAULT_TOP_LIMIT);
    let mut report = Report::new(format!(
        "Top {} Resource Consumers by {} (namespace: {})",
        limit,
        input.sort_by.as_str(),
        namespace::display(scope)
    ));

    let metrics = topology::fetch_pod_metrics(cluster, scope, None).await?;
    let Some(usage) = metrics.available() else {
        report.note("metrics-server not available: usage ranking requires pod metrics");
        return Ok(report);
    };
    if usage.is_empty() {
        report.line("No pod metrics reported.");
        return Ok(report);
    }

    let totals: Vec<(&PodUsage, CpuMem)> = usage.values().map(|u| (u, u.total())).collect();
    let top = top_n_by(&totals, limit, |(_, t)| match input.sort_by {
        SortBy::Cpu => t.cpu_millis as f64,
        SortBy::Memory => t.memory_bytes as f64,
    });

    let rows: Vec<Vec<String>> = top
        .iter()
        .enumerate()
        .map(|(i, (u, t))| {
            vec![
                (i + 1).to_string(),
                u.name.clone(),
                u.namespace.clone(),
                format!("{}m", t.cpu_millis),
                format_bytes(t.memory_bytes),
            ]
        })
        .collect();
    report.table(&["#", "POD", "NAMESPACE", "CPU", "MEMORY"], &rows);

    let (title, y_title) = match input.sort_by {
        SortBy::Cpu => ("Top Pods by CPU", "CPU (millicores)"),
        SortBy::Memory => ("Top Pods by Memory", "Memory (MiB)"),
    };
    let values: Vec<f64> = top
        .iter()
        .map(|(_, t)| match input.sort_by {
            SortBy::Cpu => t.cpu_millis as f64,
            SortBy::Memory => t.memory_bytes as f64 / 1_048_576.0,
        })
        .collect();
    let max = values.iter().copied().fold(0.0_f64, f64::max);
    let mut chart = XyChart::new(title, y_title, 0.0, (max * 1.2).ceil().max(1.0));
    for ((u, _), v) in top.iter().zip(values) {
        chart.bar(truncate_name(&u.name, 15), v);
    }
    report.diagram(Diagram::Chart { heading: "TOP CONSUMERS CHART".into(), chart });
    Ok(report)
}
