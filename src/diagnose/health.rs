//! Health predicates over single resource snapshots
//!
//! The thresholds here are shared by every engine; no engine defines its own.

use super::types::HealthVerdict;
use k8s_openapi::api::core::v1::{Container, ContainerStatus, Node, Pod};

/// Restart count above which a pod is flagged
pub const HIGH_RESTART_THRESHOLD: i32 = 5;
/// Usage above this percentage of limit is critical
pub const CRITICAL_PERCENT: f64 = 90.0;
/// Usage above this percentage of limit is a warning
pub const WARNING_PERCENT: f64 = 70.0;
/// Usage below this percentage of request is overprovisioned
pub const OVERPROVISIONED_PERCENT: f64 = 30.0;
/// Node utilization above this percentage is flagged in cluster overviews
pub const NODE_UTILIZATION_WARN_PERCENT: f64 = 85.0;
/// Scheduling request ratio above this percentage is a warning
pub const REQUEST_WARN_PERCENT: f64 = 80.0;

pub fn phase(pod: &Pod) -> &str {
    pod.status
        .as_ref()
        .and_then(|s| s.phase.as_deref())
        .unwrap_or("Unknown")
}

fn container_statuses(pod: &Pod) -> &[ContainerStatus] {
    pod.status
        .as_ref()
        .and_then(|s| s.container_statuses.as_deref())
        .unwrap_or(&[])
}

fn init_container_statuses(pod: &Pod) -> &[ContainerStatus] {
    pod.status
        .as_ref()
        .and_then(|s| s.init_container_statuses.as_deref())
        .unwrap_or(&[])
}

/// Running with every container ready and none waiting, or Succeeded
pub fn is_pod_healthy(pod: &Pod) -> bool {
    match phase(pod) {
        "Succeeded" => true,
        "Running" => container_statuses(pod).iter().all(|cs| {
            cs.ready && cs.state.as_ref().and_then(|s| s.waiting.as_ref()).is_none()
        }),
        _ => false,
    }
}

/// Most specific status string for a pod.
///
/// Precedence: per container a waiting then terminated reason, then a failing
/// init container's reason prefixed `Init:`, the pod status reason, the phase.
pub fn pod_phase_reason(pod: &Pod) -> String {
    for cs in container_statuses(pod) {
        let state = cs.state.as_ref();
        let reason = state
            .and_then(|s| s.waiting.as_ref())
            .and_then(|w| w.reason.as_deref())
            .filter(|r| !r.is_empty())
            .or_else(|| {
                state
                    .and_then(|s| s.terminated.as_ref())
                    .and_then(|t| t.reason.as_deref())
                    .filter(|r| !r.is_empty())
            });
        if let Some(reason) = reason {
            return reason.to_string();
        }
    }
    for cs in init_container_statuses(pod) {
        let state = cs.state.as_ref();
        let reason = state
            .and_then(|s| s.waiting.as_ref())
            .and_then(|w| w.reason.as_deref())
            .or_else(|| {
                state
                    .and_then(|s| s.terminated.as_ref())
                    .filter(|t| t.exit_code != 0)
                    .and_then(|t| t.reason.as_deref())
            })
            .filter(|r| !r.is_empty());
        if let Some(reason) = reason {
            return format!("Init:{}", reason);
        }
    }
    if let Some(reason) = pod
        .status
        .as_ref()
        .and_then(|s| s.reason.as_deref())
        .filter(|r| !r.is_empty())
    {
        return reason.to_string();
    }
    phase(pod).to_string()
}

/// (ready containers, declared containers, total restarts)
pub fn pod_container_summary(pod: &Pod) -> (usize, usize, i32) {
    let total = pod.spec.as_ref().map(|s| s.containers.len()).unwrap_or(0);
    let statuses = container_statuses(pod);
    let ready = statuses.iter().filter(|cs| cs.ready).count();
    let restarts = statuses.iter().map(|cs| cs.restart_count).sum();
    (ready, total, restarts)
}

pub fn pod_restarts(pod: &Pod) -> i32 {
    pod_container_summary(pod).2
}

pub fn has_high_restarts(restarts: i32) -> bool {
    restarts > HIGH_RESTART_THRESHOLD
}

pub fn pod_verdict(pod: &Pod) -> HealthVerdict {
    if is_pod_healthy(pod) {
        if has_high_restarts(pod_restarts(pod)) {
            HealthVerdict::Degraded
        } else {
            HealthVerdict::Healthy
        }
    } else {
        HealthVerdict::Critical
    }
}

/// Pods still consuming scheduling capacity
pub fn is_pod_active(pod: &Pod) -> bool {
    !matches!(phase(pod), "Succeeded" | "Failed")
}

pub fn pod_node(pod: &Pod) -> &str {
    pod.spec
        .as_ref()
        .and_then(|s| s.node_name.as_deref())
        .unwrap_or("<none>")
}

/// "Ready", "NotReady" or "Unknown" from the node Ready condition
pub fn node_status(node: &Node) -> &'static str {
    let ready = node
        .status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .and_then(|c| c.iter().find(|c| c.type_ == "Ready"));
    match ready {
        Some(c) if c.status == "True" => "Ready",
        Some(_) => "NotReady",
        None => "Unknown",
    }
}

/// Pressure conditions currently True on a node
pub fn node_pressures(node: &Node) -> Vec<String> {
    node.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .map(|conds| {
            conds
                .iter()
                .filter(|c| c.type_ != "Ready" && c.status == "True")
                .map(|c| c.type_.clone())
                .collect()
        })
        .unwrap_or_default()
}

/// Usage category against limit, shared by resource engines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageLevel {
    Critical,
    Warning,
    Normal,
}

pub fn usage_level(percent_of_limit: f64) -> UsageLevel {
    if percent_of_limit > CRITICAL_PERCENT {
        UsageLevel::Critical
    } else if percent_of_limit > WARNING_PERCENT {
        UsageLevel::Warning
    } else {
        UsageLevel::Normal
    }
}

pub fn is_overprovisioned(percent_of_request: f64) -> bool {
    percent_of_request < OVERPROVISIONED_PERCENT
}

pub fn has_readiness_probe(container: &Container) -> bool {
    container.readiness_probe.is_some()
}

pub fn has_liveness_probe(container: &Container) -> bool {
    container.liveness_probe.is_some()
}

/// Last termination reason and exit code of a container, if it terminated before
pub fn last_termination(cs: &ContainerStatus) -> Option<(String, i32)> {
    cs.last_state
        .as_ref()
        .and_then(|s| s.terminated.as_ref())
        .map(|t| (t.reason.clone().unwrap_or_else(|| "Unknown".to_string()), t.exit_code))
}

pub fn waiting_reason(cs: &ContainerStatus) -> Option<&str> {
    cs.state
        .as_ref()
        .and_then(|s| s.waiting.as_ref())
        .and_then(|w| w.reason.as_deref())
}
