//! Pod-level diagnosis and the unhealthy-pod scan

use super::describe;
use super::health;
use super::namespace;
use super::quantity::container_resources;
use super::topology;
use super::types::{Finding, ResourceRef};
use super::{soft, Report};
use crate::client::{ClusterAccess, ListQuery, LogRequest};
use crate::error::{KdError, Result};
use crate::output::format_age;
use k8s_openapi::api::core::v1::{ContainerStatus, Pod};
use serde::{Deserialize, Serialize};

/// Previous-instance log lines fetched for crash-looping containers
const CRASH_LOG_LINES: i64 = 50;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PodInput {
    pub namespace: String,
    #[serde(alias = "name")]
    pub pod: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnhealthyPodsInput {
    #[serde(default)]
    pub namespace: Option<String>,
}

fn is_image_pull_error(reason: &str) -> bool {
    matches!(reason, "ImagePullBackOff" | "ErrImagePull")
}

fn check_container(report: &mut Report, pod: &Pod, cs: &ContainerStatus, subject: &ResourceRef) {
    if let Some(waiting) = cs.state.as_ref().and_then(|s| s.waiting.as_ref()) {
        let reason = waiting.reason.as_deref().unwrap_or("");
        match reason {
            "CrashLoopBackOff" => {
                report.flag(
                    Finding::critical(format!("Container '{}' is in CrashLoopBackOff", cs.name))
                        .with_subject(subject.clone())
                        .with_remediation(format!(
                            "Check application logs for container '{}' (previous instance)",
                            cs.name
                        )),
                );
                if let Some((last_reason, exit_code)) = health::last_termination(cs) {
                    report.line(format!("    - Last termination reason: {}", last_reason));
                    report.line(format!("    - Exit code: {}", exit_code));
                    if last_reason == "OOMKilled" {
                        report.line("    - Container was killed due to out-of-memory");
                    }
                }
            }
            r if is_image_pull_error(r) => report.flag(
                Finding::critical(format!(
                    "Container '{}' cannot pull image: {}",
                    cs.name,
                    waiting.message.as_deref().unwrap_or(r)
                ))
                .with_subject(subject.clone())
                .with_remediation(format!("Check image name and registry credentials for container '{}'", cs.name)),
            ),
            r => report.flag(
                Finding::warning(format!("Container '{}' is waiting: {}", cs.name, r)).with_subject(subject.clone()),
            ),
        }
    }

    if let Some(term) = cs.state.as_ref().and_then(|s| s.terminated.as_ref()).filter(|t| t.exit_code != 0) {
        report.flag(
            Finding::warning(format!(
                "Container '{}' terminated with exit code {} ({})",
                cs.name,
                term.exit_code,
                term.reason.as_deref().unwrap_or("Unknown")
            ))
            .with_subject(subject.clone()),
        );
    }

    if health::has_high_restarts(cs.restart_count) {
        report.flag(
            Finding::warning(format!("Container '{}' has high restart count: {}", cs.name, cs.restart_count))
                .with_subject(subject.clone()),
        );
    }

    if let Some((reason, _)) = health::last_termination(cs).filter(|(r, _)| r == "OOMKilled") {
        let limit = pod
            .spec
            .as_ref()
            .and_then(|s| s.containers.iter().find(|c| c.name == cs.name))
            .and_then(|c| c.resources.as_ref())
            .and_then(|r| r.limits.as_ref())
            .and_then(|l| l.get("memory"))
            .map(|q| q.0.clone());
        if let Some(limit) = limit {
            report.action(format!(
                "Increase memory limit for container '{}' (currently {}, {})",
                cs.name, limit, reason
            ));
        }
    }
}

pub async fn diagnose_pod(cluster: &dyn ClusterAccess, input: &PodInput) -> Result<Report> {
    let ns = input.namespace.as_str();
    let pod = cluster
        .get_pod(ns, &input.pod)
        .await?
        .ok_or_else(|| KdError::not_found("Pod", format!("{}/{}", ns, input.pod)))?;
    let name = describe::name(&pod.metadata).to_string();
    let subject = ResourceRef::pod(ns, &name);

    let mut report = Report::new(format!("Pod Diagnosis: {} (namespace: {})", name, ns));
    report.kv("STATUS", health::pod_phase_reason(&pod));
    report.kv("RESTARTS", health::pod_restarts(&pod).to_string());
    report.kv("NODE", health::pod_node(&pod));
    report.kv("AGE", format_age(pod.metadata.creation_timestamp.as_ref()));

    report.subsection("Containers");
    let statuses = pod.status.as_ref().and_then(|s| s.container_statuses.clone()).unwrap_or_default();
    for cs in &statuses {
        let state = if cs.ready { "ready" } else { "not ready" };
        report.line(format!("  {}: {} (restarts: {})", cs.name, state, cs.restart_count));
        check_container(&mut report, &pod, cs, &subject);
    }

    report.subsection("Conditions");
    for cond in pod.status.as_ref().and_then(|s| s.conditions.as_ref()).into_iter().flatten() {
        report.line(format!("  {}: {}", cond.type_, cond.status));
        if cond.status != "False" {
            continue;
        }
        let message = cond.message.as_deref().unwrap_or("");
        match cond.type_.as_str() {
            "PodScheduled" => report.flag(
                Finding::critical(format!("Pod not scheduled: {}", message))
                    .with_subject(subject.clone())
                    .with_remediation("Check cluster capacity and node selectors/tolerations"),
            ),
            "Ready" => report.flag(Finding::warning(format!("Pod not ready: {}", message)).with_subject(subject.clone())),
            _ => {}
        }
    }

    for c in pod.spec.as_ref().map(|s| s.containers.as_slice()).unwrap_or(&[]) {
        let limits = container_resources(c).limits;
        if limits.cpu_millis == 0 {
            report.add(Finding::info(format!("Container '{}' has no CPU limit set", c.name)).with_subject(subject.clone()));
        }
        if limits.memory_bytes == 0 {
            report.add(Finding::info(format!("Container '{}' has no memory limit set", c.name)).with_subject(subject.clone()));
        }
    }

    match soft(topology::events_for(cluster, ns, &name).await)? {
        Ok(events) => {
            let warnings: Vec<_> = events.iter().filter(|e| topology::is_warning_event(e)).collect();
            if !warnings.is_empty() {
                report.subsection("Warning Events");
                report.flag(
                    Finding::warning(format!("{} Warning events in recent history", warnings.len())).with_subject(subject.clone()),
                );
                for e in warnings {
                    let count = e.count.filter(|c| *c > 1).map(|c| format!(" (x{})", c)).unwrap_or_default();
                    report.line(format!(
                        "  - {}: {}{}",
                        e.reason.as_deref().unwrap_or(""),
                        e.message.as_deref().unwrap_or(""),
                        count
                    ));
                }
            }
        }
        Err(e) => report.note(format!("could not fetch events: {}", e)),
    }

    for cs in statuses.iter().filter(|cs| health::waiting_reason(cs) == Some("CrashLoopBackOff")) {
        report.subsection(&format!("RECENT LOGS (container '{}', previous instance)", cs.name));
        let request = LogRequest::tail(Some(cs.name.as_str()), CRASH_LOG_LINES).previous();
        match soft(cluster.pod_logs(ns, &name, &request).await)? {
            Ok(logs) if logs.trim().is_empty() => report.note("no logs available"),
            Ok(logs) => report.line(logs.trim_end()),
            Err(e) => report.note(format!("could not fetch logs: {}", e)),
        }
    }

    if health::phase(&pod) == "Pending" {
        report.action("Check cluster capacity and node selectors/tolerations");
    }
    Ok(report)
}

pub async fn find_unhealthy_pods(cluster: &dyn ClusterAccess, input: &UnhealthyPodsInput) -> Result<Report> {
    let scope = namespace::normalize(input.namespace.as_deref());
    let pods = cluster.list_pods(scope, &ListQuery::default()).await?;
    let mut report = Report::new(format!("Unhealthy Pods (namespace: {})", namespace::display(scope)));

    let unhealthy: Vec<&Pod> = pods.iter().filter(|p| !health::is_pod_healthy(p)).collect();
    if unhealthy.is_empty() {
        report.line("No unhealthy pods found.");
        return Ok(report);
    }

    let rows: Vec<Vec<String>> = unhealthy
        .iter()
        .map(|p| {
            vec![
                describe::name(&p.metadata).to_string(),
                describe::namespace(&p.metadata).to_string(),
                health::pod_phase_reason(p),
                health::pod_restarts(p).to_string(),
                format_age(p.metadata.creation_timestamp.as_ref()),
                health::pod_node(p).to_string(),
            ]
        })
        .collect();
    report.table(&["NAME", "NAMESPACE", "STATUS", "RESTARTS", "AGE", "NODE"], &rows);
    report.line(format!("\n{} unhealthy pods out of {} total", unhealthy.len(), pods.len()));

    for p in unhealthy {
        let name = describe::name(&p.metadata);
        report.add(
            Finding::critical(format!(
                "Pod '{}/{}' is unhealthy: {}",
                describe::namespace(&p.metadata),
                name,
                health::pod_phase_reason(p)
            ))
            .with_subject(ResourceRef::pod(describe::namespace(&p.metadata), name)),
        );
    }
    Ok(report)
}
