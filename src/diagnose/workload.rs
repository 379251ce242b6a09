//! Namespace health: pods, workload controllers, events and storage

use super::describe;
use super::health;
use super::types::{Finding, ResourceRef};
use super::{soft, Report};
use crate::client::{event_timestamp, ClusterAccess, ListQuery};
use crate::error::Result;
use crate::output::format_age;
use chrono::{Duration, Utc};
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::batch::v1::Job;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NamespaceInput {
    pub namespace: String,
}

/// (ready or available, desired) for a workload controller
pub fn deployment_availability(d: &Deployment) -> (i32, i32) {
    let desired = d.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
    let available = d.status.as_ref().and_then(|s| s.available_replicas).unwrap_or(0);
    (available, desired)
}

pub fn statefulset_readiness(s: &StatefulSet) -> (i32, i32) {
    let desired = s.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
    let ready = s.status.as_ref().and_then(|s| s.ready_replicas).unwrap_or(0);
    (ready, desired)
}

pub fn daemonset_readiness(d: &DaemonSet) -> (i32, i32) {
    d.status
        .as_ref()
        .map(|s| (s.number_ready, s.desired_number_scheduled))
        .unwrap_or((0, 0))
}

/// Failed pod count of a job that has not succeeded
pub fn job_failures(j: &Job) -> i32 {
    let status = j.status.as_ref();
    let succeeded = status.and_then(|s| s.succeeded).unwrap_or(0);
    let failed = status.and_then(|s| s.failed).unwrap_or(0);
    if succeeded > 0 {
        0
    } else {
        failed
    }
}

pub async fn diagnose_namespace(cluster: &dyn ClusterAccess, input: &NamespaceInput) -> Result<Report> {
    let ns = input.namespace.as_str();
    let pods = cluster.list_pods(Some(ns), &ListQuery::default()).await?;
    let mut report = Report::new(format!("Namespace Diagnosis: {}", ns));

    report.subsection("Pod Summary");
    let unhealthy: Vec<_> = pods.iter().filter(|p| !health::is_pod_healthy(p)).collect();
    let restarting: Vec<_> = pods
        .iter()
        .filter(|p| health::has_high_restarts(health::pod_restarts(p)))
        .collect();
    report.line(format!(
        "  Total: {}, Unhealthy: {}, High Restarts: {}",
        pods.len(),
        unhealthy.len(),
        restarting.len()
    ));
    if !unhealthy.is_empty() {
        report.flag(
            Finding::critical(format!("{} unhealthy pods", unhealthy.len()))
                .with_subject(ResourceRef::namespace(ns))
                .with_remediation("Run diagnose_pod on each unhealthy pod"),
        );
        for p in &unhealthy {
            report.line(format!(
                "    - {}: {} (restarts: {})",
                describe::name(&p.metadata),
                health::pod_phase_reason(p),
                health::pod_restarts(p)
            ));
        }
    }
    if !restarting.is_empty() {
        report.flag(
            Finding::warning(format!(
                "{} pods with >{} restarts",
                restarting.len(),
                health::HIGH_RESTART_THRESHOLD
            ))
            .with_subject(ResourceRef::namespace(ns)),
        );
        for p in &restarting {
            report.line(format!("    - {}: {} restarts", describe::name(&p.metadata), health::pod_restarts(p)));
        }
    }

    report.subsection("Workloads");
    match soft(cluster.list_deployments(Some(ns)).await)? {
        Ok(deployments) => {
            let failing: Vec<_> = deployments
                .iter()
                .filter(|d| {
                    let (available, desired) = deployment_availability(d);
                    available < desired
                })
                .collect();
            report.line(format!("  Deployments: {} ({} with unavailable replicas)", deployments.len(), failing.len()));
            if !failing.is_empty() {
                report.flag(Finding::warning(format!("{} deployments with unavailable replicas", failing.len())));
                for d in failing {
                    let (available, desired) = deployment_availability(d);
                    report.line(format!("    - {}: {}/{} available", describe::name(&d.metadata), available, desired));
                }
            }
        }
        Err(e) => report.note(format!("could not list deployments: {}", e)),
    }

    match soft(cluster.list_statefulsets(Some(ns)).await)? {
        Ok(sets) => {
            for s in &sets {
                let (ready, desired) = statefulset_readiness(s);
                if ready < desired {
                    let name = describe::name(&s.metadata);
                    report.flag(
                        Finding::warning(format!("StatefulSet '{}' has {}/{} ready replicas", name, ready, desired))
                            .with_subject(ResourceRef::new("StatefulSet", Some(ns), name)),
                    );
                }
            }
            report.line(format!("  StatefulSets: {}", sets.len()));
        }
        Err(e) => report.note(format!("could not list statefulsets: {}", e)),
    }

    match soft(cluster.list_daemonsets(Some(ns)).await)? {
        Ok(sets) => {
            for d in &sets {
                let (ready, desired) = daemonset_readiness(d);
                if ready < desired {
                    let name = describe::name(&d.metadata);
                    report.flag(
                        Finding::warning(format!("DaemonSet '{}' has {}/{} pods ready", name, ready, desired))
                            .with_subject(ResourceRef::new("DaemonSet", Some(ns), name)),
                    );
                }
            }
            report.line(format!("  DaemonSets: {}", sets.len()));
        }
        Err(e) => report.note(format!("could not list daemonsets: {}", e)),
    }

    match soft(cluster.list_jobs(Some(ns)).await)? {
        Ok(jobs) => {
            for j in &jobs {
                let failed = job_failures(j);
                if failed > 0 {
                    let name = describe::name(&j.metadata);
                    report.flag(
                        Finding::warning(format!("Job '{}' has {} failed pod(s)", name, failed))
                            .with_subject(ResourceRef::new("Job", Some(ns), name))
                            .with_remediation(format!("Inspect logs of failed pods for job '{}'", name)),
                    );
                }
            }
            report.line(format!("  Jobs: {}", jobs.len()));
        }
        Err(e) => report.note(format!("could not list jobs: {}", e)),
    }

    report.subsection("Events");
    match soft(cluster.list_events(Some(ns), &ListQuery::default()).await)? {
        Ok(events) => {
            let cutoff = Utc::now() - Duration::hours(1);
            let recent = events
                .iter()
                .filter(|e| super::topology::is_warning_event(e))
                .filter(|e| event_timestamp(e).map_or(false, |t| t > cutoff))
                .count();
            if recent > 0 {
                report.flag(Finding::warning(format!("{} warning events in the last hour", recent)));
            } else {
                report.line("  No warning events in the last hour");
            }
        }
        Err(e) => report.note(format!("could not list events: {}", e)),
    }

    report.subsection("Storage");
    match soft(cluster.list_pvcs(Some(ns)).await)? {
        Ok(pvcs) => {
            let pending: Vec<_> = pvcs
                .iter()
                .filter(|p| p.status.as_ref().and_then(|s| s.phase.as_deref()) != Some("Bound"))
                .collect();
            report.line(format!("  PVCs: {} ({} not bound)", pvcs.len(), pending.len()));
            if !pending.is_empty() {
                report.flag(
                    Finding::warning(format!("{} PVCs not bound", pending.len()))
                        .with_remediation("Check storage class provisioner and PV availability"),
                );
                for pvc in pending {
                    report.line(format!(
                        "    - {}: {} (age {})",
                        describe::name(&pvc.metadata),
                        pvc.status.as_ref().and_then(|s| s.phase.as_deref()).unwrap_or("Unknown"),
                        format_age(pvc.metadata.creation_timestamp.as_ref())
                    ));
                }
            }
        }
        Err(e) => report.note(format!("could not list PVCs: {}", e)),
    }

    match soft(cluster.list_pvs().await)? {
        Ok(pvs) => {
            for pv in &pvs {
                let claim = pv.spec.as_ref().and_then(|s| s.claim_ref.as_ref());
                if claim.and_then(|c| c.namespace.as_deref()) != Some(ns) {
                    continue;
                }
                let phase = pv.status.as_ref().and_then(|s| s.phase.as_deref()).unwrap_or("Unknown");
                if matches!(phase, "Released" | "Failed") {
                    let name = describe::name(&pv.metadata);
                    report.flag(
                        Finding::warning(format!(
                            "PersistentVolume '{}' for claim '{}' is {}",
                            name,
                            claim.and_then(|c| c.name.as_deref()).unwrap_or("<unknown>"),
                            phase
                        ))
                        .with_subject(ResourceRef::new("PersistentVolume", None, name)),
                    );
                }
            }
        }
        Err(e) => report.note(format!("could not list PVs: {}", e)),
    }

    report.subsection("Overall Assessment");
    let summary = report.summary();
    if summary.issue_count() == 0 {
        report.line("  Namespace appears healthy. No issues found.");
    } else {
        report.line(format!("  {} issue(s) found. Review findings above.", summary.issue_count()));
    }
    Ok(report)
}
