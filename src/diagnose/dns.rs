//! CoreDNS health: pod discovery, pod state, and a literal scan of recent logs

use super::describe;
use super::health;
use super::types::{ErrorPatternCount, Finding, ResourceRef};
use super::{soft, Report};
use crate::client::{ClusterAccess, ListQuery, LogRequest};
use crate::error::Result;
use crate::mermaid::{Diagram, Direction, EdgeKind, Flowchart, Shape, Style};
use crate::output::format_age;
use k8s_openapi::api::core::v1::Pod;
use serde::{Deserialize, Serialize};
use tracing::debug;

const DNS_NAMESPACE: &str = "kube-system";
const DNS_SERVICE: &str = "kube-dns";
const LOG_TAIL_LINES: i64 = 500;
const LOG_WINDOW_SECS: i64 = 3600;

/// Literal substrings counted per log line
pub const DNS_ERROR_PATTERNS: [&str; 8] = [
    "SERVFAIL",
    "NXDOMAIN",
    "REFUSED",
    "i/o timeout",
    "connection refused",
    "no such host",
    "plugin/errors",
    "ERROR",
];

const SERVFAIL_CRITICAL: usize = 50;
const SERVFAIL_WARNING: usize = 10;
const NXDOMAIN_INFO: usize = 100;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DnsInput {}

/// One way of locating CoreDNS pods in kube-system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DnsPodStrategy {
    Label(&'static str),
    NamePrefix(&'static str),
}

/// Tried in order; the first non-empty result wins
pub const DNS_POD_STRATEGIES: [DnsPodStrategy; 3] = [
    DnsPodStrategy::Label("k8s-app=kube-dns"),
    DnsPodStrategy::Label("app.kubernetes.io/name=coredns"),
    DnsPodStrategy::NamePrefix("coredns"),
];

impl DnsPodStrategy {
    fn describe(&self) -> String {
        match self {
            DnsPodStrategy::Label(sel) => format!("label {}", sel),
            DnsPodStrategy::NamePrefix(prefix) => format!("name prefix {}", prefix),
        }
    }

    async fn resolve(&self, cluster: &dyn ClusterAccess) -> Result<Vec<Pod>> {
        match self {
            DnsPodStrategy::Label(sel) => cluster.list_pods(Some(DNS_NAMESPACE), &ListQuery::labels(*sel)).await,
            DnsPodStrategy::NamePrefix(prefix) => {
                let pods = cluster.list_pods(Some(DNS_NAMESPACE), &ListQuery::default()).await?;
                Ok(pods
                    .into_iter()
                    .filter(|p| describe::name(&p.metadata).starts_with(prefix))
                    .collect())
            }
        }
    }
}

/// Walk the strategies until one yields pods; returns the winning strategy too
pub async fn find_dns_pods(cluster: &dyn ClusterAccess) -> Result<Option<(DnsPodStrategy, Vec<Pod>)>> {
    for strategy in DNS_POD_STRATEGIES {
        let pods = strategy.resolve(cluster).await?;
        debug!(strategy = %strategy.describe(), found = pods.len(), "coredns lookup");
        if !pods.is_empty() {
            return Ok(Some((strategy, pods)));
        }
    }
    Ok(None)
}

/// Lines containing each pattern, in pattern order
pub fn count_patterns(logs: &str, patterns: &[&str]) -> Vec<ErrorPatternCount> {
    patterns
        .iter()
        .map(|pattern| ErrorPatternCount {
            pattern: pattern.to_string(),
            count: logs.lines().filter(|l| l.contains(pattern)).count(),
        })
        .collect()
}

fn merge_counts(total: &mut [ErrorPatternCount], more: &[ErrorPatternCount]) {
    for (t, m) in total.iter_mut().zip(more) {
        t.count += m.count;
    }
}

fn dns_container(pod: &Pod) -> Option<&str> {
    let containers = pod.spec.as_ref().map(|s| s.containers.as_slice()).unwrap_or(&[]);
    containers
        .iter()
        .find(|c| c.name.contains("dns"))
        .or_else(|| containers.first())
        .map(|c| c.name.as_str())
}

/// Findings raised by cluster-wide pattern totals
pub fn pattern_findings(totals: &[ErrorPatternCount]) -> Vec<Finding> {
    let mut findings = Vec::new();
    for t in totals {
        match t.pattern.as_str() {
            "SERVFAIL" if t.count > SERVFAIL_CRITICAL => findings.push(
                Finding::critical(format!("High SERVFAIL rate: {} occurrences, DNS resolution is failing", t.count))
                    .with_remediation("Check CoreDNS upstream forwarders and the Corefile"),
            ),
            "SERVFAIL" if t.count > SERVFAIL_WARNING => findings.push(Finding::warning(format!(
                "Elevated SERVFAIL count: {}, some DNS queries are failing",
                t.count
            ))),
            "NXDOMAIN" if t.count > NXDOMAIN_INFO => findings.push(Finding::info(format!(
                "High NXDOMAIN count: {}, check that services use correct DNS names",
                t.count
            ))),
            "i/o timeout" | "connection refused" if t.count > 0 => findings.push(
                Finding::warning(format!("Upstream DNS connectivity issues: {} '{}' errors", t.count, t.pattern))
                    .with_remediation("Verify upstream resolvers are reachable from the nodes"),
            ),
            _ => {}
        }
    }
    findings
}

pub async fn check_dns_health(cluster: &dyn ClusterAccess, _input: &DnsInput) -> Result<Report> {
    let mut report = Report::new("DNS Health Check");

    let Some((strategy, pods)) = find_dns_pods(cluster).await? else {
        report.flag(
            Finding::critical("No CoreDNS pods found in kube-system namespace")
                .with_subject(ResourceRef::namespace(DNS_NAMESPACE))
                .with_remediation("Check that CoreDNS is deployed in kube-system"),
        );
        report.line("  DNS resolution will not work in the cluster.");
        report.subsection("Overall DNS Assessment");
        report.line("  0/0 CoreDNS pods running.");
        return Ok(report);
    };
    report.kv("Discovered by", strategy.describe());

    let mut flow = Flowchart::new(Direction::LeftRight);
    let clients = flow.add_styled_node("clients", "Cluster Pods", Shape::Stadium, Style::External);
    let svc_id = match soft(cluster.get_service(DNS_NAMESPACE, DNS_SERVICE).await)? {
        Ok(Some(svc)) => {
            report.kv("Service", format!("{} (ClusterIP: {})", DNS_SERVICE, describe::cluster_ip(&svc)));
            flow.add_styled_node("svc", &format!("Service: {}", DNS_SERVICE), Shape::Rect, Style::Healthy)
        }
        Ok(None) => {
            report.flag(
                Finding::warning(format!("CoreDNS service '{}' not found in {}", DNS_SERVICE, DNS_NAMESPACE))
                    .with_subject(ResourceRef::service(DNS_NAMESPACE, DNS_SERVICE)),
            );
            flow.add_styled_node("svc", &format!("Service: {} (missing)", DNS_SERVICE), Shape::Rect, Style::Warning)
        }
        Err(e) => {
            report.note(format!("could not fetch service {}: {}", DNS_SERVICE, e));
            flow.add_styled_node("svc", &format!("Service: {}", DNS_SERVICE), Shape::Rect, Style::Info)
        }
    };
    flow.add_edge(&clients, &svc_id, Some("UDP/TCP 53"), EdgeKind::Solid);
    let upstream = flow.add_styled_node("upstream", "Upstream DNS", Shape::Circle, Style::External);

    report.subsection("CoreDNS Pod Status");
    let rows: Vec<Vec<String>> = pods
        .iter()
        .map(|p| {
            let (ready, total, restarts) = health::pod_container_summary(p);
            vec![
                describe::name(&p.metadata).to_string(),
                health::pod_phase_reason(p),
                format!("{}/{}", ready, total),
                restarts.to_string(),
                format_age(p.metadata.creation_timestamp.as_ref()),
                health::pod_node(p).to_string(),
            ]
        })
        .collect();
    report.table(&["POD", "STATUS", "READY", "RESTARTS", "AGE", "NODE"], &rows);

    let mut running = 0;
    for p in &pods {
        let name = describe::name(&p.metadata);
        let subject = ResourceRef::pod(DNS_NAMESPACE, name);
        let phase = health::phase(p);
        if phase == "Running" {
            running += 1;
        } else {
            report.flag(Finding::critical(format!("CoreDNS pod '{}' is {} (not Running)", name, phase)).with_subject(subject.clone()));
        }

        let restarts = health::pod_restarts(p);
        if health::has_high_restarts(restarts) {
            report.flag(Finding::warning(format!("CoreDNS pod '{}' has {} restarts", name, restarts)).with_subject(subject.clone()));
        } else if restarts > 0 {
            report.flag(Finding::info(format!("CoreDNS pod '{}' has {} restart(s)", name, restarts)).with_subject(subject.clone()));
        }

        let conditions = p.status.as_ref().and_then(|s| s.conditions.as_ref());
        for cond in conditions.into_iter().flatten().filter(|c| c.type_ == "Ready" && c.status != "True") {
            report.flag(
                Finding::critical(format!(
                    "CoreDNS pod '{}' is not ready: {}",
                    name,
                    cond.message.as_deref().unwrap_or("")
                ))
                .with_subject(subject.clone()),
            );
        }

        let statuses = p.status.as_ref().and_then(|s| s.container_statuses.as_ref());
        for cs in statuses.into_iter().flatten() {
            if health::waiting_reason(cs) == Some("CrashLoopBackOff") {
                report.flag(
                    Finding::critical(format!("CoreDNS container '{}' in pod '{}' is in CrashLoopBackOff", cs.name, name))
                        .with_subject(subject.clone()),
                );
            }
            if health::last_termination(cs).map_or(false, |(reason, _)| reason == "OOMKilled") {
                report.flag(
                    Finding::critical(format!("CoreDNS container '{}' in pod '{}' was OOMKilled", cs.name, name))
                        .with_subject(subject.clone())
                        .with_remediation("Increase the CoreDNS memory limit"),
                );
            }
        }

        let pod_id = flow.add_styled_node(&format!("pod/{}", name), name, Shape::Round, health::pod_verdict(p).style());
        flow.link(&svc_id, &pod_id);
        flow.add_edge(&pod_id, &upstream, Some("forward"), EdgeKind::Dotted);
    }

    if running < 2 {
        report.flag(
            Finding::warning(format!(
                "Only {} CoreDNS pod{} running: no DNS redundancy",
                running,
                if running == 1 { "" } else { "s" }
            ))
                .with_remediation("Scale CoreDNS to at least 2 replicas"),
        );
    }

    report.subsection("Log Analysis");
    let mut totals = count_patterns("", &DNS_ERROR_PATTERNS);
    for p in &pods {
        let name = describe::name(&p.metadata);
        let request = LogRequest::tail(dns_container(p), LOG_TAIL_LINES).since_seconds(LOG_WINDOW_SECS);
        let logs = match soft(cluster.pod_logs(DNS_NAMESPACE, name, &request).await)? {
            Ok(logs) => logs,
            Err(e) => {
                report.line(format!("  Pod '{}': could not fetch logs: {}", name, e));
                continue;
            }
        };
        if logs.trim().is_empty() {
            report.line(format!("  Pod '{}': no logs available", name));
            continue;
        }
        report.line(format!("\n  Pod '{}' log scan (last 1h):", name));
        let counts = count_patterns(&logs, &DNS_ERROR_PATTERNS);
        let hits: Vec<&ErrorPatternCount> = counts.iter().filter(|c| c.count > 0).collect();
        if hits.is_empty() {
            report.line("    No error patterns found in logs.");
        }
        for c in hits {
            report.line(format!("    {}: {} occurrences", c.pattern, c.count));
        }
        merge_counts(&mut totals, &counts);
    }
    for finding in pattern_findings(&totals) {
        report.flag(finding);
    }

    report.subsection("Overall DNS Assessment");
    let issues = report.summary().issue_count();
    if issues == 0 {
        report.line(format!(
            "  CoreDNS is healthy: {}/{} pods running, no error patterns detected.",
            running,
            pods.len()
        ));
    } else {
        report.line(format!("  {} issue(s) found. {}/{} CoreDNS pods running.", issues, running, pods.len()));
    }
    report.diagram(Diagram::Flowchart { heading: "DNS RESOLUTION PATH".into(), chart: flow });
    Ok(report)
}
