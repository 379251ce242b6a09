//! Log pattern analysis across the pods of a deployment

use super::describe;
use super::selector::{matches_label_selector, to_query};
use super::types::{ErrorPatternCount, Finding, ResourceRef};
use super::{soft, Report};
use crate::client::{ClusterAccess, ListQuery, LogRequest};
use crate::error::{KdError, Result};
use crate::output::truncate_line;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_LOG_PATTERN: &str = r"(?i)(error|exception|fatal|panic|timeout|refused|failed|crash|oom)";
pub const DEFAULT_LOG_TAIL: i64 = 200;
const SAMPLES_PER_POD: usize = 5;
const SAMPLE_WIDTH: usize = 200;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceLogsInput {
    pub namespace: String,
    #[serde(alias = "deployment_name")]
    pub deployment: String,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default, alias = "tail_lines")]
    pub tail: Option<i64>,
}

/// Matches found in the logs of one pod
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PodLogScan {
    pub pod: String,
    pub matches: usize,
    pub samples: Vec<String>,
}

/// Count matching lines, tallying the matched text (lowercased) and keeping the first samples
pub fn scan_logs(re: &Regex, logs: &str, scan: &mut PodLogScan, kinds: &mut BTreeMap<String, usize>) {
    for line in logs.lines() {
        let Some(m) = re.find(line) else { continue };
        scan.matches += 1;
        *kinds.entry(m.as_str().to_lowercase()).or_default() += 1;
        if scan.samples.len() < SAMPLES_PER_POD {
            scan.samples.push(truncate_line(line, SAMPLE_WIDTH));
        }
    }
}

/// Breakdown sorted by count, most frequent first; ties keep name order
pub fn breakdown(kinds: &BTreeMap<String, usize>) -> Vec<ErrorPatternCount> {
    let mut entries: Vec<ErrorPatternCount> = kinds
        .iter()
        .map(|(k, v)| ErrorPatternCount {
            pattern: k.clone(),
            count: *v,
        })
        .collect();
    entries.sort_by(|a, b| b.count.cmp(&a.count));
    entries
}

pub async fn analyze_service_logs(cluster: &dyn ClusterAccess, input: &ServiceLogsInput) -> Result<Report> {
    let ns = input.namespace.as_str();
    let pattern = input.pattern.as_deref().filter(|p| !p.is_empty()).unwrap_or(DEFAULT_LOG_PATTERN);
    let re = Regex::new(pattern).map_err(|e| KdError::InvalidArgument(format!("invalid pattern: {}", e)))?;
    let tail = input.tail.filter(|t| *t > 0).unwrap_or(DEFAULT_LOG_TAIL);

    let deployment = cluster
        .get_deployment(ns, &input.deployment)
        .await?
        .ok_or_else(|| KdError::not_found("Deployment", format!("{}/{}", ns, input.deployment)))?;
    let selector = deployment.spec.as_ref().map(|s| s.selector.clone()).unwrap_or_default();
    let query = selector
        .match_labels
        .as_ref()
        .filter(|m| !m.is_empty())
        .map(|m| ListQuery::labels(to_query(m)))
        .unwrap_or_default();
    let pods: Vec<_> = cluster
        .list_pods(Some(ns), &query)
        .await?
        .into_iter()
        .filter(|p| matches_label_selector(&selector, p.metadata.labels.as_ref()))
        .collect();

    let mut report = Report::new(format!("Service Log Analysis: {} (namespace: {})", input.deployment, ns));
    report.kv("Pattern", pattern);
    report.kv("Pods", pods.len().to_string());
    report.kv("Lines per container", tail.to_string());

    let mut kinds: BTreeMap<String, usize> = BTreeMap::new();
    let mut scans = Vec::new();
    for p in &pods {
        let name = describe::name(&p.metadata);
        let mut scan = PodLogScan {
            pod: name.to_string(),
            ..Default::default()
        };
        for c in p.spec.as_ref().map(|s| s.containers.as_slice()).unwrap_or(&[]) {
            let request = LogRequest::tail(Some(c.name.as_str()), tail);
            match soft(cluster.pod_logs(ns, name, &request).await)? {
                Ok(logs) => scan_logs(&re, &logs, &mut scan, &mut kinds),
                Err(e) => report.note(format!("[{}/{}] could not get logs: {}", name, c.name, e)),
            }
        }
        scans.push(scan);
    }

    let total: usize = scans.iter().map(|s| s.matches).sum();
    if total == 0 {
        report.line("\nNo matching log entries found.");
        return Ok(report);
    }

    report.subsection(&format!("Found {} matching entries", total));
    report.line("Error Type Breakdown:");
    for entry in breakdown(&kinds) {
        report.line(format!("  {:<20} {}", entry.pattern, entry.count));
    }

    report.line("\nPer-Pod Breakdown:");
    for s in &scans {
        report.line(format!("  {:<40} {} matches", s.pod, s.matches));
    }

    report.line(format!("\nSample Matching Lines (first {} per pod):", SAMPLES_PER_POD));
    for s in &scans {
        for line in &s.samples {
            report.line(format!("  [{}] {}", s.pod, line));
        }
    }

    report.add(
        Finding::warning(format!(
            "{} log lines in deployment '{}' match the error pattern",
            total, input.deployment
        ))
        .with_subject(ResourceRef::new("Deployment", Some(ns), &input.deployment)),
    );
    Ok(report)
}
