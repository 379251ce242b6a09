//! Report aggregation and rendering

use super::types::{Finding, HealthVerdict, Severity};
use crate::mermaid::Diagram;
use crate::output::format_table_raw;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt::Write;

/// Counts by severity tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub critical_count: usize,
    pub warning_count: usize,
    pub info_count: usize,
}

impl ReportSummary {
    pub fn from_findings(findings: &[Finding]) -> Self {
        let count = |sev| findings.iter().filter(|f| f.severity == sev).count();
        Self {
            critical_count: count(Severity::Critical),
            warning_count: count(Severity::Warning),
            info_count: count(Severity::Info),
        }
    }

    /// Critical plus warning findings; info is advisory and not counted
    pub fn issue_count(&self) -> usize {
        self.critical_count + self.warning_count
    }

    /// Overall health status
    pub fn health_status(&self) -> &'static str {
        if self.critical_count > 0 {
            "Critical"
        } else if self.warning_count > 0 {
            "Warning"
        } else {
            "Healthy"
        }
    }

    pub fn verdict_line(&self) -> String {
        if self.issue_count() == 0 {
            if self.info_count > 0 {
                format!("Summary: healthy, no issues found ({} info)", self.info_count)
            } else {
                "Summary: healthy, no issues found".to_string()
            }
        } else {
            format!(
                "Summary: {} issue(s) found ({} critical, {} warning, {} info)",
                self.issue_count(),
                self.critical_count,
                self.warning_count,
                self.info_count
            )
        }
    }
}

/// One diagnostic run: text sections, findings in discovery order, actions, diagrams
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub title: String,
    pub body: String,
    pub findings: Vec<Finding>,
    pub actions: Vec<String>,
    pub diagrams: Vec<Diagram>,
    pub generated_at: DateTime<Utc>,
}

impl Report {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: String::new(),
            findings: Vec::new(),
            actions: Vec::new(),
            diagrams: Vec::new(),
            generated_at: Utc::now(),
        }
    }

    pub fn section(&mut self, title: &str) {
        let _ = writeln!(self.body, "\n=== {} ===", title);
    }

    pub fn subsection(&mut self, title: &str) {
        let _ = writeln!(self.body, "\n--- {} ---", title);
    }

    pub fn line(&mut self, text: impl AsRef<str>) {
        let _ = writeln!(self.body, "{}", text.as_ref());
    }

    pub fn kv(&mut self, key: &str, value: impl AsRef<str>) {
        let _ = writeln!(self.body, "  {}: {}", key, value.as_ref());
    }

    pub fn ok(&mut self, text: impl AsRef<str>) {
        let _ = writeln!(self.body, "  [OK] {}", text.as_ref());
    }

    /// Inline note for a degraded section; does not count as a finding
    pub fn note(&mut self, text: impl AsRef<str>) {
        let _ = writeln!(self.body, "  ({})", text.as_ref());
    }

    pub fn table(&mut self, headers: &[&str], rows: &[Vec<String>]) {
        if rows.is_empty() {
            return;
        }
        let _ = writeln!(self.body, "{}", format_table_raw(headers, rows));
    }

    /// Record a finding; its remediation joins the deduplicated action list
    pub fn add(&mut self, finding: Finding) {
        if let Some(action) = &finding.remediation {
            self.action(action.clone());
        }
        self.findings.push(finding);
    }

    /// Record a finding and echo it inline in the current section
    pub fn flag(&mut self, finding: Finding) {
        let _ = writeln!(self.body, "  {}", finding.line());
        self.add(finding);
    }

    pub fn action(&mut self, action: impl Into<String>) {
        let action = action.into();
        if !self.actions.contains(&action) {
            self.actions.push(action);
        }
    }

    pub fn diagram(&mut self, diagram: Diagram) {
        self.diagrams.push(diagram);
    }

    pub fn summary(&self) -> ReportSummary {
        ReportSummary::from_findings(&self.findings)
    }

    pub fn has_severity(&self, severity: Severity) -> bool {
        self.findings.iter().any(|f| f.severity == severity)
    }

    /// Overall verdict from the worst finding tier
    pub fn verdict(&self) -> HealthVerdict {
        if self.has_severity(Severity::Critical) {
            HealthVerdict::Critical
        } else if self.has_severity(Severity::Warning) {
            HealthVerdict::Degraded
        } else {
            HealthVerdict::Healthy
        }
    }

    /// Findings of one tier, in discovery order
    pub fn findings_of(&self, severity: Severity) -> Vec<&Finding> {
        self.findings.iter().filter(|f| f.severity == severity).collect()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.title);
        let _ = writeln!(out, "{}", "=".repeat(self.title.chars().count()));
        out.push_str(&self.body);

        out.push_str("\nFINDINGS:\n");
        if self.findings.is_empty() {
            out.push_str("  No issues found\n");
        }
        for severity in [Severity::Critical, Severity::Warning, Severity::Info] {
            for finding in self.findings_of(severity) {
                let _ = writeln!(out, "  {}", finding.line());
            }
        }

        let _ = writeln!(out, "\n{}", self.summary().verdict_line());

        if !self.actions.is_empty() {
            out.push_str("\nSUGGESTED ACTIONS:\n");
            for (i, action) in self.actions.iter().enumerate() {
                let _ = writeln!(out, "  {}. {}", i + 1, action);
            }
        }

        for diagram in &self.diagrams {
            out.push('\n');
            out.push_str(&diagram.render());
        }
        out
    }
}

/// Stable descending selection of the first `n` items by `key`; ties keep discovery order
pub fn top_n_by<T, F>(items: &[T], n: usize, key: F) -> Vec<&T>
where
    F: Fn(&T) -> f64,
{
    let mut refs: Vec<&T> = items.iter().collect();
    refs.sort_by(|a, b| key(b).partial_cmp(&key(a)).unwrap_or(Ordering::Equal));
    refs.truncate(n);
    refs
}
