//! Diagnostic types and structures

use crate::mermaid::Style;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity level for findings
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The layer cannot serve traffic
    Critical,
    /// Degraded but functioning
    Warning,
    /// Advisory
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Critical => write!(f, "CRITICAL"),
            Severity::Warning => write!(f, "WARNING"),
            Severity::Info => write!(f, "INFO"),
        }
    }
}

impl From<Severity> for Style {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Critical => Style::Critical,
            Severity::Warning => Style::Warning,
            Severity::Info => Style::Info,
        }
    }
}

/// Identifies any Kubernetes object
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: String,
    pub namespace: Option<String>,
    pub name: String,
}

impl ResourceRef {
    pub fn new(kind: impl Into<String>, namespace: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            namespace: namespace.map(str::to_string),
            name: name.into(),
        }
    }

    pub fn pod(namespace: &str, name: &str) -> Self {
        Self::new("Pod", Some(namespace), name)
    }

    pub fn service(namespace: &str, name: &str) -> Self {
        Self::new("Service", Some(namespace), name)
    }

    pub fn ingress(namespace: &str, name: &str) -> Self {
        Self::new("Ingress", Some(namespace), name)
    }

    pub fn node(name: &str) -> Self {
        Self::new("Node", None, name)
    }

    pub fn namespace(name: &str) -> Self {
        Self::new("Namespace", None, name)
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}/{}", self.kind, ns, self.name),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

/// Health of one resource at a point in time; always recomputed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthVerdict {
    Healthy,
    Degraded,
    Critical,
    Unknown,
}

impl HealthVerdict {
    pub fn style(&self) -> Style {
        match self {
            HealthVerdict::Healthy => Style::Healthy,
            HealthVerdict::Degraded => Style::Warning,
            HealthVerdict::Critical => Style::Critical,
            HealthVerdict::Unknown => Style::External,
        }
    }
}

/// A single diagnostic observation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    pub subject: Option<ResourceRef>,
    pub message: String,
    /// Suggested remediation, collected into the report's action list
    pub remediation: Option<String>,
}

impl Finding {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            subject: None,
            message: message.into(),
            remediation: None,
        }
    }

    pub fn critical(message: impl Into<String>) -> Self {
        Self::new(Severity::Critical, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Severity::Info, message)
    }

    /// Set the affected resource
    pub fn with_subject(mut self, subject: ResourceRef) -> Self {
        self.subject = Some(subject);
        self
    }

    /// Set remediation suggestion
    pub fn with_remediation(mut self, remediation: impl Into<String>) -> Self {
        self.remediation = Some(remediation.into());
        self
    }

    /// `[SEVERITY] message`
    pub fn line(&self) -> String {
        format!("[{}] {}", self.severity, self.message)
    }
}

/// Ready and not-ready addresses behind one Service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EndpointHealth {
    pub service: Option<ResourceRef>,
    pub total_endpoints: usize,
    pub ready_count: usize,
    pub not_ready_count: usize,
    pub ready_addresses: Vec<EndpointAddress>,
    pub not_ready_addresses: Vec<EndpointAddress>,
}

impl EndpointHealth {
    pub fn verdict(&self) -> HealthVerdict {
        if self.ready_count == 0 {
            HealthVerdict::Critical
        } else if self.not_ready_count > 0 {
            HealthVerdict::Degraded
        } else {
            HealthVerdict::Healthy
        }
    }
}

/// One endpoint address; the pod is referenced by name only
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EndpointAddress {
    pub ip: String,
    pub pod_name: Option<String>,
    pub node_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::High => write!(f, "high"),
            Confidence::Medium => write!(f, "medium"),
            Confidence::Low => write!(f, "low"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencySource {
    Env,
    ConfigMap,
    Port,
}

impl fmt::Display for DependencySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencySource::Env => write!(f, "env"),
            DependencySource::ConfigMap => write!(f, "configmap"),
            DependencySource::Port => write!(f, "port"),
        }
    }
}

/// Inferred, non-authoritative service-to-service edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceDependency {
    pub from_service: String,
    pub to_service: String,
    pub namespace: String,
    pub confidence: Confidence,
    pub source: DependencySource,
}

/// Occurrences of a literal pattern in log text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorPatternCount {
    pub pattern: String,
    pub count: usize,
}

/// Metrics backend result that keeps "not installed" distinct from "zero usage"
#[derive(Debug, Clone, PartialEq)]
pub enum Metrics<T> {
    Available(T),
    Unavailable(String),
}

impl<T> Metrics<T> {
    pub fn available(&self) -> Option<&T> {
        match self {
            Metrics::Available(v) => Some(v),
            Metrics::Unavailable(_) => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Metrics::Available(_))
    }
}
