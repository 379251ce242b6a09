//! Kubernetes client abstraction
//!
//! Engines never talk to `kube::Client` directly; they go through
//! [`ClusterAccess`], which [`KubeCluster`] implements with per-call timeouts,
//! truncation ceilings and cancellation checks.

mod cluster;
pub mod metrics;

pub use cluster::{event_timestamp, sort_and_cap_events, truncate_logs, KubeCluster};
pub use metrics::{ContainerUsage, NodeUsage, PodUsage};

use crate::error::{KdError, Result};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{
    Endpoints, Event, Namespace, Node, PersistentVolume, PersistentVolumeClaim, Pod, ResourceQuota,
    Service,
};
use k8s_openapi::api::networking::v1::{Ingress, NetworkPolicy};
use kube::{config::KubeConfigOptions, Client, Config};

/// Create a Kubernetes client for the specified context
pub async fn create_client(context: Option<&str>) -> Result<Client> {
    let config = load_config(context).await?;
    Client::try_from(config).map_err(KdError::from)
}

/// Load Kubernetes configuration
async fn load_config(context: Option<&str>) -> Result<Config> {
    let options = KubeConfigOptions {
        context: context.map(String::from),
        ..Default::default()
    };

    Config::from_kubeconfig(&options)
        .await
        .map_err(|e| KdError::Config(format!("Failed to load kubeconfig: {e}")))
}

/// Label and field selectors for a list call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub label_selector: Option<String>,
    pub field_selector: Option<String>,
}

impl ListQuery {
    pub fn labels(selector: impl Into<String>) -> Self {
        Self {
            label_selector: Some(selector.into()),
            field_selector: None,
        }
    }

    pub fn fields(selector: impl Into<String>) -> Self {
        Self {
            label_selector: None,
            field_selector: Some(selector.into()),
        }
    }

    /// Events whose involved object has this name
    pub fn involving(name: &str) -> Self {
        Self::fields(format!("involvedObject.name={}", name))
    }
}

/// Options for a single log fetch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogRequest {
    pub container: Option<String>,
    pub tail_lines: Option<i64>,
    pub previous: bool,
    pub since_seconds: Option<i64>,
}

impl LogRequest {
    pub fn tail(container: Option<&str>, lines: i64) -> Self {
        Self {
            container: container.map(str::to_string),
            tail_lines: Some(lines),
            ..Default::default()
        }
    }

    pub fn previous(mut self) -> Self {
        self.previous = true;
        self
    }

    pub fn since_seconds(mut self, secs: i64) -> Self {
        self.since_seconds = Some(secs);
        self
    }
}

/// Read-only view of a cluster used by every diagnostic engine.
///
/// A namespace of `None` means all namespaces. `get_*` calls return
/// `Ok(None)` for objects that do not exist; errors are reserved for
/// transport, authorization, timeout and cancellation failures. Metrics calls
/// return [`KdError::MetricsUnavailable`] when no metrics backend answers.
#[async_trait]
pub trait ClusterAccess: Send + Sync {
    async fn list_namespaces(&self) -> Result<Vec<Namespace>>;
    async fn list_pods(&self, namespace: Option<&str>, query: &ListQuery) -> Result<Vec<Pod>>;
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>>;
    async fn pod_logs(&self, namespace: &str, name: &str, request: &LogRequest) -> Result<String>;
    async fn list_events(&self, namespace: Option<&str>, query: &ListQuery) -> Result<Vec<Event>>;
    async fn list_deployments(&self, namespace: Option<&str>) -> Result<Vec<Deployment>>;
    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Option<Deployment>>;
    async fn list_statefulsets(&self, namespace: Option<&str>) -> Result<Vec<StatefulSet>>;
    async fn list_daemonsets(&self, namespace: Option<&str>) -> Result<Vec<DaemonSet>>;
    async fn list_jobs(&self, namespace: Option<&str>) -> Result<Vec<Job>>;
    async fn list_nodes(&self) -> Result<Vec<Node>>;
    async fn get_node(&self, name: &str) -> Result<Option<Node>>;
    async fn list_services(&self, namespace: Option<&str>) -> Result<Vec<Service>>;
    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>>;
    async fn list_ingresses(&self, namespace: Option<&str>) -> Result<Vec<Ingress>>;
    async fn get_ingress(&self, namespace: &str, name: &str) -> Result<Option<Ingress>>;
    async fn get_endpoints(&self, namespace: &str, name: &str) -> Result<Option<Endpoints>>;
    async fn list_pvcs(&self, namespace: Option<&str>) -> Result<Vec<PersistentVolumeClaim>>;
    async fn list_pvs(&self) -> Result<Vec<PersistentVolume>>;
    async fn list_network_policies(&self, namespace: Option<&str>) -> Result<Vec<NetworkPolicy>>;
    async fn list_resource_quotas(&self, namespace: Option<&str>) -> Result<Vec<ResourceQuota>>;
    async fn node_metrics(&self) -> Result<Vec<NodeUsage>>;
    async fn pod_metrics(&self, namespace: Option<&str>, label_selector: Option<&str>) -> Result<Vec<PodUsage>>;
}
