use super::metrics::{node_metrics_resource, parse_node_metrics, parse_pod_metrics, pod_metrics_resource};
use super::{ClusterAccess, ListQuery, LogRequest, NodeUsage, PodUsage};
use crate::config::Limits;
use crate::error::{KdError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{
    Endpoints, Event, Namespace, Node, PersistentVolume, PersistentVolumeClaim, Pod, ResourceQuota,
    Service,
};
use k8s_openapi::api::networking::v1::{Ingress, NetworkPolicy};
use k8s_openapi::NamespaceResourceScope;
use kube::api::{DynamicObject, ListParams, LogParams};
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// [`ClusterAccess`] backed by a live API server
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
    limits: Limits,
    cancel: CancellationToken,
}

impl KubeCluster {
    pub fn new(client: Client, limits: Limits) -> Self {
        Self {
            client,
            limits,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort at the next accessor call once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// One bounded round trip; cancellation is checked before the call starts
    async fn call<T, F>(&self, what: &str, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, kube::Error>>,
    {
        if self.cancel.is_cancelled() {
            return Err(KdError::Cancelled);
        }
        debug!(call = what, "cluster request");
        match tokio::time::timeout(self.limits.timeout, fut).await {
            Ok(result) => result.map_err(KdError::from),
            Err(_) => Err(KdError::Timeout(what.to_string())),
        }
    }

    fn scoped<K>(&self, namespace: Option<&str>) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        <K as Resource>::DynamicType: Default,
    {
        match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }

    async fn list_scoped<K>(&self, what: &str, namespace: Option<&str>, params: ListParams) -> Result<Vec<K>>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        <K as Resource>::DynamicType: Default,
    {
        let api: Api<K> = self.scoped(namespace);
        Ok(self.call(what, api.list(&params)).await?.items)
    }

    async fn get_scoped<K>(&self, what: &str, namespace: &str, name: &str) -> Result<Option<K>>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        <K as Resource>::DynamicType: Default,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        self.call(what, api.get_opt(name)).await
    }
}

fn list_params(query: &ListQuery) -> ListParams {
    let mut params = ListParams::default();
    if let Some(labels) = query.label_selector.as_deref().filter(|s| !s.is_empty()) {
        params = params.labels(labels);
    }
    if let Some(fields) = query.field_selector.as_deref().filter(|s| !s.is_empty()) {
        params = params.fields(fields);
    }
    params
}

/// Best timestamp for an event: last seen, then event time, then creation
pub fn event_timestamp(event: &Event) -> Option<DateTime<Utc>> {
    event
        .last_timestamp
        .as_ref()
        .map(|t| t.0)
        .or_else(|| event.event_time.as_ref().map(|t| t.0))
        .or_else(|| event.metadata.creation_timestamp.as_ref().map(|t| t.0))
}

/// Most recent first, truncated to `max`
pub fn sort_and_cap_events(mut events: Vec<Event>, max: usize) -> Vec<Event> {
    events.sort_by(|a, b| event_timestamp(b).cmp(&event_timestamp(a)));
    events.truncate(max);
    events
}

/// Cap log text at `max_bytes` on a char boundary and append a marker when cut
pub fn truncate_logs(mut logs: String, max_bytes: usize) -> String {
    if logs.len() <= max_bytes {
        return logs;
    }
    let mut cut = max_bytes;
    while cut > 0 && !logs.is_char_boundary(cut) {
        cut -= 1;
    }
    logs.truncate(cut);
    logs.push_str(&format!("\n... [logs truncated at {}KB]", max_bytes / 1024));
    logs
}

#[async_trait]
impl ClusterAccess for KubeCluster {
    async fn list_namespaces(&self) -> Result<Vec<Namespace>> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        Ok(self.call("namespaces", api.list(&ListParams::default())).await?.items)
    }

    async fn list_pods(&self, namespace: Option<&str>, query: &ListQuery) -> Result<Vec<Pod>> {
        let mut pods: Vec<Pod> = self.list_scoped("pods", namespace, list_params(query)).await?;
        pods.truncate(self.limits.max_pods);
        Ok(pods)
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>> {
        self.get_scoped("pod", namespace, name).await
    }

    async fn pod_logs(&self, namespace: &str, name: &str, request: &LogRequest) -> Result<String> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = LogParams {
            container: request.container.clone(),
            tail_lines: request.tail_lines,
            previous: request.previous,
            since_seconds: request.since_seconds,
            ..Default::default()
        };
        let logs = self.call("pod logs", api.logs(name, &params)).await?;
        Ok(truncate_logs(logs, self.limits.max_log_bytes))
    }

    async fn list_events(&self, namespace: Option<&str>, query: &ListQuery) -> Result<Vec<Event>> {
        let events: Vec<Event> = self.list_scoped("events", namespace, list_params(query)).await?;
        Ok(sort_and_cap_events(events, self.limits.max_events))
    }

    async fn list_deployments(&self, namespace: Option<&str>) -> Result<Vec<Deployment>> {
        self.list_scoped("deployments", namespace, ListParams::default()).await
    }

    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Option<Deployment>> {
        self.get_scoped("deployment", namespace, name).await
    }

    async fn list_statefulsets(&self, namespace: Option<&str>) -> Result<Vec<StatefulSet>> {
        self.list_scoped("statefulsets", namespace, ListParams::default()).await
    }

    async fn list_daemonsets(&self, namespace: Option<&str>) -> Result<Vec<DaemonSet>> {
        self.list_scoped("daemonsets", namespace, ListParams::default()).await
    }

    async fn list_jobs(&self, namespace: Option<&str>) -> Result<Vec<Job>> {
        self.list_scoped("jobs", namespace, ListParams::default()).await
    }

    async fn list_nodes(&self) -> Result<Vec<Node>> {
        let api: Api<Node> = Api::all(self.client.clone());
        Ok(self.call("nodes", api.list(&ListParams::default())).await?.items)
    }

    async fn get_node(&self, name: &str) -> Result<Option<Node>> {
        let api: Api<Node> = Api::all(self.client.clone());
        self.call("node", api.get_opt(name)).await
    }

    async fn list_services(&self, namespace: Option<&str>) -> Result<Vec<Service>> {
        self.list_scoped("services", namespace, ListParams::default()).await
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>> {
        self.get_scoped("service", namespace, name).await
    }

    async fn list_ingresses(&self, namespace: Option<&str>) -> Result<Vec<Ingress>> {
        self.list_scoped("ingresses", namespace, ListParams::default()).await
    }

    async fn get_ingress(&self, namespace: &str, name: &str) -> Result<Option<Ingress>> {
        self.get_scoped("ingress", namespace, name).await
    }

    async fn get_endpoints(&self, namespace: &str, name: &str) -> Result<Option<Endpoints>> {
        self.get_scoped("endpoints", namespace, name).await
    }

    async fn list_pvcs(&self, namespace: Option<&str>) -> Result<Vec<PersistentVolumeClaim>> {
        self.list_scoped("persistentvolumeclaims", namespace, ListParams::default()).await
    }

    async fn list_pvs(&self) -> Result<Vec<PersistentVolume>> {
        let api: Api<PersistentVolume> = Api::all(self.client.clone());
        Ok(self.call("persistentvolumes", api.list(&ListParams::default())).await?.items)
    }

    async fn list_network_policies(&self, namespace: Option<&str>) -> Result<Vec<NetworkPolicy>> {
        self.list_scoped("networkpolicies", namespace, ListParams::default()).await
    }

    async fn list_resource_quotas(&self, namespace: Option<&str>) -> Result<Vec<ResourceQuota>> {
        self.list_scoped("resourcequotas", namespace, ListParams::default()).await
    }

    async fn node_metrics(&self) -> Result<Vec<NodeUsage>> {
        let api: Api<DynamicObject> = Api::all_with(self.client.clone(), &node_metrics_resource());
        match self.call("node metrics", api.list(&ListParams::default())).await {
            Ok(list) => Ok(list.items.iter().map(parse_node_metrics).collect()),
            Err(KdError::Cancelled) => Err(KdError::Cancelled),
            Err(e) => {
                debug!(error = %e, "node metrics unavailable");
                Err(KdError::MetricsUnavailable)
            }
        }
    }

    async fn pod_metrics(&self, namespace: Option<&str>, label_selector: Option<&str>) -> Result<Vec<PodUsage>> {
        let resource = pod_metrics_resource();
        let api: Api<DynamicObject> = match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &resource),
            None => Api::all_with(self.client.clone(), &resource),
        };
        let mut params = ListParams::default();
        if let Some(sel) = label_selector.filter(|s| !s.is_empty()) {
            params = params.labels(sel);
        }
        match self.call("pod metrics", api.list(&params)).await {
            Ok(list) => Ok(list.items.iter().map(parse_pod_metrics).collect()),
            Err(KdError::Cancelled) => Err(KdError::Cancelled),
            Err(e) => {
                debug!(error = %e, "pod metrics unavailable");
                Err(KdError::MetricsUnavailable)
            }
        }
    }
}
