//! metrics.k8s.io usage records

use crate::diagnose::quantity::{cpu_millis, memory_bytes, CpuMem};
use kube::api::DynamicObject;
use kube::discovery::ApiResource;
use serde_json::Value;

pub(crate) fn node_metrics_resource() -> ApiResource {
    ApiResource {
        group: "metrics.k8s.io".to_string(),
        version: "v1beta1".to_string(),
        api_version: "metrics.k8s.io/v1beta1".to_string(),
        kind: "NodeMetrics".to_string(),
        plural: "nodes".to_string(),
    }
}

pub(crate) fn pod_metrics_resource() -> ApiResource {
    ApiResource {
        group: "metrics.k8s.io".to_string(),
        version: "v1beta1".to_string(),
        api_version: "metrics.k8s.io/v1beta1".to_string(),
        kind: "PodMetrics".to_string(),
        plural: "pods".to_string(),
    }
}

/// Live usage of one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeUsage {
    pub name: String,
    pub usage: CpuMem,
}

/// Live usage of one container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerUsage {
    pub name: String,
    pub usage: CpuMem,
}

/// Live usage of one pod, per container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodUsage {
    pub namespace: String,
    pub name: String,
    pub containers: Vec<ContainerUsage>,
}

impl PodUsage {
    pub fn total(&self) -> CpuMem {
        let mut total = CpuMem::default();
        for c in &self.containers {
            total.add(c.usage);
        }
        total
    }

    pub fn container(&self, name: &str) -> Option<&ContainerUsage> {
        self.containers.iter().find(|c| c.name == name)
    }

    /// `namespace/name`
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

fn usage_of(value: Option<&Value>) -> CpuMem {
    let field = |key: &str| value.and_then(|u| u.get(key)).and_then(Value::as_str);
    CpuMem {
        cpu_millis: field("cpu").map(cpu_millis).unwrap_or(0),
        memory_bytes: field("memory").map(memory_bytes).unwrap_or(0),
    }
}

pub fn parse_node_metrics(obj: &DynamicObject) -> NodeUsage {
    NodeUsage {
        name: obj.metadata.name.clone().unwrap_or_default(),
        usage: usage_of(obj.data.get("usage")),
    }
}

pub fn parse_pod_metrics(obj: &DynamicObject) -> PodUsage {
    let containers = obj
        .data
        .get("containers")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|c| ContainerUsage {
                    name: c.get("name").and_then(Value::as_str).unwrap_or_default().to_string(),
                    usage: usage_of(c.get("usage")),
                })
                .collect()
        })
        .unwrap_or_default();

    PodUsage {
        namespace: obj.metadata.namespace.clone().unwrap_or_default(),
        name: obj.metadata.name.clone().unwrap_or_default(),
        containers,
    }
}
