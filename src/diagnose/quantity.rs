//! Kubernetes resource quantity parsing and request/limit summation

use k8s_openapi::api::core::v1::{Container, Pod};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use std::collections::BTreeMap;

/// Parse a CPU quantity to millicores
pub fn cpu_millis(s: &str) -> i64 {
    let s = s.trim();
    if let Some(v) = s.strip_suffix('m') {
        v.parse::<f64>().map(|v| v as i64).unwrap_or(0)
    } else if let Some(v) = s.strip_suffix('u') {
        v.parse::<f64>().map(|v| (v / 1_000.0) as i64).unwrap_or(0)
    } else if let Some(v) = s.strip_suffix('n') {
        v.parse::<f64>().map(|v| (v / 1_000_000.0) as i64).unwrap_or(0)
    } else {
        s.parse::<f64>().map(|v| (v * 1000.0).round() as i64).unwrap_or(0)
    }
}

/// Parse a memory quantity to bytes
pub fn memory_bytes(s: &str) -> i64 {
    const BINARY: [(&str, f64); 6] = [
        ("Ki", 1024.0),
        ("Mi", 1_048_576.0),
        ("Gi", 1_073_741_824.0),
        ("Ti", 1_099_511_627_776.0),
        ("Pi", 1_125_899_906_842_624.0),
        ("Ei", 1_152_921_504_606_846_976.0),
    ];
    const DECIMAL: [(&str, f64); 7] = [
        ("k", 1e3),
        ("K", 1e3),
        ("M", 1e6),
        ("G", 1e9),
        ("T", 1e12),
        ("P", 1e15),
        ("E", 1e18),
    ];

    let s = s.trim();
    for (suffix, factor) in BINARY {
        if let Some(v) = s.strip_suffix(suffix) {
            return v.parse::<f64>().map(|v| (v * factor) as i64).unwrap_or(0);
        }
    }
    for (suffix, factor) in DECIMAL {
        if let Some(v) = s.strip_suffix(suffix) {
            return v.parse::<f64>().map(|v| (v * factor) as i64).unwrap_or(0);
        }
    }
    if let Some(v) = s.strip_suffix('m') {
        return v.parse::<f64>().map(|v| (v / 1000.0) as i64).unwrap_or(0);
    }
    // plain bytes, including exponent form such as 1e9
    s.parse::<f64>().map(|v| v as i64).unwrap_or(0)
}

fn lookup(map: Option<&BTreeMap<String, Quantity>>, key: &str) -> Option<String> {
    map.and_then(|m| m.get(key)).map(|q| q.0.clone())
}

/// CPU and memory totals in millicores and bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuMem {
    pub cpu_millis: i64,
    pub memory_bytes: i64,
}

impl CpuMem {
    pub fn add(&mut self, other: CpuMem) {
        self.cpu_millis += other.cpu_millis;
        self.memory_bytes += other.memory_bytes;
    }

    pub fn is_zero(&self) -> bool {
        self.cpu_millis == 0 && self.memory_bytes == 0
    }
}

/// Requests and limits of a container or pod
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Resources {
    pub requests: CpuMem,
    pub limits: CpuMem,
}

impl Resources {
    /// Either cpu or memory limit unset
    pub fn missing_limits(&self) -> bool {
        self.limits.cpu_millis == 0 || self.limits.memory_bytes == 0
    }

    /// Either cpu or memory request unset
    pub fn missing_requests(&self) -> bool {
        self.requests.cpu_millis == 0 || self.requests.memory_bytes == 0
    }
}

pub fn container_resources(container: &Container) -> Resources {
    let res = container.resources.as_ref();
    let requests = res.and_then(|r| r.requests.as_ref());
    let limits = res.and_then(|r| r.limits.as_ref());
    Resources {
        requests: CpuMem {
            cpu_millis: lookup(requests, "cpu").map(|s| cpu_millis(&s)).unwrap_or(0),
            memory_bytes: lookup(requests, "memory").map(|s| memory_bytes(&s)).unwrap_or(0),
        },
        limits: CpuMem {
            cpu_millis: lookup(limits, "cpu").map(|s| cpu_millis(&s)).unwrap_or(0),
            memory_bytes: lookup(limits, "memory").map(|s| memory_bytes(&s)).unwrap_or(0),
        },
    }
}

/// Sum of app container requests and limits
pub fn pod_resources(pod: &Pod) -> Resources {
    let mut total = Resources::default();
    if let Some(spec) = &pod.spec {
        for c in &spec.containers {
            let r = container_resources(c);
            total.requests.add(r.requests);
            total.limits.add(r.limits);
        }
    }
    total
}

/// CPU/memory/pods from a node capacity or allocatable map
pub fn node_quantities(map: Option<&BTreeMap<String, Quantity>>) -> (CpuMem, i64) {
    let cpu = lookup(map, "cpu").map(|s| cpu_millis(&s)).unwrap_or(0);
    let mem = lookup(map, "memory").map(|s| memory_bytes(&s)).unwrap_or(0);
    let pods = lookup(map, "pods").and_then(|s| s.parse::<i64>().ok()).unwrap_or(0);
    (
        CpuMem {
            cpu_millis: cpu,
            memory_bytes: mem,
        },
        pods,
    )
}
