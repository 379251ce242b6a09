//! Tests for pod health, endpoint health and ingress path matching

use crate::common::{create_mock_endpoints, create_mock_pod, set_container_status};
use kubedoctor::diagnose::health::{is_pod_healthy, pod_phase_reason};
use kubedoctor::diagnose::topology::{endpoint_health_from, match_path};
use kubedoctor::diagnose::HealthVerdict;

#[test]
fn test_pod_health_follows_phase_and_container_state() {
    for phase in ["Pending", "Running", "Succeeded", "Failed", "Unknown"] {
        for (ready, waiting) in [(true, None), (false, None), (true, Some("ContainerCreating")), (false, Some("CrashLoopBackOff"))] {
            let mut pod = create_mock_pod("p", "default", phase);
            set_container_status(&mut pod, ready, waiting, 0);
            let expected = phase == "Succeeded" || (phase == "Running" && ready && waiting.is_none());
            assert_eq!(is_pod_healthy(&pod), expected, "phase={} ready={} waiting={:?}", phase, ready, waiting);
        }
    }
}

#[test]
fn test_running_pod_without_statuses_is_healthy() {
    let pod = create_mock_pod("p", "default", "Running");
    assert!(is_pod_healthy(&pod));
}

#[test]
fn test_waiting_reason_wins_over_phase() {
    let mut pod = create_mock_pod("p", "default", "Running");
    set_container_status(&mut pod, false, Some("CrashLoopBackOff"), 4);
    assert_eq!(pod_phase_reason(&pod), "CrashLoopBackOff");
}

#[test]
fn test_endpoint_counts_add_up() {
    let cases: [(&[&str], &[&str]); 4] = [
        (&[], &[]),
        (&["10.0.0.1"], &[]),
        (&[], &["10.0.0.2", "10.0.0.3"]),
        (&["10.0.0.1", "10.0.0.4"], &["10.0.0.2"]),
    ];
    for (ready, not_ready) in cases {
        let ep = create_mock_endpoints("api", "shop", ready, not_ready);
        let health = endpoint_health_from("shop", "api", Some(&ep));
        assert_eq!(health.total_endpoints, health.ready_count + health.not_ready_count);
        assert_eq!(health.ready_count, ready.len());
        assert_eq!(health.not_ready_count, not_ready.len());
    }
}

#[test]
fn test_missing_endpoints_object_is_zero_and_critical() {
    let health = endpoint_health_from("shop", "api", None);
    assert_eq!(health.total_endpoints, 0);
    assert_eq!(health.verdict(), HealthVerdict::Critical);
}

#[test]
fn test_exact_match_is_byte_equality() {
    for (pattern, path) in [("/v1", "/v1"), ("/v1", "/v1/"), ("/v1", "/V1"), ("/", "/")] {
        assert_eq!(match_path(pattern, path, "Exact"), pattern == path);
    }
}

#[test]
fn test_prefix_match_is_starts_with() {
    for (pattern, path) in [("/v1", "/v1/users"), ("/v1", "/v2"), ("/", "/anything"), ("/api", "/ap")] {
        assert_eq!(match_path(pattern, path, "Prefix"), path.starts_with(pattern));
    }
    assert!(match_path("/", "/deep/nested/path", "Prefix"));
}
