//! Tests for the HTTP tool API

use crate::common::*;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use kubedoctor::config::AppConfig;
use kubedoctor::server::{router, AppState};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

fn app(cluster: FakeCluster) -> axum::Router {
    router(AppState::new(Arc::new(cluster), AppConfig::default()))
}

async fn send(app: axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let request = Request::builder().uri("/api/health").body(Body::empty()).unwrap();
    let (status, body) = send(app(FakeCluster::new()), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_list_tools() {
    let request = Request::builder().uri("/api/tools").body(Body::empty()).unwrap();
    let (status, body) = send(app(FakeCluster::new()), request).await;
    assert_eq!(status, StatusCode::OK);
    let tools = body.as_array().unwrap();
    assert_eq!(tools.len(), 18);
    assert!(tools.iter().any(|t| t["name"] == "check_dns_health"));
}

#[tokio::test]
async fn test_call_tool_renders_report() {
    let mut cluster = FakeCluster::new();
    cluster.pods.push(create_crashing_pod("api-1", "shop", &[]));

    let (status, body) = send(app(cluster), post("/api/tools/find_unhealthy_pods", r#"{"namespace":"shop"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tool"], "find_unhealthy_pods");
    assert!(body["output"].as_str().unwrap().contains("Pod 'shop/api-1' is unhealthy"));
}

#[tokio::test]
async fn test_empty_body_means_no_arguments() {
    let (status, body) = send(app(FakeCluster::new()), post("/api/tools/find_unhealthy_pods", "")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["output"].as_str().unwrap().contains("No unhealthy pods found."));
}

#[tokio::test]
async fn test_error_statuses() {
    let (status, body) = send(app(FakeCluster::new()), post("/api/tools/nope", "{}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("nope"));

    let (status, _) = send(app(FakeCluster::new()), post("/api/tools/diagnose_pod", "{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(app(FakeCluster::new()), post("/api/tools/diagnose_pod", r#"{"namespace":"shop"}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let args = r#"{"namespace":"shop","pod":"ghost"}"#;
    let (status, _) = send(app(FakeCluster::new()), post("/api/tools/diagnose_pod", args)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let mut failing = FakeCluster::new();
    failing.failing.insert("list_pods");
    let (status, _) = send(app(failing), post("/api/tools/find_unhealthy_pods", "{}")).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}
