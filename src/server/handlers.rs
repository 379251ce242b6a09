//! HTTP handlers for the tool API

use crate::client::ClusterAccess;
use crate::config::AppConfig;
use crate::error::KdError;
use crate::tools::{self, ToolSpec};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub cluster: Arc<dyn ClusterAccess>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(cluster: Arc<dyn ClusterAccess>, config: AppConfig) -> Self {
        Self {
            cluster,
            config: Arc::new(config),
        }
    }
}

/// API error response
#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    pub status: StatusCode,
    pub error: String,
}

impl From<KdError> for ApiError {
    fn from(e: KdError) -> Self {
        let status = match &e {
            KdError::UnknownTool(_) => StatusCode::NOT_FOUND,
            KdError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            e if e.is_not_found() => StatusCode::NOT_FOUND,
            _ => StatusCode::BAD_GATEWAY,
        };
        Self {
            status,
            error: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self)).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ToolResponse {
    pub tool: String,
    pub output: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn list_tools() -> Json<Vec<ToolSpec>> {
    Json(tools::registry())
}

/// Run a tool; an absent or empty body means no arguments
pub async fn call_tool(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: String,
) -> std::result::Result<Json<ToolResponse>, ApiError> {
    let args = if body.trim().is_empty() {
        Value::Object(Default::default())
    } else {
        serde_json::from_str(&body).map_err(|e| ApiError {
            status: StatusCode::BAD_REQUEST,
            error: format!("request body is not valid JSON: {}", e),
        })?
    };

    let report = tools::invoke_with(state.cluster.as_ref(), &state.config, &name, args)
        .await
        .map_err(|e| {
            warn!(tool = %name, error = %e, "tool call failed");
            ApiError::from(e)
        })?;

    Ok(Json(ToolResponse {
        tool: name,
        output: report.render(),
    }))
}
