//! HTTP tool API
//!
//! Exposes the tool registry over JSON:
//! - `GET /api/health`
//! - `GET /api/tools`
//! - `POST /api/tools/{name}` with the tool arguments as the request body

pub mod handlers;

pub use handlers::AppState;

use crate::error::{KdError, Result};
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Build the API router over shared state
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/tools", get(handlers::list_tools))
        .route("/api/tools/{name}", post(handlers::call_tool))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve the tool API until the process is interrupted
pub async fn start_server(addr: SocketAddr, state: AppState) -> Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Tool API listening on http://{}", addr);
    eprintln!("Tool API running at http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .map_err(|e| KdError::Config(format!("Server error: {}", e)))?;

    Ok(())
}
