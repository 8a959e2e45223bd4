//! Discovery Metrics API Server
//!
//! HTTP API exposing the recent discovery metrics for monitoring.

use crate::application::CollectionHandle;
use crate::error::CollectionError;
use crate::infrastructure::shutdown::ShutdownController;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Health response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub initialized: bool,
    pub stored_metrics: usize,
}

/// API Server state.
#[derive(Clone)]
pub struct ApiState {
    pub collection: CollectionHandle,
}

impl ApiState {
    pub fn new(collection: CollectionHandle) -> Self {
        Self { collection }
    }
}

/// API Server for discovery metrics.
pub struct ApiServer {
    listen_addr: String,
    state: ApiState,
}

impl ApiServer {
    pub fn new(listen_addr: String, collection: CollectionHandle) -> Self {
        Self {
            listen_addr,
            state: ApiState::new(collection),
        }
    }

    /// Build the router.
    pub fn router(state: ApiState) -> Router {
        Router::new()
            // Health endpoint
            .route("/health", get(health_handler))
            // Raw metrics for the last N seconds
            .route("/api/discovery-metrics-raw/:seconds", get(metrics_raw_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Run the API server until `shutdown` is requested.
    #[cfg_attr(coverage_nightly, coverage(off))]
    pub async fn run(&self, shutdown: ShutdownController) -> anyhow::Result<()> {
        let app = Self::router(self.state.clone());

        let listener = TcpListener::bind(&self.listen_addr).await?;
        tracing::info!("discovery metrics API listening on {}", self.listen_addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await?;
        Ok(())
    }
}

/// Start of the window covering the last `seconds` seconds.
///
/// Windows reaching before the representable range cover everything.
fn window_start(now: DateTime<Utc>, seconds: u64) -> DateTime<Utc> {
    i64::try_from(seconds)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

// Handler functions

async fn health_handler(State(state): State<ApiState>) -> impl IntoResponse {
    let collection = state.collection.get();
    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        initialized: collection.is_some(),
        stored_metrics: collection.map(|c| c.len()).unwrap_or(0),
    };
    Json(response)
}

async fn metrics_raw_handler(
    State(state): State<ApiState>,
    Path(seconds): Path<u64>,
) -> Response {
    let since = window_start(Utc::now(), seconds);

    match state.collection.json_since(since) {
        Ok(metrics) => (StatusCode::OK, Json(metrics.unwrap_or_default())).into_response(),
        Err(e @ CollectionError::NilCollection) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}
