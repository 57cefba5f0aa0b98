use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use shuttle_axum::axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::pipeline::{Pipeline, PipelineSnapshot, PipelineState};

pub const SERVICE_NAME: &str = "homerun-tracker";

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/ping", get(ping))
        .route("/api/status", get(status))
        .route("/api/start", post(start))
        .route("/api/stop", post(stop))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResp {
    status: &'static str,
    service: &'static str,
    timestamp: String,
}

#[derive(Serialize)]
struct PingResp {
    status: &'static str,
    timestamp: String,
}

#[derive(Serialize)]
struct ControlResp {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'static str>,
}

async fn health() -> Json<HealthResp> {
    Json(HealthResp {
        status: "healthy",
        service: SERVICE_NAME,
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Keep-alive target for hosts that sleep idle services.
async fn ping() -> Json<PingResp> {
    Json(PingResp {
        status: "alive",
        timestamp: Utc::now().to_rfc3339(),
    })
}

async fn status(State(state): State<AppState>) -> Json<PipelineSnapshot> {
    Json(state.pipeline.snapshot())
}

async fn start(State(state): State<AppState>) -> Json<ControlResp> {
    if state.pipeline.start() {
        Json(ControlResp {
            success: true,
            error: None,
        })
    } else {
        let error = match state.pipeline.state() {
            PipelineState::Stopping => "stop in progress",
            _ => "already running",
        };
        Json(ControlResp {
            success: false,
            error: Some(error),
        })
    }
}

async fn stop(State(state): State<AppState>) -> Json<ControlResp> {
    if state.pipeline.stop().await {
        Json(ControlResp {
            success: true,
            error: None,
        })
    } else {
        Json(ControlResp {
            success: false,
            error: Some("not running"),
        })
    }
}
