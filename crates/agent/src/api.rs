//! Health, readiness and Prometheus endpoints served next to a pipeline loop

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use netpulse_lib::{health::HealthRegistry, observability::PipelineMetrics};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// State shared by the handlers
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: PipelineMetrics,
    /// `collector` or `analyzer`, echoed on `/`
    pub role: &'static str,
}

impl AppState {
    pub fn new(health_registry: HealthRegistry, metrics: PipelineMetrics) -> Self {
        Self {
            health_registry,
            metrics,
            role: "unknown",
        }
    }

    pub fn with_role(mut self, role: &'static str) -> Self {
        self.role = role;
        self
    }
}

#[derive(Serialize)]
struct AgentInfo {
    service: &'static str,
    version: &'static str,
    role: &'static str,
}

fn availability(ok: bool) -> StatusCode {
    if ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn info_handler(State(state): State<Arc<AppState>>) -> Json<AgentInfo> {
    Json(AgentInfo {
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        role: state.role,
    })
}

/// 200 while every stage is at least degraded, 503 once one is unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> Response {
    let report = state.health_registry.health().await;
    (availability(report.status.is_operational()), Json(report)).into_response()
}

async fn readyz(State(state): State<Arc<AppState>>) -> Response {
    let readiness = state.health_registry.readiness().await;
    (availability(readiness.ready), Json(readiness)).into_response()
}

async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.metrics.encode_text() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(info_handler))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Bind on all interfaces and serve until the task is dropped
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!(addr = %listener.local_addr()?, role = state.role, "API server listening");
    axum::serve(listener, create_router(state)).await?;
    Ok(())
}
