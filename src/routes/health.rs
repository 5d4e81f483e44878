//! Liveness, readiness, database status and the health diagnostics page

use axum::{
    extract::State,
    http::StatusCode,
    response::Response,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, warn};

use super::render_page;
use crate::aggregator::build_health_snapshot;
use crate::error::Result;
use crate::models::HealthSnapshot;
use crate::state::AppState;
use crate::views::HealthTemplate;

/// Liveness response
#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
}

/// Readiness response
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Database status response
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// GET /api/healthz
///
/// Process liveness, independent of the database.
pub async fn healthz(State(state): State<AppState>) -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}

/// GET /api/ready
///
/// 503 until the database answers a trivial query.
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    match state.db.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ReadinessResponse {
                status: "ready",
                error: None,
            }),
        ),
        Err(e) => {
            warn!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadinessResponse {
                    status: "not_ready",
                    error: Some(e.message().to_string()),
                }),
            )
        }
    }
}

/// GET /api/status
///
/// Always 200; a database failure is reported in the body.
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let response = match state.db.server_time().await {
        Ok(now) => StatusResponse {
            status: "up",
            server_time: Some(now),
            error: None,
        },
        Err(e) => {
            warn!(error = %e, "Database status probe failed");
            StatusResponse {
                status: "down",
                server_time: None,
                error: Some(e.message().to_string()),
            }
        }
    };
    state.metrics.record_status(response.status == "up");
    Json(response)
}

/// GET /health
///
/// Database health diagnostics page.
pub async fn health_page(State(state): State<AppState>) -> Response {
    match snapshot(&state).await {
        Ok(s) => render_page(StatusCode::OK, HealthTemplate::from_snapshot(&s)),
        Err(e) => {
            let status = e.status_code();
            render_page(status, HealthTemplate::failed(Some(e.message().to_string())))
        }
    }
}

/// GET /api/health
pub async fn health_json(State(state): State<AppState>) -> Result<Json<HealthSnapshot>> {
    Ok(Json(snapshot(&state).await?))
}

async fn snapshot(state: &AppState) -> Result<HealthSnapshot> {
    match build_health_snapshot(&state.db).await {
        Ok(s) => {
            state.metrics.record_snapshot(s.notes.len());
            Ok(s)
        }
        Err(e) => {
            error!(error = %e, "Error fetching database health");
            state.metrics.inc_snapshot_failures();
            Err(e)
        }
    }
}

