//! Dashboard page and its JSON twin

use axum::{extract::State, http::StatusCode, response::Response, Json};
use tracing::error;

use super::render_page;
use crate::aggregator::build_dashboard_snapshot;
use crate::error::Result;
use crate::models::DashboardSnapshot;
use crate::state::AppState;
use crate::views::DashboardTemplate;

/// GET /
pub async fn dashboard_page(State(state): State<AppState>) -> Response {
    match snapshot(&state).await {
        Ok(s) => render_page(StatusCode::OK, DashboardTemplate::from_snapshot(&s)),
        Err(e) => render_page(
            e.status_code(),
            DashboardTemplate::failed(Some(e.message().to_string())),
        ),
    }
}

/// GET /api/dashboard
pub async fn dashboard_json(State(state): State<AppState>) -> Result<Json<DashboardSnapshot>> {
    Ok(Json(snapshot(&state).await?))
}

async fn snapshot(state: &AppState) -> Result<DashboardSnapshot> {
    match build_dashboard_snapshot(&state.db).await {
        Ok(s) => {
            state.metrics.record_snapshot(s.notes.len());
            Ok(s)
        }
        Err(e) => {
            error!(error = %e, "Error fetching database metrics");
            state.metrics.inc_snapshot_failures();
            Err(e)
        }
    }
}
