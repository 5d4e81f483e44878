//! Database list page and its JSON twin

use axum::{extract::State, http::StatusCode, response::Response, Json};
use tracing::error;

use super::render_page;
use crate::aggregator::build_database_list_snapshot;
use crate::error::Result;
use crate::models::DatabaseListSnapshot;
use crate::state::AppState;
use crate::views::DatabasesTemplate;

/// GET /databases
pub async fn databases_page(State(state): State<AppState>) -> Response {
    match snapshot(&state).await {
        Ok(s) => render_page(StatusCode::OK, DatabasesTemplate::from_snapshot(&s)),
        Err(e) => render_page(
            e.status_code(),
            DatabasesTemplate::failed(Some(e.message().to_string())),
        ),
    }
}

/// GET /api/databases
pub async fn databases_json(
    State(state): State<AppState>,
) -> Result<Json<DatabaseListSnapshot>> {
    Ok(Json(snapshot(&state).await?))
}

async fn snapshot(state: &AppState) -> Result<DatabaseListSnapshot> {
    match build_database_list_snapshot(&state.db).await {
        Ok(s) => {
            state.metrics.record_snapshot(0);
            Ok(s)
        }
        Err(e) => {
            error!(error = %e, "Error fetching databases list");
            state.metrics.inc_snapshot_failures();
            Err(e)
        }
    }
}
