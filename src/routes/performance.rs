//! Live performance counters polled by the dashboard

use axum::{extract::State, Json};
use tracing::error;

use crate::aggregator::build_performance_snapshot;
use crate::error::Result;
use crate::models::PerformanceSnapshot;
use crate::state::AppState;

/// GET /api/performance
pub async fn performance(State(state): State<AppState>) -> Result<Json<PerformanceSnapshot>> {
    match build_performance_snapshot(&state.db).await {
        Ok(snapshot) => {
            state.metrics.record_snapshot(0);
            Ok(Json(snapshot))
        }
        Err(e) => {
            error!(error = %e, "Error fetching performance metrics");
            state.metrics.inc_snapshot_failures();
            Err(e)
        }
    }
}
