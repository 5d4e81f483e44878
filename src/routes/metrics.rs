//! Prometheus metrics endpoint

use axum::extract::State;
use axum::response::IntoResponse;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::state::AppState;

/// Application metrics for Prometheus
#[derive(Default)]
pub struct Metrics {
    /// Total requests processed
    requests_total: AtomicU64,
    /// Snapshots returned to a page or API caller
    snapshots_built_total: AtomicU64,
    /// Snapshot builds that failed as a whole
    snapshot_failures_total: AtomicU64,
    /// Sections left empty in otherwise successful snapshots
    degraded_sections_total: AtomicU64,
    /// Status probes that reached the database
    status_up_total: AtomicU64,
    /// Status probes that did not
    status_down_total: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_requests(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_snapshot(&self, degraded_sections: usize) {
        self.snapshots_built_total.fetch_add(1, Ordering::Relaxed);
        self.degraded_sections_total
            .fetch_add(degraded_sections as u64, Ordering::Relaxed);
    }

    pub fn inc_snapshot_failures(&self) {
        self.snapshot_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_status(&self, up: bool) {
        if up {
            self.status_up_total.fetch_add(1, Ordering::Relaxed);
        } else {
            self.status_down_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn get_metrics(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            snapshots_built_total: self.snapshots_built_total.load(Ordering::Relaxed),
            snapshot_failures_total: self.snapshot_failures_total.load(Ordering::Relaxed),
            degraded_sections_total: self.degraded_sections_total.load(Ordering::Relaxed),
            status_up_total: self.status_up_total.load(Ordering::Relaxed),
            status_down_total: self.status_down_total.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub snapshots_built_total: u64,
    pub snapshot_failures_total: u64,
    pub degraded_sections_total: u64,
    pub status_up_total: u64,
    pub status_down_total: u64,
}

/// GET /metrics
///
/// Returns Prometheus-format metrics
pub async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.metrics.get_metrics();

    let output = format!(
        r#"# HELP pgmonitor_requests_total Total number of HTTP requests processed
# TYPE pgmonitor_requests_total counter
pgmonitor_requests_total {}

# HELP pgmonitor_snapshots_built_total Snapshots built successfully
# TYPE pgmonitor_snapshots_built_total counter
pgmonitor_snapshots_built_total {}

# HELP pgmonitor_snapshot_failures_total Snapshot builds that failed
# TYPE pgmonitor_snapshot_failures_total counter
pgmonitor_snapshot_failures_total {}

# HELP pgmonitor_degraded_sections_total Snapshot sections left empty after a query failure
# TYPE pgmonitor_degraded_sections_total counter
pgmonitor_degraded_sections_total {}

# HELP pgmonitor_status_checks_total Database status probes by result
# TYPE pgmonitor_status_checks_total counter
pgmonitor_status_checks_total{{result="up"}} {}
pgmonitor_status_checks_total{{result="down"}} {}

# HELP pgmonitor_info Build information
# TYPE pgmonitor_info gauge
pgmonitor_info{{version="{}"}} 1
"#,
        snapshot.requests_total,
        snapshot.snapshots_built_total,
        snapshot.snapshot_failures_total,
        snapshot.degraded_sections_total,
        snapshot.status_up_total,
        snapshot.status_down_total,
        env!("CARGO_PKG_VERSION"),
    );

    (
        [(axum::http::header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        output,
    )
}
