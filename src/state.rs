//! Application state shared across handlers

use crate::db::Database;
use crate::routes::metrics::Metrics;
use std::sync::Arc;
use std::time::Instant;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: Arc<Database>,
    /// Application metrics for Prometheus
    pub metrics: Arc<Metrics>,
    /// Process start, for the liveness probe
    pub started_at: Instant,
}

impl AppState {
    /// Create new application state around an initialized pool.
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(db),
            metrics: Arc::new(Metrics::new()),
            started_at: Instant::now(),
        }
    }
}
