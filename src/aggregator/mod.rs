//! Metrics aggregation over the PostgreSQL statistics views
//!
//! Each builder takes the shared [`Database`](crate::db::Database), runs a
//! fixed set of read-only queries and returns one snapshot. Nothing is cached:
//! every call reads live server state.

mod dashboard;
mod databases;
pub mod format;
mod health;
mod outcome;
mod performance;
mod queries;

pub use dashboard::build_dashboard_snapshot;
pub use databases::build_database_list_snapshot;
pub use health::{build_health_snapshot, LONG_RUNNING_THRESHOLD};
pub use performance::build_performance_snapshot;
