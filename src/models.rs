//! Snapshot models produced by the aggregator
//!
//! Every snapshot is built fresh per request and serialized as-is by the JSON
//! endpoints. Fields backed by a query that failed are `None`; the reason is
//! recorded in the snapshot's `notes`.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A byte count together with its `pg_size_pretty`-style rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Size {
    pub bytes: i64,
    pub pretty: String,
}

/// Why a section of a snapshot is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    /// The view, function or extension is not installed or enabled.
    Unavailable,
    /// The query failed for another reason (e.g. permission denied).
    Failed,
}

/// Advisory note attached to a partially built snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionNote {
    pub section: &'static str,
    pub kind: NoteKind,
    pub message: String,
}

/// Rows from an optional statistics source such as `pg_stat_statements`.
///
/// `available == false` means the source is not installed; `rows` is then
/// always empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionalRows<T> {
    pub available: bool,
    pub rows: Vec<T>,
}

impl<T> OptionalRows<T> {
    pub fn available(rows: Vec<T>) -> Self {
        Self {
            available: true,
            rows,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            rows: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub collected_at: DateTime<Utc>,
    pub server: Option<ServerStatus>,
    pub connections: Option<ConnectionCounts>,
    pub max_connections: Option<i64>,
    pub database_size: Option<DatabaseSize>,
    pub largest_tables: Option<Vec<TableSize>>,
    pub query_totals: Option<QueryTotals>,
    pub database_sizes: Option<Vec<DatabaseSize>>,
    pub recent_activity: Option<Vec<ActivitySample>>,
    pub activity_series: Option<Vec<ActivityBucket>>,
    pub slow_queries: Option<OptionalRows<SlowQuery>>,
    pub index_usage: Option<Vec<IndexUsage>>,
    pub notes: Vec<SectionNote>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerStatus {
    pub version: String,
    pub uptime_seconds: i64,
    /// e.g. "2 days 5 minutes"
    pub uptime: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectionCounts {
    pub total: i64,
    pub active: i64,
    pub idle: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseSize {
    pub name: String,
    /// `None` when the connecting role may not connect to the database.
    pub size: Option<Size>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSize {
    pub schema: String,
    pub name: String,
    pub size: Size,
}

/// Row and transaction counters summed over all databases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueryTotals {
    pub rows_returned: i64,
    pub rows_fetched: i64,
    pub rows_inserted: i64,
    pub rows_updated: i64,
    pub rows_deleted: i64,
    pub commits: i64,
    pub rollbacks: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivitySample {
    pub pid: i32,
    pub user: String,
    pub database: String,
    pub state: String,
    pub wait_event_type: Option<String>,
    pub wait_event: Option<String>,
    pub session_seconds: f64,
    pub query: String,
}

/// Queries started within one minute, from `pg_stat_activity`.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityBucket {
    pub bucket: DateTime<Utc>,
    pub queries: i64,
    pub avg_latency_ms: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlowQuery {
    pub query: String,
    pub calls: i64,
    pub total_time_ms: f64,
    pub mean_time_ms: f64,
    pub rows: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexUsage {
    pub schema: String,
    pub table: String,
    pub index_scans: i64,
    pub sequential_scans: i64,
    pub index_usage_percent: f64,
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub collected_at: DateTime<Utc>,
    pub cache_hit_ratio: Option<f64>,
    pub commit_ratio: Option<f64>,
    pub connection_utilization: Option<ConnectionUtilization>,
    pub locks: Option<Vec<LockSummary>>,
    pub unused_indexes: Option<Vec<UnusedIndex>>,
    pub table_bloat: Option<Vec<TableBloat>>,
    pub vacuum_history: Option<Vec<VacuumStatus>>,
    pub long_running_queries: Option<Vec<LongRunningQuery>>,
    pub notes: Vec<SectionNote>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectionUtilization {
    pub connections: i64,
    pub max_connections: i64,
    pub percent: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockSummary {
    pub mode: String,
    pub granted: bool,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnusedIndex {
    pub schema: String,
    pub table: String,
    pub index: String,
    pub size: Size,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableBloat {
    pub schema: String,
    pub table: String,
    pub live_rows: i64,
    pub dead_rows: i64,
    pub bloat_percent: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct VacuumStatus {
    pub schema: String,
    pub table: String,
    pub last_vacuum: Option<DateTime<Utc>>,
    pub last_autovacuum: Option<DateTime<Utc>>,
    pub vacuum_count: i64,
    pub autovacuum_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LongRunningQuery {
    pub pid: i32,
    pub user: String,
    pub database: String,
    pub state: String,
    pub duration_seconds: f64,
    pub query: String,
}

// ---------------------------------------------------------------------------
// Database list
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseListSnapshot {
    pub collected_at: DateTime<Utc>,
    /// Database the pool is connected to.
    pub current_database: String,
    pub databases: Vec<DatabaseInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseInfo {
    pub name: String,
    pub size: Option<Size>,
    pub owner: String,
    pub encoding: String,
    pub collation: String,
    pub ctype: String,
    pub has_access: bool,
    pub current: bool,
    /// Absent when `pg_stat_database` has no row for the database.
    pub stats: Option<DatabaseCounters>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DatabaseCounters {
    pub connections: i32,
    pub commits: i64,
    pub rollbacks: i64,
    pub blocks_read: i64,
    pub blocks_hit: i64,
    pub rows_returned: i64,
    pub rows_fetched: i64,
    pub rows_inserted: i64,
    pub rows_updated: i64,
    pub rows_deleted: i64,
}

// ---------------------------------------------------------------------------
// Performance
// ---------------------------------------------------------------------------

/// `pg_stat_database` counters of the connected database.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceSnapshot {
    pub collected_at: DateTime<Utc>,
    pub database: String,
    pub commits: i64,
    pub rollbacks: i64,
    pub blocks_read: i64,
    pub blocks_hit: i64,
    pub rows_returned: i64,
    pub rows_fetched: i64,
    pub rows_inserted: i64,
    pub rows_updated: i64,
    pub rows_deleted: i64,
}
