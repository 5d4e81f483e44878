//! Health snapshot: ratios, locks, index and vacuum hygiene, long queries

use std::time::{Duration, Instant};

use chrono::Utc;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use tracing::{debug, instrument};

use super::format::{bloat_ratio, cache_hit_ratio, commit_ratio, connection_utilization, size};
use super::outcome::Sections;
use super::queries;
use crate::db::Database;
use crate::error::Result;
use crate::models::{
    ConnectionUtilization, HealthSnapshot, LockSummary, LongRunningQuery, TableBloat,
    UnusedIndex, VacuumStatus,
};

type QueryResult<T> = std::result::Result<T, sqlx::Error>;

/// Statements running longer than this are reported as long-running.
pub const LONG_RUNNING_THRESHOLD: Duration = Duration::from_secs(5);

/// Block and transaction counters of the connected database.
#[derive(Debug, Clone, Copy, Default)]
struct DatabaseCounters {
    blocks_hit: i64,
    blocks_read: i64,
    commits: i64,
    rollbacks: i64,
}

/// A non-idle backend as seen in `pg_stat_activity`.
#[derive(Debug, Clone)]
pub(crate) struct BackendQuery {
    pub pid: i32,
    pub user: String,
    pub database: String,
    pub state: String,
    pub application_name: String,
    pub duration_seconds: f64,
    pub query: String,
}

/// Build the health snapshot.
#[instrument(skip_all)]
pub async fn build_health_snapshot(db: &Database) -> Result<HealthSnapshot> {
    let started = Instant::now();
    let pool = db.pool();

    let (counters, slots, locks, unused_indexes, table_bloat, vacuum_history, backends) = tokio::join!(
        fetch_database_counters(pool),
        fetch_connection_slots(pool),
        fetch_locks(pool),
        fetch_unused_indexes(pool),
        fetch_table_bloat(pool),
        fetch_vacuum_history(pool),
        fetch_non_idle_queries(pool),
    );

    let mut sections = Sections::new();
    let counters = sections.settle("database_counters", counters)?;
    let long_running_queries = sections
        .settle("long_running_queries", backends)?
        .map(|backends| {
            select_long_running(backends, LONG_RUNNING_THRESHOLD, db.application_name())
        });

    let snapshot = HealthSnapshot {
        collected_at: Utc::now(),
        cache_hit_ratio: counters.map(|c| cache_hit_ratio(c.blocks_hit, c.blocks_read)),
        commit_ratio: counters.map(|c| commit_ratio(c.commits, c.rollbacks)),
        connection_utilization: sections.settle("connection_utilization", slots)?,
        locks: sections.settle("locks", locks)?,
        unused_indexes: sections.settle("unused_indexes", unused_indexes)?,
        table_bloat: sections.settle("table_bloat", table_bloat)?,
        vacuum_history: sections.settle("vacuum_history", vacuum_history)?,
        long_running_queries,
        notes: Vec::new(),
    };

    debug!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        degraded = sections.degraded(),
        "Health snapshot built"
    );

    Ok(HealthSnapshot {
        notes: sections.into_notes(),
        ..snapshot
    })
}

/// Keep statements running longer than `threshold` that do not come from
/// the dashboard's own connections, longest first.
pub(crate) fn select_long_running(
    backends: Vec<BackendQuery>,
    threshold: Duration,
    own_application: &str,
) -> Vec<LongRunningQuery> {
    let threshold = threshold.as_secs_f64();
    let mut selected: Vec<LongRunningQuery> = backends
        .into_iter()
        .filter(|b| b.state != "idle")
        .filter(|b| b.application_name != own_application)
        .filter(|b| b.duration_seconds > threshold)
        .map(|b| LongRunningQuery {
            pid: b.pid,
            user: b.user,
            database: b.database,
            state: b.state,
            duration_seconds: b.duration_seconds,
            query: b.query,
        })
        .collect();
    selected.sort_by(|a, b| {
        b.duration_seconds
            .total_cmp(&a.duration_seconds)
            .then_with(|| a.pid.cmp(&b.pid))
    });
    selected
}

async fn fetch_database_counters(pool: &PgPool) -> QueryResult<DatabaseCounters> {
    // A database without a statistics row has seen no activity yet.
    let Some(row) = sqlx::query(queries::DATABASE_COUNTERS)
        .fetch_optional(pool)
        .await?
    else {
        return Ok(DatabaseCounters::default());
    };
    Ok(DatabaseCounters {
        blocks_hit: row.try_get("blocks_hit")?,
        blocks_read: row.try_get("blocks_read")?,
        commits: row.try_get("commits")?,
        rollbacks: row.try_get("rollbacks")?,
    })
}

async fn fetch_connection_slots(pool: &PgPool) -> QueryResult<ConnectionUtilization> {
    let row = sqlx::query(queries::CONNECTION_SLOTS).fetch_one(pool).await?;
    let connections: i64 = row.try_get("connections")?;
    let max_connections: i64 = row.try_get("max_connections")?;
    Ok(ConnectionUtilization {
        connections,
        max_connections,
        percent: connection_utilization(connections, max_connections),
    })
}

async fn fetch_locks(pool: &PgPool) -> QueryResult<Vec<LockSummary>> {
    let rows = sqlx::query(queries::LOCKS).fetch_all(pool).await?;
    rows.iter().map(lock_summary_from_row).collect()
}

fn lock_summary_from_row(row: &PgRow) -> QueryResult<LockSummary> {
    Ok(LockSummary {
        mode: row.try_get("mode")?,
        granted: row.try_get("granted")?,
        count: row.try_get("lock_count")?,
    })
}

async fn fetch_unused_indexes(pool: &PgPool) -> QueryResult<Vec<UnusedIndex>> {
    let rows = sqlx::query(queries::UNUSED_INDEXES).fetch_all(pool).await?;
    rows.iter().map(unused_index_from_row).collect()
}

fn unused_index_from_row(row: &PgRow) -> QueryResult<UnusedIndex> {
    Ok(UnusedIndex {
        schema: row.try_get("schema_name")?,
        table: row.try_get("table_name")?,
        index: row.try_get("index_name")?,
        size: size(row.try_get("bytes")?),
    })
}

async fn fetch_table_bloat(pool: &PgPool) -> QueryResult<Vec<TableBloat>> {
    let rows = sqlx::query(queries::TABLE_BLOAT).fetch_all(pool).await?;
    rows.iter().map(table_bloat_from_row).collect()
}

fn table_bloat_from_row(row: &PgRow) -> QueryResult<TableBloat> {
    let live_rows: i64 = row.try_get("live_rows")?;
    let dead_rows: i64 = row.try_get("dead_rows")?;
    Ok(TableBloat {
        schema: row.try_get("schema_name")?,
        table: row.try_get("table_name")?,
        live_rows,
        dead_rows,
        bloat_percent: bloat_ratio(live_rows, dead_rows),
    })
}

async fn fetch_vacuum_history(pool: &PgPool) -> QueryResult<Vec<VacuumStatus>> {
    let rows = sqlx::query(queries::VACUUM_HISTORY).fetch_all(pool).await?;
    rows.iter().map(vacuum_status_from_row).collect()
}

fn vacuum_status_from_row(row: &PgRow) -> QueryResult<VacuumStatus> {
    Ok(VacuumStatus {
        schema: row.try_get("schema_name")?,
        table: row.try_get("table_name")?,
        last_vacuum: row.try_get("last_vacuum")?,
        last_autovacuum: row.try_get("last_autovacuum")?,
        vacuum_count: row.try_get("vacuum_count")?,
        autovacuum_count: row.try_get("autovacuum_count")?,
    })
}

async fn fetch_non_idle_queries(pool: &PgPool) -> QueryResult<Vec<BackendQuery>> {
    let rows = sqlx::query(queries::NON_IDLE_QUERIES).fetch_all(pool).await?;
    rows.iter().map(backend_query_from_row).collect()
}

fn backend_query_from_row(row: &PgRow) -> QueryResult<BackendQuery> {
    Ok(BackendQuery {
        pid: row.try_get("pid")?,
        user: row.try_get("usename")?,
        database: row.try_get("datname")?,
        state: row.try_get("state")?,
        application_name: row.try_get("application_name")?,
        duration_seconds: row.try_get("duration_seconds")?,
        query: row.try_get("query")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(pid: i32, state: &str, app: &str, secs: f64) -> BackendQuery {
        BackendQuery {
            pid,
            user: "app".to_string(),
            database: "appdb".to_string(),
            state: state.to_string(),
            application_name: app.to_string(),
            duration_seconds: secs,
            query: format!("SELECT pg_sleep({})", secs),
        }
    }

    #[test]
    fn test_only_queries_over_threshold() {
        let selected = select_long_running(
            vec![
                backend(1, "active", "psql", 4.9),
                backend(2, "active", "psql", 5.0),
                backend(3, "active", "psql", 5.1),
            ],
            LONG_RUNNING_THRESHOLD,
            "pg-monitor",
        );
        let pids: Vec<_> = selected.iter().map(|q| q.pid).collect();
        assert_eq!(pids, vec![3]);
    }

    #[test]
    fn test_excludes_own_connections_and_idle() {
        let selected = select_long_running(
            vec![
                backend(1, "active", "pg-monitor", 60.0),
                backend(2, "idle", "psql", 60.0),
                backend(3, "idle in transaction", "psql", 60.0),
            ],
            LONG_RUNNING_THRESHOLD,
            "pg-monitor",
        );
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].pid, 3);
        assert_eq!(selected[0].state, "idle in transaction");
    }

    #[test]
    fn test_longest_first() {
        let selected = select_long_running(
            vec![
                backend(1, "active", "", 10.0),
                backend(2, "active", "", 300.0),
                backend(3, "active", "", 42.0),
            ],
            LONG_RUNNING_THRESHOLD,
            "pg-monitor",
        );
        let durations: Vec<_> = selected.iter().map(|q| q.duration_seconds).collect();
        assert_eq!(durations, vec![300.0, 42.0, 10.0]);
    }
}
