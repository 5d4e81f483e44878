//! Dashboard snapshot: server overview, sizes, counters and activity

use std::time::Instant;

use chrono::Utc;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use tracing::{debug, instrument};

use super::format::{format_uptime, index_usage_ratio, size};
use super::outcome::Sections;
use super::queries;
use crate::db::Database;
use crate::error::Result;
use crate::models::{
    ActivityBucket, ActivitySample, ConnectionCounts, DashboardSnapshot, DatabaseSize,
    IndexUsage, QueryTotals, ServerStatus, SlowQuery, TableSize,
};

type QueryResult<T> = std::result::Result<T, sqlx::Error>;

/// SQLSTATE undefined_column: pg_stat_statements older than PostgreSQL 13.
const UNDEFINED_COLUMN: &str = "42703";

/// Number of tables kept in the index usage ranking.
const INDEX_USAGE_LIMIT: usize = 10;

/// Build the dashboard snapshot.
///
/// All sub-queries run concurrently on the pool. Only a connection failure
/// fails the build; any other failed section is left empty and noted.
#[instrument(skip_all)]
pub async fn build_dashboard_snapshot(db: &Database) -> Result<DashboardSnapshot> {
    let started = Instant::now();
    let pool = db.pool();
    let own_app = db.application_name();

    let (
        server,
        connections,
        max_connections,
        database_size,
        largest_tables,
        query_totals,
        database_sizes,
        recent_activity,
        activity_series,
        slow_queries,
        index_usage,
    ) = tokio::join!(
        fetch_server_status(pool),
        fetch_connection_counts(pool),
        fetch_max_connections(pool),
        fetch_database_size(pool),
        fetch_largest_tables(pool),
        fetch_query_totals(pool),
        fetch_database_sizes(pool),
        fetch_recent_activity(pool, own_app),
        fetch_activity_series(pool, own_app),
        fetch_slow_queries(pool),
        fetch_index_usage(pool),
    );

    let mut sections = Sections::new();
    let snapshot = DashboardSnapshot {
        collected_at: Utc::now(),
        server: sections.settle("server", server)?,
        connections: sections.settle("connections", connections)?,
        max_connections: sections.settle("max_connections", max_connections)?,
        database_size: sections.settle("database_size", database_size)?,
        largest_tables: sections.settle("largest_tables", largest_tables)?,
        query_totals: sections.settle("query_totals", query_totals)?,
        database_sizes: sections.settle("database_sizes", database_sizes)?,
        recent_activity: sections.settle("recent_activity", recent_activity)?,
        activity_series: sections.settle("activity_series", activity_series)?,
        slow_queries: sections.settle_optional("slow_queries", slow_queries)?,
        index_usage: sections.settle("index_usage", index_usage)?,
        notes: Vec::new(),
    };

    debug!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        degraded = sections.degraded(),
        "Dashboard snapshot built"
    );

    Ok(DashboardSnapshot {
        notes: sections.into_notes(),
        ..snapshot
    })
}

async fn fetch_server_status(pool: &PgPool) -> QueryResult<ServerStatus> {
    let row = sqlx::query(queries::SERVER_STATUS).fetch_one(pool).await?;
    let uptime_seconds: i64 = row.try_get("uptime_seconds")?;
    Ok(ServerStatus {
        version: row.try_get("version")?,
        uptime_seconds,
        uptime: format_uptime(uptime_seconds),
    })
}

async fn fetch_connection_counts(pool: &PgPool) -> QueryResult<ConnectionCounts> {
    let row = sqlx::query(queries::CONNECTION_COUNTS).fetch_one(pool).await?;
    Ok(ConnectionCounts {
        total: row.try_get("total_connections")?,
        active: row.try_get("active_connections")?,
        idle: row.try_get("idle_connections")?,
    })
}

async fn fetch_max_connections(pool: &PgPool) -> QueryResult<i64> {
    let row = sqlx::query(queries::MAX_CONNECTIONS).fetch_one(pool).await?;
    row.try_get("max_connections")
}

async fn fetch_database_size(pool: &PgPool) -> QueryResult<DatabaseSize> {
    let row = sqlx::query(queries::CURRENT_DATABASE_SIZE)
        .fetch_one(pool)
        .await?;
    database_size_from_row(&row)
}

async fn fetch_largest_tables(pool: &PgPool) -> QueryResult<Vec<TableSize>> {
    let rows = sqlx::query(queries::LARGEST_TABLES).fetch_all(pool).await?;
    rows.iter().map(table_size_from_row).collect()
}

fn table_size_from_row(row: &PgRow) -> QueryResult<TableSize> {
    Ok(TableSize {
        schema: row.try_get("schema_name")?,
        name: row.try_get("table_name")?,
        size: size(row.try_get("bytes")?),
    })
}

async fn fetch_query_totals(pool: &PgPool) -> QueryResult<QueryTotals> {
    let row = sqlx::query(queries::QUERY_TOTALS).fetch_one(pool).await?;
    Ok(QueryTotals {
        rows_returned: row.try_get("rows_returned")?,
        rows_fetched: row.try_get("rows_fetched")?,
        rows_inserted: row.try_get("rows_inserted")?,
        rows_updated: row.try_get("rows_updated")?,
        rows_deleted: row.try_get("rows_deleted")?,
        commits: row.try_get("commits")?,
        rollbacks: row.try_get("rollbacks")?,
    })
}

async fn fetch_database_sizes(pool: &PgPool) -> QueryResult<Vec<DatabaseSize>> {
    let rows = sqlx::query(queries::DATABASE_SIZES).fetch_all(pool).await?;
    rows.iter().map(database_size_from_row).collect()
}

fn database_size_from_row(row: &PgRow) -> QueryResult<DatabaseSize> {
    let bytes: Option<i64> = row.try_get("bytes")?;
    Ok(DatabaseSize {
        name: row.try_get("name")?,
        size: bytes.map(size),
    })
}

async fn fetch_recent_activity(pool: &PgPool, own_app: &str) -> QueryResult<Vec<ActivitySample>> {
    let rows = sqlx::query(queries::RECENT_ACTIVITY)
        .bind(own_app)
        .fetch_all(pool)
        .await?;
    rows.iter().map(activity_sample_from_row).collect()
}

fn activity_sample_from_row(row: &PgRow) -> QueryResult<ActivitySample> {
    Ok(ActivitySample {
        pid: row.try_get("pid")?,
        user: row.try_get("usename")?,
        database: row.try_get("datname")?,
        state: row.try_get("state")?,
        wait_event_type: row.try_get("wait_event_type")?,
        wait_event: row.try_get("wait_event")?,
        session_seconds: row.try_get("session_seconds")?,
        query: row.try_get("query")?,
    })
}

async fn fetch_activity_series(pool: &PgPool, own_app: &str) -> QueryResult<Vec<ActivityBucket>> {
    let rows = sqlx::query(queries::ACTIVITY_SERIES)
        .bind(own_app)
        .fetch_all(pool)
        .await?;
    rows.iter().map(activity_bucket_from_row).collect()
}

fn activity_bucket_from_row(row: &PgRow) -> QueryResult<ActivityBucket> {
    Ok(ActivityBucket {
        bucket: row.try_get("bucket")?,
        queries: row.try_get("queries")?,
        avg_latency_ms: row.try_get("avg_latency_ms")?,
    })
}

/// Slowest statements by mean time from `pg_stat_statements`, retrying with
/// the pre-13 column names when the current ones do not exist.
async fn fetch_slow_queries(pool: &PgPool) -> QueryResult<Vec<SlowQuery>> {
    let rows = match sqlx::query(queries::SLOW_QUERIES).fetch_all(pool).await {
        Ok(rows) => rows,
        Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some(UNDEFINED_COLUMN) => {
            sqlx::query(queries::SLOW_QUERIES_LEGACY)
                .fetch_all(pool)
                .await?
        }
        Err(err) => return Err(err),
    };
    rows.iter().map(slow_query_from_row).collect()
}

fn slow_query_from_row(row: &PgRow) -> QueryResult<SlowQuery> {
    Ok(SlowQuery {
        query: row.try_get("query")?,
        calls: row.try_get("calls")?,
        total_time_ms: row.try_get("total_time")?,
        mean_time_ms: row.try_get("mean_time")?,
        rows: row.try_get("rows")?,
    })
}

async fn fetch_index_usage(pool: &PgPool) -> QueryResult<Vec<IndexUsage>> {
    let rows = sqlx::query(queries::INDEX_USAGE).fetch_all(pool).await?;
    let usage = rows
        .iter()
        .map(index_usage_from_row)
        .collect::<QueryResult<Vec<_>>>()?;
    Ok(rank_index_usage(usage))
}

fn index_usage_from_row(row: &PgRow) -> QueryResult<IndexUsage> {
    let index_scans: i64 = row.try_get("index_scans")?;
    let sequential_scans: i64 = row.try_get("sequential_scans")?;
    Ok(IndexUsage {
        schema: row.try_get("schema_name")?,
        table: row.try_get("table_name")?,
        index_scans,
        sequential_scans,
        index_usage_percent: index_usage_ratio(index_scans, sequential_scans),
    })
}

/// Highest index usage first, busiest table first among equals.
pub(crate) fn rank_index_usage(mut usage: Vec<IndexUsage>) -> Vec<IndexUsage> {
    usage.sort_by(|a, b| {
        b.index_usage_percent
            .total_cmp(&a.index_usage_percent)
            .then_with(|| {
                (b.index_scans + b.sequential_scans).cmp(&(a.index_scans + a.sequential_scans))
            })
            .then_with(|| a.schema.cmp(&b.schema))
            .then_with(|| a.table.cmp(&b.table))
    });
    usage.truncate(INDEX_USAGE_LIMIT);
    usage
}
