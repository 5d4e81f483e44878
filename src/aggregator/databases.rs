//! Database list snapshot: one row per non-template database

use std::time::Instant;

use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::Row;
use tracing::{debug, instrument};

use super::format::size;
use super::queries;
use crate::db::Database;
use crate::error::Result;
use crate::models::{DatabaseCounters, DatabaseInfo, DatabaseListSnapshot};

/// Build the database list, largest database first.
///
/// Catalog metadata is always present; statistics counters are absent for a
/// database that has no `pg_stat_database` row yet.
#[instrument(skip_all)]
pub async fn build_database_list_snapshot(db: &Database) -> Result<DatabaseListSnapshot> {
    let started = Instant::now();

    let rows = sqlx::query(queries::DATABASE_LIST)
        .fetch_all(db.pool())
        .await?;
    let databases = rows
        .iter()
        .map(database_info_from_row)
        .collect::<std::result::Result<Vec<_>, sqlx::Error>>()?;

    let current_database = databases
        .iter()
        .find(|d| d.current)
        .map(|d| d.name.clone())
        .unwrap_or_default();

    debug!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        databases = databases.len(),
        "Database list snapshot built"
    );

    Ok(DatabaseListSnapshot {
        collected_at: Utc::now(),
        current_database,
        databases,
    })
}

fn database_info_from_row(row: &PgRow) -> std::result::Result<DatabaseInfo, sqlx::Error> {
    let bytes: Option<i64> = row.try_get("bytes")?;
    Ok(DatabaseInfo {
        name: row.try_get("name")?,
        size: bytes.map(size),
        owner: row.try_get("owner")?,
        encoding: row.try_get("encoding")?,
        collation: row.try_get("collation")?,
        ctype: row.try_get("ctype")?,
        has_access: row.try_get("has_access")?,
        current: row.try_get("is_current")?,
        stats: counters_from_row(row)?,
    })
}

/// Counters from the LEFT JOIN on `pg_stat_database`; all NULL when the
/// database has no statistics row.
fn counters_from_row(row: &PgRow) -> std::result::Result<Option<DatabaseCounters>, sqlx::Error> {
    let commits: Option<i64> = row.try_get("commits")?;
    let Some(commits) = commits else {
        return Ok(None);
    };
    let counter = |column: &str| -> std::result::Result<i64, sqlx::Error> {
        Ok(row.try_get::<Option<i64>, _>(column)?.unwrap_or(0))
    };
    Ok(Some(DatabaseCounters {
        connections: row.try_get::<Option<i32>, _>("connections")?.unwrap_or(0),
        commits,
        rollbacks: counter("rollbacks")?,
        blocks_read: counter("blocks_read")?,
        blocks_hit: counter("blocks_hit")?,
        rows_returned: counter("rows_returned")?,
        rows_fetched: counter("rows_fetched")?,
        rows_inserted: counter("rows_inserted")?,
        rows_updated: counter("rows_updated")?,
        rows_deleted: counter("rows_deleted")?,
    }))
}
