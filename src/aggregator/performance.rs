//! Performance snapshot: counters of the connected database

use chrono::Utc;
use sqlx::Row;
use tracing::instrument;

use super::queries;
use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::PerformanceSnapshot;

/// Read the `pg_stat_database` counters of the current database.
#[instrument(skip_all)]
pub async fn build_performance_snapshot(db: &Database) -> Result<PerformanceSnapshot> {
    let row = sqlx::query(queries::PERFORMANCE)
        .fetch_optional(db.pool())
        .await?
        .ok_or_else(|| AppError::NotFound("No statistics for the current database".into()))?;

    Ok(PerformanceSnapshot {
        collected_at: Utc::now(),
        database: row.try_get("database")?,
        commits: row.try_get("commits")?,
        rollbacks: row.try_get("rollbacks")?,
        blocks_read: row.try_get("blocks_read")?,
        blocks_hit: row.try_get("blocks_hit")?,
        rows_returned: row.try_get("rows_returned")?,
        rows_fetched: row.try_get("rows_fetched")?,
        rows_inserted: row.try_get("rows_inserted")?,
        rows_updated: row.try_get("rows_updated")?,
        rows_deleted: row.try_get("rows_deleted")?,
    })
}
