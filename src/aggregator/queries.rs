//! SQL for the PostgreSQL statistics views and catalogs.
//!
//! Every query is read-only. Name-typed columns are cast to text and
//! aggregates to bigint so the row decoders see stable types across server
//! versions.

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

pub(super) const SERVER_STATUS: &str = r#"
    SELECT
        version() AS version,
        EXTRACT(EPOCH FROM (current_timestamp - pg_postmaster_start_time()))::bigint AS uptime_seconds
"#;

pub(super) const CONNECTION_COUNTS: &str = r#"
    SELECT
        count(*) AS total_connections,
        count(*) FILTER (WHERE state = 'active') AS active_connections,
        count(*) FILTER (WHERE state = 'idle') AS idle_connections
    FROM pg_stat_activity
"#;

pub(super) const MAX_CONNECTIONS: &str = r#"
    SELECT current_setting('max_connections')::bigint AS max_connections
"#;

pub(super) const CURRENT_DATABASE_SIZE: &str = r#"
    SELECT
        current_database()::text AS name,
        pg_database_size(current_database()) AS bytes
"#;

/// Top 5 relations by total size (heap + indexes + toast); ties keep catalog order.
pub(super) const LARGEST_TABLES: &str = r#"
    SELECT
        n.nspname::text AS schema_name,
        c.relname::text AS table_name,
        pg_total_relation_size(c.oid) AS bytes
    FROM pg_class c
    JOIN pg_namespace n ON n.oid = c.relnamespace
    WHERE c.relkind IN ('r', 'p', 'm')
      AND n.nspname NOT IN ('pg_catalog', 'information_schema')
      AND n.nspname NOT LIKE 'pg_toast%'
    ORDER BY bytes DESC, c.oid ASC
    LIMIT 5
"#;

pub(super) const QUERY_TOTALS: &str = r#"
    SELECT
        COALESCE(SUM(tup_returned), 0)::bigint AS rows_returned,
        COALESCE(SUM(tup_fetched), 0)::bigint AS rows_fetched,
        COALESCE(SUM(tup_inserted), 0)::bigint AS rows_inserted,
        COALESCE(SUM(tup_updated), 0)::bigint AS rows_updated,
        COALESCE(SUM(tup_deleted), 0)::bigint AS rows_deleted,
        COALESCE(SUM(xact_commit), 0)::bigint AS commits,
        COALESCE(SUM(xact_rollback), 0)::bigint AS rollbacks
    FROM pg_stat_database
"#;

/// Sizes are only readable for databases the role may connect to.
pub(super) const DATABASE_SIZES: &str = r#"
    SELECT
        d.datname::text AS name,
        CASE WHEN has_database_privilege(d.datname, 'CONNECT')
             THEN pg_database_size(d.datname)
        END AS bytes
    FROM pg_database d
    WHERE NOT d.datistemplate
    ORDER BY bytes DESC NULLS LAST, d.datname
"#;

/// Longest-lived client sessions. `$1` is the dashboard's own application_name.
pub(super) const RECENT_ACTIVITY: &str = r#"
    SELECT
        pid,
        COALESCE(usename::text, '') AS usename,
        COALESCE(datname::text, '') AS datname,
        COALESCE(state, '') AS state,
        wait_event_type,
        wait_event,
        COALESCE(EXTRACT(EPOCH FROM (now() - backend_start)), 0)::double precision AS session_seconds,
        COALESCE(query, '') AS query
    FROM pg_stat_activity
    WHERE backend_type = 'client backend'
      AND pid <> pg_backend_pid()
      AND application_name IS DISTINCT FROM $1
    ORDER BY backend_start ASC NULLS LAST, pid
    LIMIT 10
"#;

/// Statements started in the last 15 minutes, bucketed per minute. Latency
/// is the running time for active sessions and the last statement's time
/// otherwise. `$1` is the dashboard's own application_name.
pub(super) const ACTIVITY_SERIES: &str = r#"
    SELECT
        date_trunc('minute', query_start) AS bucket,
        count(*) AS queries,
        COALESCE(avg(EXTRACT(EPOCH FROM (
            CASE WHEN state = 'active' THEN now() ELSE state_change END - query_start
        )) * 1000), 0)::double precision AS avg_latency_ms
    FROM pg_stat_activity
    WHERE query_start >= now() - interval '15 minutes'
      AND backend_type = 'client backend'
      AND pid <> pg_backend_pid()
      AND application_name IS DISTINCT FROM $1
    GROUP BY 1
    ORDER BY 1
"#;

/// pg_stat_statements on PostgreSQL 13 and later.
pub(super) const SLOW_QUERIES: &str = r#"
    SELECT
        query,
        calls,
        total_exec_time::double precision AS total_time,
        mean_exec_time::double precision AS mean_time,
        rows
    FROM pg_stat_statements
    ORDER BY mean_exec_time DESC
    LIMIT 5
"#;

/// pg_stat_statements before PostgreSQL 13 (`*_time` columns).
pub(super) const SLOW_QUERIES_LEGACY: &str = r#"
    SELECT
        query,
        calls,
        total_time::double precision AS total_time,
        mean_time::double precision AS mean_time,
        rows
    FROM pg_stat_statements
    ORDER BY mean_time DESC
    LIMIT 5
"#;

pub(super) const INDEX_USAGE: &str = r#"
    SELECT
        schemaname::text AS schema_name,
        relname::text AS table_name,
        COALESCE(idx_scan, 0)::bigint AS index_scans,
        COALESCE(seq_scan, 0)::bigint AS sequential_scans
    FROM pg_stat_user_tables
"#;

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

pub(super) const DATABASE_COUNTERS: &str = r#"
    SELECT
        COALESCE(blks_hit, 0)::bigint AS blocks_hit,
        COALESCE(blks_read, 0)::bigint AS blocks_read,
        COALESCE(xact_commit, 0)::bigint AS commits,
        COALESCE(xact_rollback, 0)::bigint AS rollbacks
    FROM pg_stat_database
    WHERE datname = current_database()
"#;

pub(super) const CONNECTION_SLOTS: &str = r#"
    SELECT
        count(*) FILTER (WHERE state = 'active') AS connections,
        current_setting('max_connections')::bigint AS max_connections
    FROM pg_stat_activity
"#;

pub(super) const LOCKS: &str = r#"
    SELECT
        mode,
        granted,
        count(*) AS lock_count
    FROM pg_locks
    GROUP BY mode, granted
    ORDER BY lock_count DESC, mode ASC, granted DESC
"#;

/// Never-scanned indexes outside the system schemas.
pub(super) const UNUSED_INDEXES: &str = r#"
    SELECT
        schemaname::text AS schema_name,
        relname::text AS table_name,
        indexrelname::text AS index_name,
        pg_relation_size(indexrelid) AS bytes
    FROM pg_stat_user_indexes
    WHERE idx_scan = 0
      AND schemaname NOT IN ('pg_catalog', 'information_schema')
      AND schemaname NOT LIKE 'pg_toast%'
    ORDER BY bytes DESC, schema_name, table_name, index_name
"#;

pub(super) const TABLE_BLOAT: &str = r#"
    SELECT
        schemaname::text AS schema_name,
        relname::text AS table_name,
        COALESCE(n_live_tup, 0)::bigint AS live_rows,
        COALESCE(n_dead_tup, 0)::bigint AS dead_rows
    FROM pg_stat_user_tables
    ORDER BY dead_rows DESC, relid
    LIMIT 10
"#;

/// Most stale first; tables never vacuumed sort ahead of everything.
pub(super) const VACUUM_HISTORY: &str = r#"
    SELECT
        schemaname::text AS schema_name,
        relname::text AS table_name,
        last_vacuum,
        last_autovacuum,
        COALESCE(vacuum_count, 0)::bigint AS vacuum_count,
        COALESCE(autovacuum_count, 0)::bigint AS autovacuum_count
    FROM pg_stat_user_tables
    ORDER BY GREATEST(last_vacuum, last_autovacuum) ASC NULLS FIRST, relid
    LIMIT 10
"#;

/// Every non-idle client statement; the threshold and own-session filter
/// are applied by the caller.
pub(super) const NON_IDLE_QUERIES: &str = r#"
    SELECT
        pid,
        COALESCE(usename::text, '') AS usename,
        COALESCE(datname::text, '') AS datname,
        state,
        COALESCE(application_name, '') AS application_name,
        EXTRACT(EPOCH FROM (clock_timestamp() - query_start))::double precision AS duration_seconds,
        COALESCE(query, '') AS query
    FROM pg_stat_activity
    WHERE state IS NOT NULL
      AND state <> 'idle'
      AND query_start IS NOT NULL
      AND backend_type = 'client backend'
      AND pid <> pg_backend_pid()
"#;

// ---------------------------------------------------------------------------
// Database list / performance
// ---------------------------------------------------------------------------

pub(super) const DATABASE_LIST: &str = r#"
    SELECT
        d.datname::text AS name,
        CASE WHEN has_database_privilege(d.datname, 'CONNECT')
             THEN pg_database_size(d.datname)
        END AS bytes,
        pg_get_userbyid(d.datdba)::text AS owner,
        pg_encoding_to_char(d.encoding)::text AS encoding,
        d.datcollate::text AS collation,
        d.datctype::text AS ctype,
        has_database_privilege(d.datname, 'CONNECT') AS has_access,
        d.datname = current_database() AS is_current,
        s.numbackends AS connections,
        s.xact_commit AS commits,
        s.xact_rollback AS rollbacks,
        s.blks_read AS blocks_read,
        s.blks_hit AS blocks_hit,
        s.tup_returned AS rows_returned,
        s.tup_fetched AS rows_fetched,
        s.tup_inserted AS rows_inserted,
        s.tup_updated AS rows_updated,
        s.tup_deleted AS rows_deleted
    FROM pg_catalog.pg_database d
    LEFT JOIN pg_stat_database s ON s.datid = d.oid
    WHERE NOT d.datistemplate
    ORDER BY bytes DESC NULLS LAST, d.datname
"#;

pub(super) const PERFORMANCE: &str = r#"
    SELECT
        datname::text AS database,
        COALESCE(xact_commit, 0)::bigint AS commits,
        COALESCE(xact_rollback, 0)::bigint AS rollbacks,
        COALESCE(blks_read, 0)::bigint AS blocks_read,
        COALESCE(blks_hit, 0)::bigint AS blocks_hit,
        COALESCE(tup_returned, 0)::bigint AS rows_returned,
        COALESCE(tup_fetched, 0)::bigint AS rows_fetched,
        COALESCE(tup_inserted, 0)::bigint AS rows_inserted,
        COALESCE(tup_updated, 0)::bigint AS rows_updated,
        COALESCE(tup_deleted, 0)::bigint AS rows_deleted
    FROM pg_stat_database
    WHERE datname = current_database()
"#;

#[cfg(test)]
mod tests {
    use super::*;

    const ACTIVE: &str = "FILTER (WHERE state = 'active')";

    #[test]
    fn test_utilization_counts_the_same_active_sessions_as_the_dashboard() {
        assert!(CONNECTION_COUNTS.contains(&format!("{} AS active_connections", ACTIVE)));
        assert!(CONNECTION_SLOTS.contains(&format!("{} AS connections", ACTIVE)));
        // Both read the whole of pg_stat_activity, unfiltered by backend type.
        assert!(!CONNECTION_SLOTS.contains("backend_type"));
        assert!(!CONNECTION_COUNTS.contains("backend_type"));
    }
}
