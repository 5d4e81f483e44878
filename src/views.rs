//! HTML page models
//!
//! Template structs hold display-ready strings so the askama templates stay
//! free of formatting logic.

use askama::Template;
use chrono::{DateTime, Utc};

use crate::aggregator::LONG_RUNNING_THRESHOLD;
use crate::models::{
    DashboardSnapshot, DatabaseCounters, DatabaseListSnapshot, HealthSnapshot, NoteKind,
    SectionNote, Size,
};

const NOT_AVAILABLE: &str = "n/a";
const QUERY_PREVIEW_CHARS: usize = 120;

#[derive(Debug, Clone)]
pub struct NameValueRow {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct NoteRow {
    pub section: String,
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct ActivityRow {
    pub pid: String,
    pub user: String,
    pub database: String,
    pub state: String,
    pub wait: String,
    pub session: String,
    pub query: String,
}

#[derive(Debug, Clone)]
pub struct BucketRow {
    pub minute: String,
    pub queries: String,
    pub avg_latency: String,
}

#[derive(Debug, Clone)]
pub struct SlowQueryRow {
    pub query: String,
    pub calls: String,
    pub total_time: String,
    pub mean_time: String,
    pub rows: String,
}

#[derive(Debug, Clone)]
pub struct IndexUsageRow {
    pub table: String,
    pub index_scans: String,
    pub sequential_scans: String,
    pub percent: String,
}

#[derive(Debug, Clone)]
pub struct LockRow {
    pub mode: String,
    pub status: String,
    pub count: String,
}

#[derive(Debug, Clone)]
pub struct UnusedIndexRow {
    pub table: String,
    pub index: String,
    pub size: String,
}

#[derive(Debug, Clone)]
pub struct BloatRow {
    pub table: String,
    pub live_rows: String,
    pub dead_rows: String,
    pub percent: String,
}

#[derive(Debug, Clone)]
pub struct VacuumRow {
    pub table: String,
    pub last_vacuum: String,
    pub last_autovacuum: String,
    pub vacuum_count: String,
    pub autovacuum_count: String,
}

#[derive(Debug, Clone)]
pub struct LongRunningRow {
    pub pid: String,
    pub user: String,
    pub state: String,
    pub duration: String,
    pub query: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseRow {
    pub name: String,
    pub size: String,
    pub owner: String,
    pub encoding: String,
    pub collation: String,
    pub ctype: String,
    pub has_access: String,
    pub current: bool,
    pub connections: String,
    pub commits: String,
    pub rollbacks: String,
    pub blocks_read: String,
    pub blocks_hit: String,
    pub rows_returned: String,
    pub rows_fetched: String,
    pub rows_inserted: String,
    pub rows_updated: String,
    pub rows_deleted: String,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub title: String,
    pub nav: &'static str,
    pub flash: Option<String>,
    pub error: Option<String>,
    pub collected_at: String,
    pub version: String,
    pub uptime: String,
    pub connections_total: String,
    pub connections_active: String,
    pub connections_idle: String,
    pub max_connections: String,
    pub database_name: String,
    pub database_size: String,
    pub largest_tables: Vec<NameValueRow>,
    pub query_totals: Vec<NameValueRow>,
    pub database_sizes: Vec<NameValueRow>,
    pub recent_activity: Vec<ActivityRow>,
    pub activity_series: Vec<BucketRow>,
    pub slow_queries_available: bool,
    pub slow_queries: Vec<SlowQueryRow>,
    pub index_usage: Vec<IndexUsageRow>,
    pub notes: Vec<NoteRow>,
}

impl DashboardTemplate {
    pub fn from_snapshot(s: &DashboardSnapshot) -> Self {
        let (version, uptime) = match &s.server {
            Some(server) => (server.version.clone(), server.uptime.clone()),
            None => (NOT_AVAILABLE.to_string(), NOT_AVAILABLE.to_string()),
        };
        let count_or_na = |c: Option<i64>| c.map(format_count).unwrap_or_else(na);

        Self {
            collected_at: format_timestamp(&s.collected_at),
            version,
            uptime,
            connections_total: count_or_na(s.connections.map(|c| c.total)),
            connections_active: count_or_na(s.connections.map(|c| c.active)),
            connections_idle: count_or_na(s.connections.map(|c| c.idle)),
            max_connections: count_or_na(s.max_connections),
            database_name: s
                .database_size
                .as_ref()
                .map(|d| d.name.clone())
                .unwrap_or_else(na),
            database_size: s
                .database_size
                .as_ref()
                .map(|d| pretty_or_na(d.size.as_ref()))
                .unwrap_or_else(na),
            largest_tables: s
                .largest_tables
                .iter()
                .flatten()
                .map(|t| NameValueRow {
                    name: format!("{}.{}", t.schema, t.name),
                    value: t.size.pretty.clone(),
                })
                .collect(),
            query_totals: s
                .query_totals
                .map(|t| {
                    [
                        ("Rows returned", t.rows_returned),
                        ("Rows fetched", t.rows_fetched),
                        ("Rows inserted", t.rows_inserted),
                        ("Rows updated", t.rows_updated),
                        ("Rows deleted", t.rows_deleted),
                        ("Commits", t.commits),
                        ("Rollbacks", t.rollbacks),
                    ]
                    .into_iter()
                    .map(|(name, value)| NameValueRow {
                        name: name.to_string(),
                        value: format_count(value),
                    })
                    .collect()
                })
                .unwrap_or_default(),
            database_sizes: s
                .database_sizes
                .iter()
                .flatten()
                .map(|d| NameValueRow {
                    name: d.name.clone(),
                    value: pretty_or_na(d.size.as_ref()),
                })
                .collect(),
            recent_activity: s
                .recent_activity
                .iter()
                .flatten()
                .map(|a| ActivityRow {
                    pid: a.pid.to_string(),
                    user: a.user.clone(),
                    database: a.database.clone(),
                    state: a.state.clone(),
                    wait: match (&a.wait_event_type, &a.wait_event) {
                        (Some(kind), Some(event)) => format!("{}: {}", kind, event),
                        (Some(kind), None) => kind.clone(),
                        _ => String::new(),
                    },
                    session: format_seconds(a.session_seconds),
                    query: preview(&a.query),
                })
                .collect(),
            activity_series: s
                .activity_series
                .iter()
                .flatten()
                .map(|b| BucketRow {
                    minute: b.bucket.format("%H:%M").to_string(),
                    queries: format_count(b.queries),
                    avg_latency: format!("{:.1} ms", b.avg_latency_ms),
                })
                .collect(),
            slow_queries_available: s.slow_queries.as_ref().is_some_and(|q| q.available),
            slow_queries: s
                .slow_queries
                .iter()
                .flat_map(|q| q.rows.iter())
                .map(|q| SlowQueryRow {
                    query: preview(&q.query),
                    calls: format_count(q.calls),
                    total_time: format!("{:.2} ms", q.total_time_ms),
                    mean_time: format!("{:.2} ms", q.mean_time_ms),
                    rows: format_count(q.rows),
                })
                .collect(),
            index_usage: s
                .index_usage
                .iter()
                .flatten()
                .map(|u| IndexUsageRow {
                    table: format!("{}.{}", u.schema, u.table),
                    index_scans: format_count(u.index_scans),
                    sequential_scans: format_count(u.sequential_scans),
                    percent: format_percent(u.index_usage_percent),
                })
                .collect(),
            notes: note_rows(&s.notes),
            ..Self::failed(None)
        }
    }

    /// Page shell for a failed build: only the banner and error are set.
    pub fn failed(error: Option<String>) -> Self {
        Self {
            title: "Dashboard".to_string(),
            nav: "dashboard",
            flash: error
                .as_ref()
                .map(|_| "Failed to fetch database metrics".to_string()),
            error,
            collected_at: String::new(),
            version: na(),
            uptime: na(),
            connections_total: na(),
            connections_active: na(),
            connections_idle: na(),
            max_connections: na(),
            database_name: na(),
            database_size: na(),
            largest_tables: Vec::new(),
            query_totals: Vec::new(),
            database_sizes: Vec::new(),
            recent_activity: Vec::new(),
            activity_series: Vec::new(),
            slow_queries_available: false,
            slow_queries: Vec::new(),
            index_usage: Vec::new(),
            notes: Vec::new(),
        }
    }
}

#[derive(Template)]
#[template(path = "health.html")]
pub struct HealthTemplate {
    pub title: String,
    pub nav: &'static str,
    pub flash: Option<String>,
    pub error: Option<String>,
    pub collected_at: String,
    pub cache_hit_ratio: String,
    pub commit_ratio: String,
    pub connection_utilization: String,
    pub connections: String,
    pub locks: Vec<LockRow>,
    pub unused_indexes: Vec<UnusedIndexRow>,
    pub table_bloat: Vec<BloatRow>,
    pub vacuum_history: Vec<VacuumRow>,
    pub long_running_queries: Vec<LongRunningRow>,
    pub threshold_seconds: u64,
    pub notes: Vec<NoteRow>,
}

impl HealthTemplate {
    pub fn from_snapshot(s: &HealthSnapshot) -> Self {
        Self {
            collected_at: format_timestamp(&s.collected_at),
            cache_hit_ratio: s.cache_hit_ratio.map(format_percent).unwrap_or_else(na),
            commit_ratio: s.commit_ratio.map(format_percent).unwrap_or_else(na),
            connection_utilization: s
                .connection_utilization
                .map(|u| format!("{}%", u.percent))
                .unwrap_or_else(na),
            connections: s
                .connection_utilization
                .map(|u| format!("{} / {}", u.connections, u.max_connections))
                .unwrap_or_else(na),
            locks: s
                .locks
                .iter()
                .flatten()
                .map(|l| LockRow {
                    mode: l.mode.clone(),
                    status: if l.granted { "granted" } else { "waiting" }.to_string(),
                    count: format_count(l.count),
                })
                .collect(),
            unused_indexes: s
                .unused_indexes
                .iter()
                .flatten()
                .map(|i| UnusedIndexRow {
                    table: format!("{}.{}", i.schema, i.table),
                    index: i.index.clone(),
                    size: i.size.pretty.clone(),
                })
                .collect(),
            table_bloat: s
                .table_bloat
                .iter()
                .flatten()
                .map(|b| BloatRow {
                    table: format!("{}.{}", b.schema, b.table),
                    live_rows: format_count(b.live_rows),
                    dead_rows: format_count(b.dead_rows),
                    percent: format_percent(b.bloat_percent),
                })
                .collect(),
            vacuum_history: s
                .vacuum_history
                .iter()
                .flatten()
                .map(|v| VacuumRow {
                    table: format!("{}.{}", v.schema, v.table),
                    last_vacuum: v.last_vacuum.as_ref().map(format_timestamp).unwrap_or_else(never),
                    last_autovacuum: v
                        .last_autovacuum
                        .as_ref()
                        .map(format_timestamp)
                        .unwrap_or_else(never),
                    vacuum_count: format_count(v.vacuum_count),
                    autovacuum_count: format_count(v.autovacuum_count),
                })
                .collect(),
            long_running_queries: s
                .long_running_queries
                .iter()
                .flatten()
                .map(|q| LongRunningRow {
                    pid: q.pid.to_string(),
                    user: q.user.clone(),
                    state: q.state.clone(),
                    duration: format_seconds(q.duration_seconds),
                    query: preview(&q.query),
                })
                .collect(),
            notes: note_rows(&s.notes),
            ..Self::failed(None)
        }
    }

    pub fn failed(error: Option<String>) -> Self {
        Self {
            title: "Database Health".to_string(),
            nav: "health",
            flash: error
                .as_ref()
                .map(|_| "Failed to fetch database health".to_string()),
            error,
            collected_at: String::new(),
            cache_hit_ratio: na(),
            commit_ratio: na(),
            connection_utilization: na(),
            connections: na(),
            locks: Vec::new(),
            unused_indexes: Vec::new(),
            table_bloat: Vec::new(),
            vacuum_history: Vec::new(),
            long_running_queries: Vec::new(),
            threshold_seconds: LONG_RUNNING_THRESHOLD.as_secs(),
            notes: Vec::new(),
        }
    }
}

#[derive(Template)]
#[template(path = "databases.html")]
pub struct DatabasesTemplate {
    pub title: String,
    pub nav: &'static str,
    pub flash: Option<String>,
    pub error: Option<String>,
    pub collected_at: String,
    pub current_database: String,
    pub databases: Vec<DatabaseRow>,
}

impl DatabasesTemplate {
    pub fn from_snapshot(s: &DatabaseListSnapshot) -> Self {
        Self {
            collected_at: format_timestamp(&s.collected_at),
            current_database: s.current_database.clone(),
            databases: s
                .databases
                .iter()
                .map(|d| {
                    let stat = |f: fn(&DatabaseCounters) -> i64| {
                        d.stats.as_ref().map(f).map(format_count).unwrap_or_else(na)
                    };
                    DatabaseRow {
                        name: d.name.clone(),
                        size: pretty_or_na(d.size.as_ref()),
                        owner: d.owner.clone(),
                        encoding: d.encoding.clone(),
                        collation: d.collation.clone(),
                        ctype: d.ctype.clone(),
                        has_access: if d.has_access { "Yes" } else { "No" }.to_string(),
                        current: d.current,
                        connections: stat(|c| i64::from(c.connections)),
                        commits: stat(|c| c.commits),
                        rollbacks: stat(|c| c.rollbacks),
                        blocks_read: stat(|c| c.blocks_read),
                        blocks_hit: stat(|c| c.blocks_hit),
                        rows_returned: stat(|c| c.rows_returned),
                        rows_fetched: stat(|c| c.rows_fetched),
                        rows_inserted: stat(|c| c.rows_inserted),
                        rows_updated: stat(|c| c.rows_updated),
                        rows_deleted: stat(|c| c.rows_deleted),
                    }
                })
                .collect(),
            ..Self::failed(None)
        }
    }

    pub fn failed(error: Option<String>) -> Self {
        Self {
            title: "Databases".to_string(),
            nav: "databases",
            flash: error
                .as_ref()
                .map(|_| "Failed to fetch databases list".to_string()),
            error,
            collected_at: String::new(),
            current_database: String::new(),
            databases: Vec::new(),
        }
    }
}

fn na() -> String {
    NOT_AVAILABLE.to_string()
}

fn never() -> String {
    "never".to_string()
}

fn pretty_or_na(size: Option<&Size>) -> String {
    size.map(|s| s.pretty.clone()).unwrap_or_else(na)
}

fn note_rows(notes: &[SectionNote]) -> Vec<NoteRow> {
    notes
        .iter()
        .map(|n| NoteRow {
            section: n.section.replace('_', " "),
            kind: match n.kind {
                NoteKind::Unavailable => "not available".to_string(),
                NoteKind::Failed => "failed".to_string(),
            },
            message: n.message.clone(),
        })
        .collect()
}

/// Integer with thousands separators, e.g. `1,234,567`.
pub fn format_count(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn format_percent(value: f64) -> String {
    format!("{:.2}%", value)
}

/// Elapsed seconds as `1h 02m 03s`, `2m 05s` or `4.2s`.
pub fn format_seconds(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    if seconds < 60.0 {
        return format!("{:.1}s", seconds);
    }
    let total = seconds as u64;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{}h {:02}m {:02}s", h, m, s)
    } else {
        format!("{}m {:02}s", m, s)
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Single-line query text cut to a readable length.
fn preview(query: &str) -> String {
    let flat = query.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= QUERY_PREVIEW_CHARS {
        flat
    } else {
        let cut: String = flat.chars().take(QUERY_PREVIEW_CHARS).collect();
        format!("{}…", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::format::size;
    use crate::models::{DatabaseInfo, OptionalRows, ServerStatus};

    fn empty_dashboard() -> DashboardSnapshot {
        DashboardSnapshot {
            collected_at: Utc::now(),
            server: None,
            connections: None,
            max_connections: None,
            database_size: None,
            largest_tables: None,
            query_totals: None,
            database_sizes: None,
            recent_activity: None,
            activity_series: None,
            slow_queries: Some(OptionalRows::unavailable()),
            index_usage: None,
            notes: vec![SectionNote {
                section: "slow_queries",
                kind: NoteKind::Unavailable,
                message: "relation \"pg_stat_statements\" does not exist".to_string(),
            }],
        }
    }

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1_000), "1,000");
        assert_eq!(format_count(1_234_567), "1,234,567");
        assert_eq!(format_count(-4_200), "-4,200");
    }

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(4.25), "4.2s");
        assert_eq!(format_seconds(125.0), "2m 05s");
        assert_eq!(format_seconds(3_723.0), "1h 02m 03s");
    }

    #[test]
    fn test_preview_flattens_and_truncates() {
        assert_eq!(preview("SELECT 1\n  FROM t"), "SELECT 1 FROM t");
        let long = "x".repeat(500);
        assert_eq!(preview(&long).chars().count(), QUERY_PREVIEW_CHARS + 1);
    }

    #[test]
    fn test_dashboard_view_of_partial_snapshot() {
        let mut snapshot = empty_dashboard();
        snapshot.server = Some(ServerStatus {
            version: "PostgreSQL 16.2".to_string(),
            uptime_seconds: 90,
            uptime: "1 minute".to_string(),
        });

        let view = DashboardTemplate::from_snapshot(&snapshot);
        assert_eq!(view.version, "PostgreSQL 16.2");
        assert_eq!(view.max_connections, NOT_AVAILABLE);
        assert!(!view.slow_queries_available);
        assert!(view.slow_queries.is_empty());
        assert!(view.flash.is_none());
        assert_eq!(view.notes.len(), 1);
        assert_eq!(view.notes[0].kind, "not available");
        assert!(view.render().is_ok());
    }

    #[test]
    fn test_failed_dashboard_sets_flash() {
        let view = DashboardTemplate::failed(Some("connection refused".to_string()));
        assert_eq!(view.flash.as_deref(), Some("Failed to fetch database metrics"));
        let html = view.render().unwrap();
        assert!(html.contains("connection refused"));
    }

    #[test]
    fn test_database_rows() {
        let snapshot = DatabaseListSnapshot {
            collected_at: Utc::now(),
            current_database: "appdb".to_string(),
            databases: vec![
                DatabaseInfo {
                    name: "appdb".to_string(),
                    size: Some(size(52_428_800)),
                    owner: "app".to_string(),
                    encoding: "UTF8".to_string(),
                    collation: "en_US.UTF-8".to_string(),
                    ctype: "en_US.UTF-8".to_string(),
                    has_access: true,
                    current: true,
                    stats: Some(DatabaseCounters {
                        connections: 3,
                        commits: 12_000,
                        rollbacks: 4,
                        blocks_read: 10,
                        blocks_hit: 990,
                        rows_returned: 1,
                        rows_fetched: 1,
                        rows_inserted: 1,
                        rows_updated: 1,
                        rows_deleted: 1,
                    }),
                },
                DatabaseInfo {
                    name: "locked".to_string(),
                    size: None,
                    owner: "postgres".to_string(),
                    encoding: "UTF8".to_string(),
                    collation: "C".to_string(),
                    ctype: "C".to_string(),
                    has_access: false,
                    current: false,
                    stats: None,
                },
            ],
        };

        let view = DatabasesTemplate::from_snapshot(&snapshot);
        assert_eq!(view.databases[0].size, "50 MB");
        assert_eq!(view.databases[0].commits, "12,000");
        assert_eq!(view.databases[0].has_access, "Yes");
        assert_eq!(view.databases[1].size, NOT_AVAILABLE);
        assert_eq!(view.databases[1].commits, NOT_AVAILABLE);
        assert_eq!(view.databases[1].has_access, "No");
        assert!(view.render().unwrap().contains("appdb"));
    }

    #[test]
    fn test_health_view_of_failed_build() {
        let view = HealthTemplate::failed(Some("timed out".to_string()));
        assert_eq!(view.threshold_seconds, 5);
        assert_eq!(view.cache_hit_ratio, NOT_AVAILABLE);
        assert!(view.render().unwrap().contains("Failed to fetch database health"));
    }
}
