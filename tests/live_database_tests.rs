// Snapshot builds against a real PostgreSQL server.
//
// Run with PG_MONITOR_TEST_DATABASE_URL set and `--ignored`.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use pg_monitor::aggregator::{
    build_dashboard_snapshot, build_database_list_snapshot, build_health_snapshot,
    build_performance_snapshot,
};
use pg_monitor::config::AppConfig;
use pg_monitor::db::Database;
use pg_monitor::error::AppError;
use pg_monitor::models::NoteKind;

async fn live_database() -> Database {
    live_database_with(&[]).await
}

async fn live_database_with(overrides: &[(&str, &str)]) -> Database {
    let url = std::env::var("PG_MONITOR_TEST_DATABASE_URL")
        .expect("PG_MONITOR_TEST_DATABASE_URL must be set");
    let mut env: HashMap<&str, String> = [("DATABASE_URL", url)].into_iter().collect();
    for (key, value) in overrides {
        env.insert(*key, value.to_string());
    }
    let config = AppConfig::from_lookup(|key| env.get(key).cloned()).unwrap();
    Database::connect(&config.database).await.unwrap()
}

#[tokio::test]
#[ignore]
async fn test_dashboard_snapshot() {
    let db = live_database().await;
    let snapshot = build_dashboard_snapshot(&db).await.unwrap();

    let server = snapshot.server.expect("server section");
    assert!(server.version.starts_with("PostgreSQL"));
    assert!(server.uptime_seconds >= 0);

    let connections = snapshot.connections.expect("connections section");
    assert!(connections.active + connections.idle <= connections.total);
    assert!(snapshot.max_connections.unwrap() > 0);
    assert!(snapshot.largest_tables.unwrap().len() <= 5);
    assert!(snapshot.recent_activity.unwrap().len() <= 10);
    assert!(snapshot.index_usage.unwrap().len() <= 10);
    // Either rows or an explicit "not installed" with a matching note.
    let slow_queries = snapshot.slow_queries.expect("slow_queries section");
    let unavailable_note = snapshot
        .notes
        .iter()
        .any(|n| n.section == "slow_queries" && n.kind == NoteKind::Unavailable);
    if slow_queries.available {
        assert!(slow_queries.rows.len() <= 5);
        assert!(!unavailable_note);
    } else {
        assert!(slow_queries.rows.is_empty());
        assert!(unavailable_note, "notes: {:?}", snapshot.notes);
    }
    db.close().await;
}

#[tokio::test]
#[ignore]
async fn test_health_snapshot() {
    let db = live_database().await;
    let snapshot = build_health_snapshot(&db).await.unwrap();

    let cache = snapshot.cache_hit_ratio.unwrap();
    assert!((0.0..=100.0).contains(&cache));
    let commit = snapshot.commit_ratio.unwrap();
    assert!((0.0..=100.0).contains(&commit));

    let utilization = snapshot.connection_utilization.unwrap();
    assert!(utilization.connections >= 1);
    // The probing connection itself never counts as long-running.
    for query in snapshot.long_running_queries.unwrap() {
        assert!(query.duration_seconds > 5.0);
    }
    db.close().await;
}

#[tokio::test]
#[ignore]
async fn test_database_list_marks_current() {
    let db = live_database().await;
    let snapshot = build_database_list_snapshot(&db).await.unwrap();

    let current: Vec<_> = snapshot.databases.iter().filter(|d| d.current).collect();
    assert_eq!(current.len(), 1);
    assert_eq!(current[0].name, snapshot.current_database);
    assert!(current[0].has_access);
    assert!(snapshot.databases.iter().all(|d| d.name != "template0"));
    db.close().await;
}

#[tokio::test]
#[ignore]
async fn test_database_list_has_every_database_largest_first() {
    let db = live_database().await;
    let snapshot = build_database_list_snapshot(&db).await.unwrap();

    let expected: i64 =
        sqlx::query_scalar("SELECT count(*) FROM pg_database WHERE NOT datistemplate")
            .fetch_one(db.pool())
            .await
            .unwrap();
    assert_eq!(snapshot.databases.len() as i64, expected);

    for pair in snapshot.databases.windows(2) {
        match (&pair[0].size, &pair[1].size) {
            (Some(a), Some(b)) => assert!(a.bytes >= b.bytes, "{} before {}", a.bytes, b.bytes),
            (None, Some(_)) => panic!("{} without size sorted before a sized database", pair[0].name),
            _ => {}
        }
    }
    db.close().await;
}

#[tokio::test]
#[ignore]
async fn test_exhausted_pool_queues_then_times_out() {
    let db = live_database_with(&[("DB_POOL_MAX", "2"), ("DB_ACQUIRE_TIMEOUT_MS", "500")]).await;
    let first = db.pool().acquire().await.unwrap();
    let second = db.pool().acquire().await.unwrap();

    // Released while the snapshot waits: acquisition queues instead of failing.
    let release = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        drop(first);
        second
    });
    let started = Instant::now();
    build_performance_snapshot(&db).await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(150));

    // Held past the acquire timeout: a connection error, raised only after waiting.
    let second = release.await.unwrap();
    let third = db.pool().acquire().await.unwrap();
    let started = Instant::now();
    let err = build_performance_snapshot(&db).await.unwrap_err();
    assert!(matches!(err, AppError::ConnectionError(_)), "{:?}", err);
    assert!(started.elapsed() >= Duration::from_millis(450));

    drop(second);
    drop(third);
    db.close().await;
}

#[tokio::test]
#[ignore]
async fn test_performance_snapshot() {
    let db = live_database().await;
    let snapshot = build_performance_snapshot(&db).await.unwrap();
    assert!(snapshot.commits > 0);
    assert!(snapshot.blocks_hit >= 0);
    db.close().await;
}
