// HTTP tests against a server whose database is unreachable

use std::collections::HashMap;

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::Value;

use pg_monitor::config::AppConfig;
use pg_monitor::db::Database;
use pg_monitor::routes;
use pg_monitor::state::AppState;

/// Router over a lazy pool pointed at a closed port.
fn unreachable_server() -> TestServer {
    let env: HashMap<&str, &str> = [
        ("DB_HOST", "127.0.0.1"),
        ("DB_PORT", "1"),
        ("DB_ACQUIRE_TIMEOUT_MS", "300"),
    ]
    .into_iter()
    .collect();
    let config = AppConfig::from_lookup(|key| env.get(key).map(|v| v.to_string())).unwrap();
    let db = Database::connect_lazy(&config.database).unwrap();
    let static_dir = concat!(env!("CARGO_MANIFEST_DIR"), "/static");
    TestServer::new(routes::app(AppState::new(db), static_dir)).unwrap()
}

#[tokio::test]
async fn test_liveness_does_not_need_database() {
    let server = unreachable_server();
    let response = server.get("/api/healthz").await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["uptime_seconds"].is_u64());
}

#[tokio::test]
async fn test_status_reports_down_with_ok_status() {
    let server = unreachable_server();
    let response = server.get("/api/status").await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let body: Value = response.json();
    assert_eq!(body["status"], "down");
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_ready_is_unavailable() {
    let server = unreachable_server();
    let response = server.get("/api/ready").await;
    assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);

    let body: Value = response.json();
    assert_eq!(body["status"], "not_ready");
}

#[tokio::test]
async fn test_performance_fails_with_connection_error() {
    let server = unreachable_server();
    let response = server.get("/api/performance").await;
    assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);

    let body: Value = response.json();
    assert!(body["error"].is_string());
    assert_eq!(body["code"], 503);
}

#[tokio::test]
async fn test_dashboard_page_renders_error() {
    let server = unreachable_server();
    let response = server.get("/").await;
    assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(response.text().contains("Failed to fetch database metrics"));
}

#[tokio::test]
async fn test_health_and_databases_pages_render_error() {
    let server = unreachable_server();

    let health = server.get("/health").await;
    assert_eq!(health.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(health.text().contains("Failed to fetch database health"));

    let databases = server.get("/databases").await;
    assert_eq!(databases.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(databases.text().contains("Failed to fetch databases list"));
}

#[tokio::test]
async fn test_json_snapshots_fail_as_a_whole() {
    let server = unreachable_server();
    for path in ["/api/dashboard", "/api/health", "/api/databases"] {
        let response = server.get(path).await;
        assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE, "{}", path);
    }
}

#[tokio::test]
async fn test_metrics_count_requests_and_probes() {
    let server = unreachable_server();
    server.get("/api/status").await;
    server.get("/api/performance").await;

    let response = server.get("/metrics").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let text = response.text();
    assert!(text.contains("pgmonitor_requests_total 3"));
    assert!(text.contains("pgmonitor_status_checks_total{result=\"down\"} 1"));
    assert!(text.contains("pgmonitor_snapshot_failures_total 1"));
}

#[tokio::test]
async fn test_security_headers() {
    let server = unreachable_server();
    let response = server.get("/api/healthz").await;
    assert_eq!(response.header("x-content-type-options"), "nosniff");
    assert_eq!(response.header("x-frame-options"), "DENY");
    assert_eq!(response.header("referrer-policy"), "no-referrer");
}

#[tokio::test]
async fn test_static_assets_are_served() {
    let server = unreachable_server();
    let response = server.get("/static/dashboard.js").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert!(response.text().contains("/api/performance"));
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let server = unreachable_server();
    let response = server.get("/nope").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    let body: Value = response.json();
    assert_eq!(body["error"], "Not found");
}
