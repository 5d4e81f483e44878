//! pg-monitor - PostgreSQL monitoring dashboard

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pg_monitor::config::{AppConfig, LogFormat};
use pg_monitor::db::Database;
use pg_monitor::routes;
use pg_monitor::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("Invalid configuration")?;

    init_tracing(config.logging.format);

    // Lazy pool: the server comes up even while PostgreSQL is unreachable.
    let db = Database::connect_lazy(&config.database)
        .map_err(|e| anyhow::anyhow!("Failed to create database pool: {}", e))?;

    match db.server_time().await {
        Ok(now) => info!(server_time = %now, "Database connection verified"),
        Err(e) => warn!(error = %e, "Database not reachable at startup, will retry on demand"),
    }

    let state = AppState::new(db.clone());
    let app = routes::app(state, &config.server.static_dir);

    info!(
        target_db = %config.database.display_target(),
        max_connections = config.database.max_connections,
        "Monitoring database"
    );

    let (host, port) = config.listen_addr();
    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", host, port))?;
    info!(
        "pg-monitor v{} listening on {}",
        env!("CARGO_PKG_VERSION"),
        listener.local_addr()?
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    db.close().await;
    info!("Shutdown complete");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "pg_monitor=info,tower_http=info".into());

    match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                    info!("Received shutdown signal");
                    return;
                }
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    info!("Received shutdown signal");
}
