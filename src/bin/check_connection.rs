//! One-shot connectivity check against the configured PostgreSQL server.
//!
//! Exits non-zero when the server cannot be reached.

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pg_monitor::config::AppConfig;
use pg_monitor::db::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "pg_monitor=warn".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env().context("Invalid configuration")?;
    let target = config.database.display_target();

    let db = Database::connect(&config.database)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to {}: {}", target, e.message()))?;

    let result = db.server_version().await;
    db.close().await;

    let version =
        result.map_err(|e| anyhow::anyhow!("Connected to {} but query failed: {}", target, e.message()))?;
    println!("Connected to {}", target);
    println!("{}", version);
    Ok(())
}
