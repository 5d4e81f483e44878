//! Database connection pool lifecycle

use crate::config::DatabaseConfig;
use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use tracing::info;

/// Process-wide connection pool to the monitored server.
///
/// Created once at startup and closed on shutdown; the snapshot builders only
/// borrow it.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
    application_name: String,
}

impl Database {
    /// Create the pool without opening a connection. Connections are made on
    /// first use, so the server starts even while PostgreSQL is down.
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<Self> {
        let options = config
            .connect_options()
            .map_err(|e| AppError::InternalError(format!("{:#}", e)))?;

        let pool = pool_options(config).connect_lazy_with(options);

        info!(
            target_db = %config.display_target(),
            max_connections = config.max_connections,
            "Database connection pool created"
        );
        Ok(Self {
            pool,
            application_name: config.application_name.clone(),
        })
    }

    /// Create the pool and open the first connection eagerly.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let options = config
            .connect_options()
            .map_err(|e| AppError::InternalError(format!("{:#}", e)))?;

        let pool = pool_options(config).connect_with(options).await?;

        info!(target_db = %config.display_target(), "Database connection pool established");
        Ok(Self {
            pool,
            application_name: config.application_name.clone(),
        })
    }

    /// Get the underlying connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// `application_name` carried by this pool's connections.
    pub fn application_name(&self) -> &str {
        &self.application_name
    }

    /// Run a trivial query to prove the server answers.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Current server clock.
    pub async fn server_time(&self) -> Result<DateTime<Utc>> {
        let row = sqlx::query("SELECT now() AS now").fetch_one(&self.pool).await?;
        Ok(row.try_get("now")?)
    }

    /// Server version banner, as reported by `version()`.
    pub async fn server_version(&self) -> Result<String> {
        let row = sqlx::query("SELECT version() AS version")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("version")?)
    }

    /// Close every pooled connection. Waits for checked-out connections to
    /// be returned.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database connection pool closed");
    }
}

fn pool_options(config: &DatabaseConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(0)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
}
