//! Environment-driven configuration

use anyhow::Context;
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_APPLICATION_NAME: &str = "pg-monitor";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory served under `/static`.
    pub static_dir: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Full connection URL. When set it replaces host/port/name/user/password/ssl.
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: Option<String>,
    pub ssl: bool,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    /// Tag set as `application_name` on every pooled connection so the
    /// dashboard can leave its own sessions out of activity listings.
    pub application_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup (e.g. for tests).
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let server = ServerConfig {
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&var, "PORT", 3000)?,
            static_dir: var("STATIC_DIR").unwrap_or_else(|| "static".to_string()),
        };

        let database = DatabaseConfig {
            url: var("DATABASE_URL"),
            host: var("DB_HOST").unwrap_or_else(|| "localhost".to_string()),
            port: parse_or(&var, "DB_PORT", 5432)?,
            name: var("DB_NAME").unwrap_or_else(|| "postgres".to_string()),
            user: var("DB_USER").unwrap_or_else(|| "postgres".to_string()),
            password: var("DB_PASSWORD"),
            ssl: var("DB_SSL").map(|v| parse_flag(&v)).unwrap_or(false),
            max_connections: parse_or(&var, "DB_POOL_MAX", 20)?,
            acquire_timeout: Duration::from_millis(parse_or(&var, "DB_ACQUIRE_TIMEOUT_MS", 2000)?),
            idle_timeout: Duration::from_millis(parse_or(&var, "DB_IDLE_TIMEOUT_MS", 30_000)?),
            application_name: var("DB_APPLICATION_NAME")
                .unwrap_or_else(|| DEFAULT_APPLICATION_NAME.to_string()),
        };

        let logging = LoggingConfig {
            format: match var("LOG_FORMAT").as_deref().map(str::to_ascii_lowercase) {
                None => LogFormat::Text,
                Some(f) if f == "text" => LogFormat::Text,
                Some(f) if f == "json" => LogFormat::Json,
                Some(other) => anyhow::bail!("LOG_FORMAT must be 'text' or 'json', got '{}'", other),
            },
        };

        let config = AppConfig {
            server,
            database,
            logging,
        };
        config.validate()?;
        Ok(config)
    }

    /// Host and port the HTTP server binds to. The host may be a name;
    /// it is resolved at bind time.
    pub fn listen_addr(&self) -> (&str, u16) {
        (self.server.host.as_str(), self.server.port)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "PORT must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            self.database.port > 0,
            "DB_PORT must be between 1 and 65535, got {}",
            self.database.port
        );
        anyhow::ensure!(
            self.database.max_connections > 0,
            "DB_POOL_MAX must be > 0, got {}",
            self.database.max_connections
        );
        anyhow::ensure!(
            !self.database.acquire_timeout.is_zero(),
            "DB_ACQUIRE_TIMEOUT_MS must be > 0"
        );
        anyhow::ensure!(
            !self.database.idle_timeout.is_zero(),
            "DB_IDLE_TIMEOUT_MS must be > 0"
        );
        anyhow::ensure!(
            !self.database.application_name.is_empty(),
            "DB_APPLICATION_NAME must be non-empty"
        );
        if let Some(url) = &self.database.url {
            PgConnectOptions::from_str(url).context("DATABASE_URL is not a valid connection URL")?;
        }
        Ok(())
    }
}

impl DatabaseConfig {
    /// Connection options for the pool, tagged with the application name.
    pub fn connect_options(&self) -> anyhow::Result<PgConnectOptions> {
        let options = match &self.url {
            Some(url) => PgConnectOptions::from_str(url)
                .context("DATABASE_URL is not a valid connection URL")?,
            None => {
                let options = PgConnectOptions::new()
                    .host(&self.host)
                    .port(self.port)
                    .database(&self.name)
                    .username(&self.user)
                    .ssl_mode(if self.ssl {
                        PgSslMode::Require
                    } else {
                        PgSslMode::Disable
                    });
                match &self.password {
                    Some(password) => options.password(password),
                    None => options,
                }
            }
        };
        Ok(options.application_name(&self.application_name))
    }

    /// `host:port/dbname` without credentials, for logs. URLs are parsed so
    /// neither userinfo nor query parameters such as `password` survive.
    pub fn display_target(&self) -> String {
        match &self.url {
            Some(url) => match PgConnectOptions::from_str(url) {
                Ok(options) => match options.get_database() {
                    Some(name) => {
                        format!("{}:{}/{}", options.get_host(), options.get_port(), name)
                    }
                    None => format!("{}:{}", options.get_host(), options.get_port()),
                },
                Err(_) => "***".to_string(),
            },
            None => format!("{}:{}/{}", self.host, self.port, self.name),
        }
    }
}

fn parse_or<T, F>(var: &F, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value '{}'", key, raw)),
        None => Ok(default),
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on" | "require"
    )
}
