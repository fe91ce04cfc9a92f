use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, PgPool, Row};
use std::str::FromStr;
use std::time::Instant;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::error::{ListenerError, Result};

/// Migrations embedded from `./migrations`
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub struct DatabaseConnection {
    pool: PgPool,
}

impl DatabaseConnection {
    /// Build the pool from configuration
    pub async fn connect(config: &DatabaseConfig, production: bool) -> Result<Self> {
        let mut options = PgConnectOptions::from_str(&config.url)
            .map_err(|e| ListenerError::Configuration(format!("invalid database url: {e}")))?;
        // sqlx echoes statements at debug level by default
        if !config.statement_logging_enabled(production) {
            options = options.disable_statement_logging();
        }

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout())
            .max_lifetime(config.max_lifetime())
            .test_before_acquire(config.test_before_acquire)
            .connect_with(options)
            .await
            .map_err(|e| ListenerError::Database(format!("Failed to connect to database: {e}")))?;

        info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            acquire_timeout_seconds = config.acquire_timeout_seconds,
            "Database pool initialized"
        );

        Ok(Self { pool })
    }

    /// Wrap an existing pool, e.g. one created per test database
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<()> {
        let started = Instant::now();
        MIGRATOR.run(&self.pool).await?;
        info!(
            duration_ms = started.elapsed().as_millis() as u64,
            "Database migrations applied"
        );
        Ok(())
    }

    pub async fn health_check(&self) -> Result<bool> {
        let row = sqlx::query("SELECT 1 as health")
            .fetch_one(&self.pool)
            .await?;

        let health: i32 = row.get("health");
        Ok(health == 1)
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}
