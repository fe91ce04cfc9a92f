//! # Listener Configuration
//!
//! Typed configuration for the event listener. Values come from
//! `config/event-listener.yaml` (base section plus `development`, `test` and
//! `production` overrides), environment variables and finally CLI flags.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use event_listener::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let port = manager.config().server.port;
//! let batch = manager.config().outbox.batch_size;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::constants;
pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring event-listener.yaml
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// HTTP server and process layout
    pub server: ServerConfig,

    /// PostgreSQL connection pool
    pub database: DatabaseConfig,

    /// Kafka producer settings
    pub kafka: KafkaConfig,

    /// Outbox relay (dispatcher and periodic sweep)
    pub outbox: OutboxConfig,

    /// Device event handling
    pub events: EventsConfig,

    /// Active environment, set by the loader
    #[serde(skip)]
    pub environment: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Process count requested by the launcher. Only `1` is run in-process.
    pub processes: usize,
    /// Runtime worker threads.
    pub workers: usize,
    pub request_timeout_ms: u64,
    pub max_request_size_mb: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            processes: 1,
            workers: 4,
            request_timeout_ms: 30_000,
            max_request_size_mb: 16,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn socket_addr(&self) -> ConfigResult<SocketAddr> {
        self.bind_address().parse().map_err(|e| {
            ConfigurationError::invalid_value("server.host", &self.host, format!("{e}"))
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn max_request_size_bytes(&self) -> usize {
        self.max_request_size_mb * 1024 * 1024
    }
}

/// Database connection and pooling configuration
///
/// The defaults reproduce a pool of 20 with 30 overflow connections,
/// hourly connection recycling and a liveness check before checkout.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub max_lifetime_seconds: u64,
    pub test_before_acquire: bool,
    pub run_migrations: bool,
    /// Echo SQL statements at debug level. Defaults to off in production.
    pub log_statements: Option<bool>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 50,
            min_connections: 1,
            acquire_timeout_seconds: 30,
            max_lifetime_seconds: 3600,
            test_before_acquire: true,
            run_migrations: true,
            log_statements: None,
        }
    }
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_seconds)
    }

    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_seconds)
    }

    pub fn statement_logging_enabled(&self, production: bool) -> bool {
        self.log_statements.unwrap_or(!production)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct KafkaConfig {
    pub enabled: bool,
    pub bootstrap_servers: String,
    pub default_topic: String,
    pub client_id: String,
    pub acks: String,
    pub enable_idempotence: bool,
    pub compression_type: String,
    pub request_timeout_ms: u64,
    pub retry_backoff_ms: u64,
    pub linger_ms: u64,
    /// Send attempts per message before giving up
    pub max_retries: u32,
    /// Base delay between send attempts, multiplied by the attempt number
    pub retry_delay_ms: u64,
    /// Producer start attempts, with 2^attempt second backoff
    pub startup_attempts: u32,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bootstrap_servers: "localhost:9092".to_string(),
            default_topic: constants::producer::DEFAULT_TOPIC.to_string(),
            client_id: constants::producer::DEFAULT_CLIENT_ID.to_string(),
            acks: "all".to_string(),
            enable_idempotence: true,
            compression_type: "gzip".to_string(),
            request_timeout_ms: 30_000,
            retry_backoff_ms: 100,
            linger_ms: 10,
            max_retries: 5,
            retry_delay_ms: 1000,
            startup_attempts: 5,
        }
    }
}

impl KafkaConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutboxConfig {
    pub enabled: bool,
    pub batch_size: usize,
    pub poll_interval_seconds: u64,
    pub error_backoff_seconds: u64,
    /// Only sweep rows older than this, leaving fresh rows to the dispatcher
    pub min_age_seconds: u64,
    pub immediate_publish: bool,
    pub dispatch_workers: usize,
    pub dispatch_queue_size: usize,
    pub dispatch_max_retries: u32,
    pub dispatch_base_delay_seconds: u64,
    pub sweep_max_retries: u32,
    pub sweep_base_delay_seconds: u64,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            batch_size: 100,
            poll_interval_seconds: 10,
            error_backoff_seconds: 5,
            min_age_seconds: 0,
            immediate_publish: true,
            dispatch_workers: 4,
            dispatch_queue_size: 1024,
            dispatch_max_retries: 5,
            dispatch_base_delay_seconds: 30,
            sweep_max_retries: 3,
            sweep_base_delay_seconds: 60,
        }
    }
}

impl OutboxConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff_seconds)
    }

    pub fn min_age(&self) -> Duration {
        Duration::from_secs(self.min_age_seconds)
    }

    pub fn dispatch_retry_delay(&self, retries: u32) -> Duration {
        exponential_delay(self.dispatch_base_delay_seconds, retries)
    }

    pub fn sweep_retry_delay(&self, retries: u32) -> Duration {
        exponential_delay(self.sweep_base_delay_seconds, retries)
    }
}

/// `base * 2^retries` seconds, saturating.
pub fn exponential_delay(base_seconds: u64, retries: u32) -> Duration {
    let factor = 2u64.checked_pow(retries).unwrap_or(u64::MAX);
    Duration::from_secs(base_seconds.saturating_mul(factor))
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EventsConfig {
    pub persist_heartbeats: bool,
    /// Directory for pictures attached to device events. Pictures are
    /// discarded when unset.
    pub picture_dir: Option<PathBuf>,
    pub source: String,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            persist_heartbeats: false,
            picture_dir: None,
            source: constants::producer::DEFAULT_SOURCE.to_string(),
        }
    }
}

impl ListenerConfig {
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Validate cross-field constraints after all layers are applied
    pub fn validate(&self) -> ConfigResult<()> {
        if self.server.port == 0 {
            return Err(ConfigurationError::invalid_value(
                "server.port",
                self.server.port,
                "port must be non-zero",
            ));
        }
        if self.server.workers == 0 {
            return Err(ConfigurationError::invalid_value(
                "server.workers",
                self.server.workers,
                "at least one worker thread is required",
            ));
        }
        if self.server.processes == 0 {
            return Err(ConfigurationError::invalid_value(
                "server.processes",
                self.server.processes,
                "at least one process is required",
            ));
        }
        if self.outbox.batch_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "outbox.batch_size",
                self.outbox.batch_size,
                "batch size must be positive",
            ));
        }
        if self.outbox.dispatch_workers == 0 {
            return Err(ConfigurationError::invalid_value(
                "outbox.dispatch_workers",
                self.outbox.dispatch_workers,
                "at least one dispatch worker is required",
            ));
        }
        if self.outbox.dispatch_queue_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "outbox.dispatch_queue_size",
                self.outbox.dispatch_queue_size,
                "queue size must be positive",
            ));
        }
        if self.kafka.enabled && self.kafka.bootstrap_servers.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "kafka.bootstrap_servers",
                "kafka configuration (kafka.enabled = true)",
            ));
        }
        if self.kafka.max_retries == 0 {
            return Err(ConfigurationError::invalid_value(
                "kafka.max_retries",
                self.kafka.max_retries,
                "at least one send attempt is required",
            ));
        }
        Ok(())
    }

    /// A database URL is needed before the service can start.
    pub fn require_database_url(&self) -> ConfigResult<&str> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "database.url",
                "database configuration (set DATABASE_URL)",
            ));
        }
        Ok(&self.database.url)
    }
}
