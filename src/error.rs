use crate::config::ConfigurationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Publish error: {0}")]
    Publish(String),
    #[error("Event error: {0}")]
    Event(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Startup error: {0}")]
    Startup(String),
}

impl ListenerError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<sqlx::Error> for ListenerError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for ListenerError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::Database(format!("migration failed: {err}"))
    }
}

impl From<ConfigurationError> for ListenerError {
    fn from(err: ConfigurationError) -> Self {
        Self::Configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ListenerError>;
