//! Configuration Error Types
//!
//! Error handling for configuration loading and validation with messages that
//! name the offending file or field.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration-related errors with detailed context
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// Failed to read a configuration file
    #[error("Failed to read configuration file '{file_path}': {error}")]
    FileRead { file_path: String, error: String },

    /// Configuration file exceeds the size limit
    #[error("Configuration file '{file_path}' is too large ({size} bytes)")]
    FileTooLarge { file_path: String, size: u64 },

    /// Invalid YAML syntax in configuration file
    #[error("Invalid YAML in configuration file '{file_path}': {error}")]
    InvalidYaml { file_path: String, error: String },

    /// Layered configuration could not be built or deserialized
    #[error("Failed to build configuration: {0}")]
    Build(String),

    /// Invalid configuration value
    #[error("Invalid value '{value}' for field '{field}': {context}")]
    InvalidValue {
        field: String,
        value: String,
        context: String,
    },

    /// Missing required configuration field
    #[error("Missing required configuration field '{field}' in {context}")]
    MissingRequiredField { field: String, context: String },

    /// Configuration directory does not exist
    #[error("Configuration directory not found: {0}")]
    DirectoryNotFound(PathBuf),
}

impl ConfigurationError {
    pub fn file_read_error(file_path: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self::FileRead {
            file_path: file_path.into(),
            error: error.to_string(),
        }
    }

    pub fn invalid_yaml(file_path: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self::InvalidYaml {
            file_path: file_path.into(),
            error: error.to_string(),
        }
    }

    pub fn invalid_value(
        field: impl Into<String>,
        value: impl std::fmt::Display,
        context: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.to_string(),
            context: context.into(),
        }
    }

    pub fn missing_required_field(field: impl Into<String>, context: impl Into<String>) -> Self {
        Self::MissingRequiredField {
            field: field.into(),
            context: context.into(),
        }
    }
}

impl From<config::ConfigError> for ConfigurationError {
    fn from(err: config::ConfigError) -> Self {
        Self::Build(err.to_string())
    }
}

pub type ConfigResult<T> = Result<T, ConfigurationError>;
