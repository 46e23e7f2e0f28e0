//! Custom error types for the common library
//!
//! This module defines the error types raised by the shared key-value store
//! and by configuration loading.

use thiserror::Error;

/// Custom error type for key-value store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Error occurred while reading or writing the backing file
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing file does not contain a valid JSON object
    #[error("Store encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Custom error type for configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A configuration source could not be read or deserialized
    #[error("Configuration error: {0}")]
    Load(#[from] config::ConfigError),

    /// A value was read but is not acceptable
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Type alias for Result with StoreError
pub type StoreResult<T> = Result<T, StoreError>;

/// Type alias for Result with ConfigError
pub type ConfigResult<T> = Result<T, ConfigError>;
