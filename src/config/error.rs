//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid bind address: {0}")]
    InvalidBindAddress(String),

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Invalid AI timeout (must be 1-300 seconds)")]
    InvalidAiTimeout,

    #[error("Temperature must be between 0.0 and 2.0")]
    InvalidTemperature,

    #[error("max_tokens must be greater than zero")]
    InvalidMaxTokens,

    #[error("max_attempts must be at least 1")]
    InvalidMaxAttempts,

    #[error("Invalid URL for {0}")]
    InvalidUrl(&'static str),

    #[error("Invalid completion thresholds: {0}")]
    InvalidThresholds(&'static str),

    #[error("Turn timeout must be at least one second")]
    InvalidTurnTimeout,

    #[error("Request timeout ({request_secs}s) must exceed the turn timeout ({turn_secs}s)")]
    RequestTimeoutTooShort { request_secs: u64, turn_secs: u64 },

    #[error("Retrieval top_k must be greater than zero")]
    InvalidTopK,
}
