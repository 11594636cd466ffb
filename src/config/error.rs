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
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("JWT secret must be at least 32 bytes in production")]
    WeakJwtSecret,

    #[error("Outbound queue capacity must be greater than zero")]
    InvalidQueueCapacity,

    #[error("Maximum frame size must be between 1 KiB and 1 MiB")]
    InvalidFrameSize,

    #[error("Ping interval must be shorter than the read timeout")]
    PingIntervalTooLong,

    #[error("Invalid write timeout")]
    InvalidWriteTimeout,
}
