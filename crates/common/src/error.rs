//! Error types for platform collaborators

use thiserror::Error;

/// Result type alias using [`PlatformError`]
pub type PlatformResult<T> = std::result::Result<T, PlatformError>;

/// Errors raised by a Platform Adapter or while loading its configuration
#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No container runtime found. Install docker or podman")]
    RuntimeNotFound,

    #[error("Container {name} failed to start: {reason}")]
    StartFailed { name: String, reason: String },

    #[error("Container runtime error: {0}")]
    Runtime(String),

    #[error("Health check failed for {name} after {attempts} attempts")]
    HealthCheck { name: String, attempts: usize },

    #[error("{phase} timed out after {millis}ms")]
    Timeout { phase: String, millis: u64 },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Log stream unavailable for {0}")]
    LogStream(String),
}
