//! Error types for the run orchestrator

use std::path::PathBuf;
use thiserror::Error;

use itrun_common::PlatformError;

/// Command-line or environment input that does not match the flag table
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigSyntaxError {
    #[error("Unknown positional argument: {0}")]
    UnexpectedArgument(String),

    #[error("Unknown flag: {0}")]
    UnknownFlag(String),

    #[error("Flag {0} requires a value")]
    MissingValue(String),

    #[error("Flag {0} requires a number value")]
    MissingNumber(String),

    #[error("Flag {flag} expects a number, got '{value}'")]
    InvalidNumber { flag: String, value: String },

    #[error("Environment variable {var} expects a number, got '{value}'")]
    InvalidEnvNumber { var: String, value: String },

    #[error("Environment variable {var} must be a single path segment, got '{value}'")]
    InvalidRunId { var: String, value: String },
}

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Container logs must be written inside artefacts directory: {}", .0.display())]
    PathEscape(PathBuf),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Run interrupted")]
    Interrupted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type RunnerResult<T> = Result<T, RunnerError>;
