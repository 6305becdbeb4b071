//! itrun Common Library
//!
//! Shared vocabulary for the itrun workspace: exit codes, the run summary
//! record, the platform configuration model, the explicit run context handed
//! to collaborators, and the `PlatformAdapter` trait the orchestrator drives.

pub mod config;
pub mod context;
pub mod error;
pub mod exit_code;
pub mod platform;
pub mod summary;

// Re-export commonly used types
pub use config::{ContainerSpec, E2eSpec, HealthCheck, PlatformConfig, PlatformTimeouts};
pub use context::RunContext;
pub use error::{PlatformError, PlatformResult};
pub use exit_code::ExitCode;
pub use platform::{ContainerHandle, ContainerMap, E2eExecution, LogStream, PlatformAdapter};
pub use summary::{RunMode, RunStatus, RunSummary};

/// itrun version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
