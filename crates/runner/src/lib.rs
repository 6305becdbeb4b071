//! itrun: integration-test run orchestrator
//!
//! Brings up a containerised platform, waits for it to become healthy,
//! optionally runs an end-to-end test container against it, collects the
//! artefacts and tears everything down, recording one summary per run.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  it-runner (binary)                                          │
//! │    flags::parse(args, env) -> Options                        │
//! ├──────────────────────────────────────────────────────────────┤
//! │  IntegrationRunner                                           │
//! │    ├── ArtefactsManager   <root>/runs/<runId>/...            │
//! │    ├── RunnerLogger       console + logs/runner-output.log   │
//! │    ├── ContainerLogCapture logs/containers.log               │
//! │    ├── ShutdownSignal     SIGINT / SIGTERM                   │
//! │    └── dyn PlatformAdapter (itrun-platform: DockerPlatform)  │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod artefacts;
pub mod capture;
pub mod error;
pub mod flags;
pub mod logging;
pub mod runner;
pub mod signals;
pub mod usage;

pub use artefacts::ArtefactsManager;
pub use capture::ContainerLogCapture;
pub use error::{ConfigSyntaxError, RunnerError, RunnerResult};
pub use flags::{ContainerLogs, Options};
pub use logging::{LogLevel, RunnerLogger};
pub use runner::IntegrationRunner;
pub use signals::ShutdownSignal;
