//! Container platform adapter
//!
//! Implements [`itrun_common::PlatformAdapter`] on top of the `podman` or
//! `docker` CLI:
//! - starts the configured containers for one run
//! - polls HTTP health endpoints (or running state) until ready
//! - runs the E2E container with the run's results directory mounted
//! - streams container output via `logs -f`
//! - removes every container it started

pub mod docker;
pub mod handle;
pub mod health;
pub mod runtime;

pub use docker::DockerPlatform;
pub use handle::DockerContainer;
pub use runtime::ContainerRuntime;
