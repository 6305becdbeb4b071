//! Collaborator interfaces consumed by the orchestrator
//!
//! The orchestrator never talks to a container runtime directly. Everything it
//! needs from the tested system goes through [`PlatformAdapter`], and live
//! container output goes through [`ContainerHandle`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::io::AsyncRead;

use crate::config::PlatformConfig;
use crate::context::RunContext;
use crate::error::PlatformResult;

/// Byte stream of a container's combined output
pub type LogStream = Box<dyn AsyncRead + Send + Unpin>;

/// Snapshot of live containers keyed by name
pub type ContainerMap = BTreeMap<String, Arc<dyn ContainerHandle>>;

/// Outcome of the delegated end-to-end test execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct E2eExecution {
    pub exit_code: i32,
    pub success: bool,
    pub duration_ms: u64,
}

/// A running container as seen by the orchestrator
#[async_trait]
pub trait ContainerHandle: Send + Sync {
    /// Runtime identifier of the container
    fn id(&self) -> &str;

    /// Open the container's live log stream.
    ///
    /// Returns `None` when this handle has no log-stream capability.
    async fn open_logs(&self) -> Option<PlatformResult<LogStream>>;
}

/// Lifecycle of the system under test.
///
/// The config validity/retrieval pair doubles as the Config Provider.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    fn has_validated_config(&self) -> bool;

    fn validated_config(&self) -> Option<&PlatformConfig>;

    /// Human-readable reason the configuration was rejected, if known
    fn config_error(&self) -> Option<String> {
        None
    }

    fn has_e2e_config(&self) -> bool;

    async fn start(&self, ctx: &RunContext) -> PlatformResult<()>;

    fn export_info(&self, ctx: &RunContext) -> PlatformResult<()>;

    /// Block until every component reports healthy. Retry policy lives here.
    async fn check_all_healthy(&self) -> PlatformResult<()>;

    async fn run_tests(&self, ctx: &RunContext) -> PlatformResult<Option<E2eExecution>>;

    async fn stop_all(&self) -> PlatformResult<()>;

    fn containers(&self) -> ContainerMap;
}
