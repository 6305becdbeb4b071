//! [`PlatformAdapter`] implementation driving the docker/podman CLI

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info, warn};

use itrun_common::{
    ContainerHandle, ContainerMap, E2eExecution, PlatformAdapter, PlatformConfig, PlatformError,
    PlatformResult, RunContext,
};

use crate::handle::DockerContainer;
use crate::health;
use crate::runtime::{self, ContainerRuntime};

/// A container this adapter started and must remove
#[derive(Debug, Clone, Serialize)]
struct StartedContainer {
    name: String,
    id: String,
    image: String,
    ports: Vec<String>,
}

/// Platform adapter backed by a local container runtime
pub struct DockerPlatform {
    config: Option<PlatformConfig>,
    config_error: Option<String>,
    runtime: OnceLock<Option<ContainerRuntime>>,
    started: Mutex<Vec<StartedContainer>>,
}

impl DockerPlatform {
    /// Load and validate the config at `path`. A rejected config is recorded,
    /// not returned, so the orchestrator can report it as a config failure.
    pub fn from_path(path: &Path) -> Self {
        match PlatformConfig::load(path) {
            Ok(config) => Self::with_config(config),
            Err(e) => Self {
                config: None,
                config_error: Some(format!("{}: {}", path.display(), e)),
                runtime: OnceLock::new(),
                started: Mutex::new(Vec::new()),
            },
        }
    }

    pub fn with_config(config: PlatformConfig) -> Self {
        let config_error = config.validate().err().map(|e| e.to_string());
        Self {
            config: if config_error.is_none() { Some(config) } else { None },
            config_error,
            runtime: OnceLock::new(),
            started: Mutex::new(Vec::new()),
        }
    }

    /// Pin the runtime instead of detecting it
    pub fn with_runtime(self, runtime: ContainerRuntime) -> Self {
        let _ = self.runtime.set(Some(runtime));
        self
    }

    fn config(&self) -> PlatformResult<&PlatformConfig> {
        self.config.as_ref().ok_or_else(|| {
            PlatformError::InvalidConfig(self.config_error.clone().unwrap_or_else(|| "not loaded".to_string()))
        })
    }

    /// Detection shells out and waits, so it runs on the blocking pool once
    async fn runtime(&self) -> PlatformResult<ContainerRuntime> {
        if let Some(known) = self.runtime.get() {
            return known.ok_or(PlatformError::RuntimeNotFound);
        }
        let detected = tokio::task::spawn_blocking(ContainerRuntime::detect)
            .await
            .map_err(|e| PlatformError::Runtime(format!("runtime detection failed: {}", e)))?;
        (*self.runtime.get_or_init(|| detected)).ok_or(PlatformError::RuntimeNotFound)
    }

    /// Remove containers of this run whose `run -d` never reported back.
    /// They are addressed by their deterministic name.
    async fn remove_leftovers(&self, runtime: ContainerRuntime, config: &PlatformConfig, run_id: &str) {
        let names = leftover_names(config, run_id, &self.started.lock());
        for name in names {
            let args = vec!["rm".to_string(), "-f".to_string(), name.clone()];
            match runtime.exec(&args).await {
                Ok(_) => info!("Removed partially started {}", name),
                Err(e) => debug!("Leftover removal of {}: {}", name, e),
            }
        }
    }

    async fn start_each(&self, runtime: ContainerRuntime, config: &PlatformConfig, ctx: &RunContext) -> PlatformResult<()> {
        for spec in &config.containers {
            info!("Starting {} ({})", spec.name, spec.image);
            let args = runtime::run_args(spec, &ctx.run_id, config.network.as_deref());
            let id = runtime.exec(&args).await.map_err(|e| PlatformError::StartFailed {
                name: spec.name.clone(),
                reason: e.to_string(),
            })?;

            debug!("{} started as {}", spec.name, id);
            self.started.lock().push(StartedContainer {
                name: spec.name.clone(),
                id,
                image: spec.image.clone(),
                ports: spec.ports.clone(),
            });
        }
        Ok(())
    }

    async fn ensure_network(&self, runtime: ContainerRuntime, network: &str) -> PlatformResult<()> {
        let inspect = vec!["network".to_string(), "inspect".to_string(), network.to_string()];
        if runtime.exec(&inspect).await.is_ok() {
            return Ok(());
        }
        info!("Creating network {}", network);
        let create = vec!["network".to_string(), "create".to_string(), network.to_string()];
        runtime.exec(&create).await.map(|_| ())
    }

    /// Stop the E2E process: SIGTERM first, then force kill
    async fn terminate(child: &mut tokio::process::Child) {
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Some(pid) = child.id() {
                if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok() {
                    // Give it a moment to shut down gracefully
                    tokio::time::sleep(Duration::from_millis(500)).await;
                }
            }
        }

        let _ = child.kill().await;
    }
}

/// Names of configured containers that are not tracked as started
fn leftover_names(config: &PlatformConfig, run_id: &str, started: &[StartedContainer]) -> Vec<String> {
    config
        .containers
        .iter()
        .filter(|spec| !started.iter().any(|c| c.name == spec.name))
        .map(|spec| runtime::container_name(run_id, &spec.name))
        .collect()
}

#[async_trait]
impl PlatformAdapter for DockerPlatform {
    fn has_validated_config(&self) -> bool {
        self.config.is_some()
    }

    fn validated_config(&self) -> Option<&PlatformConfig> {
        self.config.as_ref()
    }

    fn config_error(&self) -> Option<String> {
        self.config_error.clone()
    }

    fn has_e2e_config(&self) -> bool {
        self.config.as_ref().map(|c| c.e2e.is_some()).unwrap_or(false)
    }

    async fn start(&self, ctx: &RunContext) -> PlatformResult<()> {
        let config = self.config()?;
        let runtime = self.runtime().await?;
        info!("Using {} runtime", runtime.command());

        if let Some(network) = &config.network {
            self.ensure_network(runtime, network).await?;
        }

        let budget = config.timeouts.startup();
        match tokio::time::timeout(budget, self.start_each(runtime, config, ctx)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Startup exceeded {}ms", config.timeouts.startup_ms);
                self.remove_leftovers(runtime, config, &ctx.run_id).await;
                Err(PlatformError::Timeout {
                    phase: "startup".to_string(),
                    millis: config.timeouts.startup_ms,
                })
            }
        }
    }

    fn export_info(&self, ctx: &RunContext) -> PlatformResult<()> {
        let started = self.started.lock().clone();
        for container in &started {
            info!(
                "{} -> {} [{}] ports: {}",
                container.name,
                container.id,
                container.image,
                if container.ports.is_empty() { "-".to_string() } else { container.ports.join(", ") }
            );
        }

        let info = serde_json::json!({
            "runId": ctx.run_id,
            "containers": started,
        });
        let path = ctx.reports_dir().join("platform-info.json");
        std::fs::create_dir_all(ctx.reports_dir())?;
        std::fs::write(&path, serde_json::to_string_pretty(&info)?)?;
        debug!("Platform info written to {}", path.display());
        Ok(())
    }

    async fn check_all_healthy(&self) -> PlatformResult<()> {
        let config = self.config()?;
        let runtime = self.runtime().await?;
        let deadline = Instant::now() + config.timeouts.health_check();
        let started = self.started.lock().clone();

        for container in &started {
            let health_spec = config
                .containers
                .iter()
                .find(|c| c.name == container.name)
                .and_then(|c| c.health.as_ref());

            match health_spec {
                Some(check) => {
                    let interval = Duration::from_millis(check.interval_ms);
                    health::wait_for_http(&container.name, &check.url, interval, deadline).await?;
                }
                None => {
                    health::wait_for_running(runtime, &container.name, &container.id, Duration::from_millis(500), deadline)
                        .await?;
                }
            }
        }
        Ok(())
    }

    async fn run_tests(&self, ctx: &RunContext) -> PlatformResult<Option<E2eExecution>> {
        let config = self.config()?;
        let Some(e2e) = &config.e2e else {
            return Ok(None);
        };
        let runtime = self.runtime().await?;

        let args = runtime::e2e_args(e2e, ctx, config.network.as_deref());
        info!("Running E2E container {}", e2e.image);
        debug!("{} {}", runtime.command(), args.join(" "));

        let start = Instant::now();
        let mut child = Command::new(runtime.command())
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let status = match tokio::time::timeout(config.timeouts.e2e(), child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                warn!("E2E run exceeded {}ms; terminating", config.timeouts.e2e_ms);
                Self::terminate(&mut child).await;
                let rm = vec!["rm".to_string(), "-f".to_string(), runtime::container_name(&ctx.run_id, "e2e")];
                if let Err(e) = runtime.exec(&rm).await {
                    debug!("E2E container removal: {}", e);
                }
                return Err(PlatformError::Timeout {
                    phase: "e2e".to_string(),
                    millis: config.timeouts.e2e_ms,
                });
            }
        };

        Ok(Some(E2eExecution {
            exit_code: status.code().unwrap_or(-1),
            success: status.success(),
            duration_ms: start.elapsed().as_millis() as u64,
        }))
    }

    async fn stop_all(&self) -> PlatformResult<()> {
        let started: Vec<StartedContainer> = std::mem::take(&mut *self.started.lock());
        if started.is_empty() {
            return Ok(());
        }
        let runtime = self.runtime().await?;

        let mut failures = Vec::new();
        // Reverse start order so dependents go first
        for container in started.iter().rev() {
            let args = vec!["rm".to_string(), "-f".to_string(), container.id.clone()];
            match runtime.exec(&args).await {
                Ok(_) => info!("Removed {}", container.name),
                Err(e) => failures.push(format!("{}: {}", container.name, e)),
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(PlatformError::Runtime(failures.join("; ")))
        }
    }

    fn containers(&self) -> ContainerMap {
        let Some(runtime) = self.runtime.get().copied().flatten() else {
            return ContainerMap::new();
        };

        self.started
            .lock()
            .iter()
            .map(|c| {
                let handle: Arc<dyn ContainerHandle> = Arc::new(DockerContainer::new(runtime, c.id.clone()));
                (c.name.clone(), handle)
            })
            .collect()
    }
}
