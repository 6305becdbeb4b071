//! Test doubles for driving `IntegrationRunner` without a container runtime

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use itrun::flags::Options;
use itrun::{ArtefactsManager, IntegrationRunner, RunnerLogger, ShutdownSignal};
use itrun_common::{
    ContainerHandle, ContainerMap, ContainerSpec, E2eExecution, E2eSpec, LogStream, PlatformAdapter, PlatformConfig,
    PlatformError, PlatformResult, RunContext,
};

/// Per-operation call counters
#[derive(Debug, Default)]
pub struct Calls {
    pub start: AtomicUsize,
    pub export_info: AtomicUsize,
    pub health: AtomicUsize,
    pub run_tests: AtomicUsize,
    pub stop_all: AtomicUsize,
    pub contexts: Mutex<Vec<RunContext>>,
}

impl Calls {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

pub struct StubPlatform {
    pub calls: Arc<Calls>,
    config: Option<PlatformConfig>,
    e2e: Option<E2eExecution>,
    fail_start: bool,
    fail_stop: bool,
    interrupt_tests: Option<ShutdownSignal>,
    containers: ContainerMap,
}

pub fn container(name: &str) -> ContainerSpec {
    ContainerSpec {
        name: name.to_string(),
        image: format!("example/{}:latest", name),
        env: BTreeMap::new(),
        ports: Vec::new(),
        command: Vec::new(),
        health: None,
    }
}

impl StubPlatform {
    /// Valid config, platform-only mode
    pub fn platform_only() -> Self {
        let config = PlatformConfig {
            containers: vec![container("api"), container("db")],
            ..Default::default()
        };
        Self {
            calls: Arc::new(Calls::default()),
            config: Some(config),
            e2e: None,
            fail_start: false,
            fail_stop: false,
            interrupt_tests: None,
            containers: ContainerMap::new(),
        }
    }

    /// Valid config in e2e mode, reporting `result` from the test run
    pub fn e2e(result: E2eExecution) -> Self {
        let mut stub = Self::platform_only();
        if let Some(config) = stub.config.as_mut() {
            config.e2e = Some(E2eSpec {
                image: "example/e2e:latest".to_string(),
                command: Vec::new(),
                env: BTreeMap::new(),
                results_path: "/reports".to_string(),
            });
        }
        stub.e2e = Some(result);
        stub
    }

    pub fn invalid() -> Self {
        Self {
            config: None,
            ..Self::platform_only()
        }
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub fn failing_stop(mut self) -> Self {
        self.fail_stop = true;
        self
    }

    /// Trigger `signal` while the E2E run is in flight, as a Ctrl+C would
    pub fn interrupting_tests(mut self, signal: ShutdownSignal) -> Self {
        self.interrupt_tests = Some(signal);
        self
    }

    pub fn with_container(mut self, name: &str, handle: Arc<dyn ContainerHandle>) -> Self {
        self.containers.insert(name.to_string(), handle);
        self
    }
}

#[async_trait]
impl PlatformAdapter for StubPlatform {
    fn has_validated_config(&self) -> bool {
        self.config.is_some()
    }

    fn validated_config(&self) -> Option<&PlatformConfig> {
        self.config.as_ref()
    }

    fn config_error(&self) -> Option<String> {
        self.config.is_none().then(|| "stub config rejected".to_string())
    }

    fn has_e2e_config(&self) -> bool {
        self.config.as_ref().map(|c| c.e2e.is_some()).unwrap_or(false)
    }

    async fn start(&self, ctx: &RunContext) -> PlatformResult<()> {
        self.calls.start.fetch_add(1, Ordering::SeqCst);
        self.calls.contexts.lock().push(ctx.clone());
        if self.fail_start {
            return Err(PlatformError::StartFailed {
                name: "api".to_string(),
                reason: "image not found".to_string(),
            });
        }
        Ok(())
    }

    fn export_info(&self, _ctx: &RunContext) -> PlatformResult<()> {
        self.calls.export_info.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn check_all_healthy(&self) -> PlatformResult<()> {
        self.calls.health.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn run_tests(&self, _ctx: &RunContext) -> PlatformResult<Option<E2eExecution>> {
        self.calls.run_tests.fetch_add(1, Ordering::SeqCst);
        if let Some(signal) = &self.interrupt_tests {
            signal.trigger("SIGINT");
        }
        Ok(self.e2e)
    }

    async fn stop_all(&self) -> PlatformResult<()> {
        self.calls.stop_all.fetch_add(1, Ordering::SeqCst);
        if self.fail_stop {
            return Err(PlatformError::Runtime("rm -f api: no such container".to_string()));
        }
        Ok(())
    }

    fn containers(&self) -> ContainerMap {
        self.containers.clone()
    }
}

/// Handle whose log stream is a fixed byte buffer
pub struct StubContainer {
    id: String,
    output: Vec<u8>,
}

impl StubContainer {
    pub fn new(id: &str, output: &str) -> Arc<dyn ContainerHandle> {
        Arc::new(Self {
            id: id.to_string(),
            output: output.as_bytes().to_vec(),
        })
    }
}

#[async_trait]
impl ContainerHandle for StubContainer {
    fn id(&self) -> &str {
        &self.id
    }

    async fn open_logs(&self) -> Option<PlatformResult<LogStream>> {
        let stream: LogStream = Box::new(Cursor::new(self.output.clone()));
        Some(Ok(stream))
    }
}

/// Handle without log access
pub struct NoLogs;

#[async_trait]
impl ContainerHandle for NoLogs {
    fn id(&self) -> &str {
        "no-logs"
    }

    async fn open_logs(&self) -> Option<PlatformResult<LogStream>> {
        None
    }
}

/// Handle whose log stream stays open without producing data
#[derive(Default)]
pub struct SilentContainer {
    writers: Mutex<Vec<tokio::io::DuplexStream>>,
}

#[async_trait]
impl ContainerHandle for SilentContainer {
    fn id(&self) -> &str {
        "silent"
    }

    async fn open_logs(&self) -> Option<PlatformResult<LogStream>> {
        let (writer, reader) = tokio::io::duplex(64);
        self.writers.lock().push(writer);
        let stream: LogStream = Box::new(reader);
        Some(Ok(stream))
    }
}

/// Console sink the test can read back
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).to_string()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Runner over `platform` with artefacts under `root` and a captured console
pub fn runner(root: &Path, options: Options, platform: StubPlatform) -> (IntegrationRunner, SharedBuffer) {
    let console = SharedBuffer::default();
    let artefacts = ArtefactsManager::new(Some(root), "20260101-120000-test")
        .with_e2e_output_dir(root.join("external/e2e-results"));
    let log_file = options
        .capture_logs_to_file
        .then(|| artefacts.runner_log_path().to_path_buf());
    let logger = RunnerLogger::with_console(Box::new(console.clone()), log_file.as_deref());

    let runner = IntegrationRunner::with_logger(options, artefacts, Box::new(platform), logger).without_signal_handlers();
    (runner, console)
}

pub fn read_summary(root: &Path) -> serde_json::Value {
    let path = root.join("runs/20260101-120000-test/summary.json");
    let raw = std::fs::read_to_string(path).expect("summary.json written");
    serde_json::from_str(&raw).expect("summary.json is valid JSON")
}
