//! Lifecycle orchestrator
//!
//! Drives one run through its phases, strictly in order:
//!
//! ```text
//! setup -> config -> mode -> [dry run] -> start -> health -> capture
//!       -> tests | hold -> collect -> cleanup -> finalize
//! ```
//!
//! Every path ends in [`IntegrationRunner::finalize`], which is the only place
//! the exit code is decided and the summary is written.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

use itrun_common::{E2eExecution, ExitCode, PlatformAdapter, RunContext, RunMode, RunStatus, RunSummary};

use crate::artefacts::ArtefactsManager;
use crate::capture::{self, ContainerLogCapture};
use crate::error::{RunnerError, RunnerResult};
use crate::flags::Options;
use crate::logging::{LogLevel, RunnerLogger};
use crate::signals::{self, ShutdownSignal};

const RULE: &str = "============================================================";

/// How the positive path ended, before the exit code is decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Completion {
    ConfigInvalid,
    DryRun,
    Finished,
}

pub struct IntegrationRunner {
    options: Options,
    artefacts: ArtefactsManager,
    logger: RunnerLogger,
    platform: Box<dyn PlatformAdapter>,
    shutdown: ShutdownSignal,
    listen_for_signals: bool,
    start_time: DateTime<Utc>,
    container_log_path: Option<PathBuf>,
    capture: Option<ContainerLogCapture>,
    e2e_result: Option<E2eExecution>,
    start_attempted: bool,
    collected: bool,
    is_shutting_down: bool,
}

impl IntegrationRunner {
    pub fn new(options: Options, artefacts: ArtefactsManager, platform: Box<dyn PlatformAdapter>) -> Self {
        let log_file = options
            .capture_logs_to_file
            .then(|| artefacts.runner_log_path().to_path_buf());
        let logger = RunnerLogger::new(log_file.as_deref());
        Self::with_logger(options, artefacts, platform, logger)
    }

    pub fn with_logger(
        options: Options,
        artefacts: ArtefactsManager,
        platform: Box<dyn PlatformAdapter>,
        logger: RunnerLogger,
    ) -> Self {
        Self {
            options,
            artefacts,
            logger,
            platform,
            shutdown: ShutdownSignal::new(),
            listen_for_signals: true,
            start_time: Utc::now(),
            container_log_path: None,
            capture: None,
            e2e_result: None,
            start_attempted: false,
            collected: false,
            is_shutting_down: false,
        }
    }

    /// Share an externally owned shutdown signal. Its owner is responsible
    /// for installing signal handlers, see [`signals::listen`].
    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self.listen_for_signals = false;
        self
    }

    /// Skip installing OS signal handlers; the shutdown signal can still be
    /// triggered directly
    pub fn without_signal_handlers(mut self) -> Self {
        self.listen_for_signals = false;
        self
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    pub fn artefacts(&self) -> &ArtefactsManager {
        &self.artefacts
    }

    /// Execute the run and return its exit code
    pub async fn run(&mut self) -> ExitCode {
        let listener = if self.listen_for_signals {
            match signals::listen(self.shutdown.clone()) {
                Ok(listener) => Some(listener),
                Err(e) => {
                    self.log(LogLevel::Warn, &format!("Cannot install signal handlers: {}", e));
                    None
                }
            }
        } else {
            None
        };

        let outcome = self.drive().await;
        let code = self.settle(outcome).await;

        if let Some(listener) = listener {
            listener.abort();
        }
        code
    }

    fn log(&self, level: LogLevel, message: &str) {
        self.logger.log(level, message);
    }

    fn checkpoint(&self) -> RunnerResult<()> {
        if self.shutdown.is_cancelled() {
            return Err(RunnerError::Interrupted);
        }
        Ok(())
    }

    fn mode(&self) -> RunMode {
        RunMode::from_e2e_configured(self.platform.has_e2e_config())
    }

    /// The positive path. Returns early on the first error.
    async fn drive(&mut self) -> RunnerResult<Completion> {
        self.artefacts.ensure_directories()?;
        self.container_log_path = capture::resolve_destination(
            self.options.container_logs.as_ref(),
            self.artefacts.run_dir(),
            self.artefacts.logs_dir(),
        )?;

        let ctx = RunContext::new(
            self.artefacts.run_id(),
            self.artefacts.artefacts_root(),
            self.artefacts.run_dir(),
        );

        self.log(LogLevel::Info, &format!("Run ID: {}", ctx.run_id));
        self.log(LogLevel::Info, &format!("Artefacts: {}", ctx.run_dir.display()));
        if let Some(path) = self.logger.log_path() {
            self.log(LogLevel::Info, &format!("Runner log file: {}", path.display()));
        }
        if let Some(path) = &self.container_log_path {
            self.log(LogLevel::Info, &format!("Container logs: {}", path.display()));
        }
        self.checkpoint()?;

        if !self.platform.has_validated_config() {
            let reason = self.platform.config_error().unwrap_or_else(|| "no valid configuration".to_string());
            self.log(LogLevel::Error, &format!("Configuration validation failed: {}", reason));
            return Ok(Completion::ConfigInvalid);
        }

        let mode = self.mode();
        self.log(LogLevel::Info, &format!("Mode: {}", mode));

        if self.options.dry_run {
            self.print_execution_plan(mode);
            self.log(LogLevel::Info, "Dry run complete");
            return Ok(Completion::DryRun);
        }
        self.checkpoint()?;

        self.log(LogLevel::Info, "Starting platform...");
        self.start_attempted = true;
        self.platform.start(&ctx).await?;
        self.platform.export_info(&ctx)?;
        self.checkpoint()?;

        self.log(LogLevel::Info, "Waiting for health checks...");
        self.platform.check_all_healthy().await?;
        self.log(LogLevel::Success, "Platform is ready");
        self.checkpoint()?;

        self.start_capture().await?;

        match mode {
            RunMode::E2e => self.execute_tests(&ctx).await?,
            RunMode::PlatformOnly => self.hold_platform().await,
        }
        self.checkpoint()?;

        self.collect()?;
        Ok(Completion::Finished)
    }

    async fn start_capture(&mut self) -> RunnerResult<()> {
        let Some(path) = self.container_log_path.clone() else {
            return Ok(());
        };

        let containers = self.platform.containers();
        let mut capture = ContainerLogCapture::new(path);
        let attached = capture.start(&containers, &self.logger).await;
        // Keep the handle even on error so teardown can flush what was opened
        self.capture = Some(capture);

        let attached = attached?;
        debug!("Capturing logs from {}/{} container(s)", attached, containers.len());
        Ok(())
    }

    async fn execute_tests(&mut self, ctx: &RunContext) -> RunnerResult<()> {
        self.log(LogLevel::Info, "Running E2E tests...");
        match self.platform.run_tests(ctx).await? {
            Some(result) => {
                let (level, verdict) = if result.success {
                    (LogLevel::Success, "passed")
                } else {
                    (LogLevel::Error, "failed")
                };
                self.log(level, &format!("E2E {} (exit {})", verdict, result.exit_code));
                self.e2e_result = Some(result);
            }
            None => self.log(LogLevel::Warn, "E2E tests produced no result"),
        }
        Ok(())
    }

    /// Keep the platform up for the hold window or until interrupted
    async fn hold_platform(&self) {
        let window = self.hold_window();
        self.log(
            LogLevel::Info,
            &format!("Platform running; holding for {}ms (Ctrl+C to stop)", window.as_millis()),
        );

        tokio::select! {
            _ = tokio::time::sleep(window) => {
                self.log(LogLevel::Info, "Hold window elapsed");
            }
            _ = self.shutdown.cancelled() => {
                self.log(LogLevel::Info, "Hold interrupted");
            }
        }
    }

    fn hold_window(&self) -> Duration {
        match (self.options.timeout_ms, self.platform.validated_config()) {
            (Some(ms), _) => Duration::from_millis(ms),
            (None, Some(config)) => config.timeouts.e2e(),
            (None, None) => Duration::ZERO,
        }
    }

    /// Copy the external E2E output into the run directory, at most once
    fn collect(&mut self) -> RunnerResult<usize> {
        if self.collected {
            return Ok(0);
        }
        self.collected = true;
        self.log(LogLevel::Info, "Collecting artefacts...");
        self.artefacts.copy_e2e_results()
    }

    /// Decide the terminal code, run the failure-path collection and cleanup,
    /// and finalize.
    async fn settle(&mut self, outcome: RunnerResult<Completion>) -> ExitCode {
        let (code, status) = match outcome {
            Ok(Completion::ConfigInvalid) => (ExitCode::ConfigInvalid, RunStatus::Failure),
            Ok(Completion::DryRun) => (ExitCode::Success, RunStatus::Success),
            Ok(Completion::Finished) => match self.e2e_result {
                Some(result) if !result.success => (ExitCode::E2eFailure, RunStatus::Failure),
                _ => (ExitCode::Success, RunStatus::Success),
            },
            Err(RunnerError::Interrupted) => {
                let reason = self.shutdown.reason().unwrap_or("shutdown request");
                self.log(LogLevel::Info, &format!("Received {}, shutting down...", reason));
                (ExitCode::Success, RunStatus::Success)
            }
            Err(e @ RunnerError::PathEscape(_)) => {
                self.log(LogLevel::Error, &e.to_string());
                (ExitCode::ConfigInvalid, RunStatus::Failure)
            }
            Err(e) => {
                self.log(LogLevel::Error, &format!("Error: {}", e));
                (ExitCode::UnexpectedError, RunStatus::Error)
            }
        };

        if self.start_attempted {
            if let Err(e) = self.collect() {
                self.log(LogLevel::Warn, &format!("Artefact collection failed: {}", e));
            }
            self.cleanup().await;
        }

        self.finalize(code, status)
    }

    /// Stop log capture and every container. Runs at most once; a failed
    /// teardown is logged and never changes the exit code.
    pub async fn cleanup(&mut self) {
        if self.is_shutting_down {
            return;
        }
        self.is_shutting_down = true;

        if let Some(mut capture) = self.capture.take() {
            capture.stop().await;
        }

        self.log(LogLevel::Info, "Shutting down platform...");
        match self.platform.stop_all().await {
            Ok(()) => self.log(LogLevel::Success, "Platform shutdown complete"),
            Err(e) => self.log(LogLevel::Error, &format!("Cleanup error: {}", e)),
        }
    }

    fn finalize(&mut self, code: ExitCode, status: RunStatus) -> ExitCode {
        let summary = RunSummary::new(
            self.artefacts.run_id(),
            self.start_time,
            Utc::now(),
            code,
            status,
            self.mode(),
            self.e2e_result,
        );

        if let Err(e) = self.artefacts.write_summary(&summary) {
            self.log(LogLevel::Error, &format!("Failed to write summary: {}", e));
        }

        let runner_log = self
            .logger
            .log_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "disabled".to_string());
        let container_logs = self
            .container_log_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "disabled".to_string());

        for line in [
            String::new(),
            RULE.to_string(),
            format!("  Run ID:     {}", summary.run_id),
            format!("  Status:     {}", status.as_str().to_uppercase()),
            format!("  Duration:   {}s", (summary.duration_ms as f64 / 1000.0).round() as u64),
            format!("  Exit Code:  {}", code),
            format!("  Artefacts:  {}", self.artefacts.run_dir().display()),
            format!("  Runner log: {}", runner_log),
            format!("  Container logs: {}", container_logs),
            RULE.to_string(),
        ] {
            self.logger.print(&line);
        }

        let had_log_file = self.logger.log_path().is_some();
        self.logger.close();
        if had_log_file {
            let marker = format!("Run finished: exit {} ({})", code, status);
            if let Err(e) = self.artefacts.write_log_line(&marker) {
                debug!("Failed to append run marker: {}", e);
            }
        }

        info!("Run {} finished with exit code {}", summary.run_id, code);
        code
    }

    fn print_execution_plan(&self, mode: RunMode) {
        let Some(config) = self.platform.validated_config() else {
            return;
        };
        let timeouts = &config.timeouts;
        let names: Vec<&str> = config.containers.iter().map(|c| c.name.as_str()).collect();

        let mut steps = vec![
            format!("Load configuration ({} container(s))", names.len()),
            "Initialise platform adapter".to_string(),
            format!("Start containers: {} (timeout {}ms)", names.join(", "), timeouts.startup_ms),
            "Export platform info".to_string(),
            format!("Run health checks (timeout {}ms)", timeouts.health_check_ms),
        ];
        match mode {
            RunMode::E2e => steps.push(format!("Run E2E tests via e2e container (timeout {}ms)", timeouts.e2e_ms)),
            RunMode::PlatformOnly => steps.push(format!(
                "Keep platform running for {}ms or until interrupted",
                self.hold_window().as_millis()
            )),
        }
        steps.push("Collect artefacts".to_string());
        steps.push("Shut down containers".to_string());

        self.log(LogLevel::Info, "Execution plan:");
        for (i, step) in steps.iter().enumerate() {
            self.logger.print(&format!("  {}. {}", i + 1, step));
        }
    }
}
