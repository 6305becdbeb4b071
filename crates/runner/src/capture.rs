//! Container log capture
//!
//! One reader task per container log stream feeds a single writer task that
//! owns the output file, so lines from different containers interleave by
//! arrival but are never torn.

use chrono::{SecondsFormat, Utc};
use futures::future::join_all;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use itrun_common::{ContainerMap, LogStream};

use crate::artefacts::normalize_path;
use crate::error::{RunnerError, RunnerResult};
use crate::flags::ContainerLogs;
use crate::logging::RunnerLogger;

pub const DEFAULT_CONTAINER_LOG: &str = "containers.log";

const LINE_BUFFER: usize = 1024;

/// Resolve where container logs go. Explicit paths must stay inside the run
/// directory; this is checked before anything is opened.
pub fn resolve_destination(
    setting: Option<&ContainerLogs>,
    run_dir: &Path,
    logs_dir: &Path,
) -> RunnerResult<Option<PathBuf>> {
    let requested = match setting {
        None | Some(ContainerLogs::Disabled) => return Ok(None),
        Some(ContainerLogs::Enabled) => return Ok(Some(logs_dir.join(DEFAULT_CONTAINER_LOG))),
        Some(ContainerLogs::Path(p)) => Path::new(p),
    };

    let candidate = if requested.is_absolute() {
        normalize_path(requested)
    } else {
        normalize_path(&run_dir.join(requested))
    };

    if !candidate.starts_with(normalize_path(run_dir)) {
        return Err(RunnerError::PathEscape(candidate));
    }
    Ok(Some(candidate))
}

fn tagged(name: &str, line: &str) -> String {
    format!(
        "[{}] [{}] {}\n",
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        name,
        line
    )
}

pub struct ContainerLogCapture {
    path: PathBuf,
    token: CancellationToken,
    sender: Option<mpsc::Sender<String>>,
    writer: Option<JoinHandle<std::io::Result<()>>>,
    readers: Vec<(String, JoinHandle<()>)>,
}

impl ContainerLogCapture {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            token: CancellationToken::new(),
            sender: None,
            writer: None,
            readers: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of container streams currently being followed
    pub fn active_streams(&self) -> usize {
        self.readers.len()
    }

    /// Attach to every container that exposes a log stream.
    ///
    /// Returns the number of streams attached. Containers without log access
    /// are skipped with a warning.
    pub async fn start(&mut self, containers: &ContainerMap, logger: &RunnerLogger) -> RunnerResult<usize> {
        if self.sender.is_none() {
            if let Some(parent) = self.path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await?;

            let (tx, rx) = mpsc::channel(LINE_BUFFER);
            self.writer = Some(tokio::spawn(write_lines(file, rx)));
            self.sender = Some(tx);
        }
        let Some(sender) = self.sender.clone() else {
            return Ok(0);
        };

        let mut attached = 0;
        for (name, handle) in containers {
            match handle.open_logs().await {
                None => {
                    logger.warn(&format!("Container {} does not expose logs; skipping capture", name));
                }
                Some(Err(e)) => {
                    logger.warn(&format!("Failed to attach to logs of {}: {}", name, e));
                }
                Some(Ok(stream)) => {
                    debug!("Following logs of {} ({})", name, handle.id());
                    let task = tokio::spawn(follow(name.clone(), stream, sender.clone(), self.token.clone()));
                    self.readers.push((name.clone(), task));
                    attached += 1;
                }
            }
        }

        Ok(attached)
    }

    /// Detach from every stream and flush the file. No-op if never started.
    pub async fn stop(&mut self) {
        self.token.cancel();

        let (names, tasks): (Vec<String>, Vec<JoinHandle<()>>) = self.readers.drain(..).unzip();
        for (name, joined) in names.iter().zip(join_all(tasks).await) {
            if let Err(e) = joined {
                debug!("Log reader for {} ended abnormally: {}", name, e);
            }
        }

        // Last sender gone: the writer drains the channel and exits
        self.sender = None;
        if let Some(writer) = self.writer.take() {
            match writer.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!("Container log writer failed: {}", e),
                Err(e) => debug!("Container log writer ended abnormally: {}", e),
            }
        }
    }
}

async fn write_lines(mut file: tokio::fs::File, mut rx: mpsc::Receiver<String>) -> std::io::Result<()> {
    while let Some(line) = rx.recv().await {
        file.write_all(line.as_bytes()).await?;
    }
    file.flush().await
}

async fn follow(name: String, stream: LogStream, tx: mpsc::Sender<String>, token: CancellationToken) {
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        tokio::select! {
            // Drain what is already readable before honouring cancellation
            biased;
            read = reader.read_until(b'\n', &mut buf) => match read {
                Ok(0) => break,
                Ok(_) => {
                    let text = String::from_utf8_lossy(&buf);
                    let line = text.trim_end_matches(['\n', '\r']);
                    if tx.send(tagged(&name, line)).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    let _ = tx.send(tagged(&name, &format!("log stream error: {}", e))).await;
                    break;
                }
            },
            _ = token.cancelled() => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_dir(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join("runs/r1")
    }

    #[test]
    fn test_disabled_or_absent_means_no_capture() {
        let dir = tempfile::tempdir().unwrap();
        let run = run_dir(&dir);
        assert_eq!(resolve_destination(None, &run, &run.join("logs")).unwrap(), None);
        assert_eq!(
            resolve_destination(Some(&ContainerLogs::Disabled), &run, &run.join("logs")).unwrap(),
            None
        );
    }

    #[test]
    fn test_enabled_uses_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let run = run_dir(&dir);
        let path = resolve_destination(Some(&ContainerLogs::Enabled), &run, &run.join("logs")).unwrap();
        assert_eq!(path, Some(run.join("logs/containers.log")));
    }

    #[test]
    fn test_subpath_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let run = run_dir(&dir);
        let setting = ContainerLogs::Path("logs/./extra/../containers.log".to_string());
        let path = resolve_destination(Some(&setting), &run, &run.join("logs")).unwrap();
        assert_eq!(path, Some(run.join("logs/containers.log")));
    }

    #[test]
    fn test_traversal_is_rejected_before_any_file_exists() {
        let dir = tempfile::tempdir().unwrap();
        let run = run_dir(&dir);
        let setting = ContainerLogs::Path("../../escape.log".to_string());

        let err = resolve_destination(Some(&setting), &run, &run.join("logs")).unwrap_err();
        assert!(matches!(err, RunnerError::PathEscape(_)));
        assert!(err.to_string().contains("inside artefacts directory"));
        assert!(!dir.path().join("escape.log").exists());
    }

    #[test]
    fn test_absolute_path_outside_run_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let run = run_dir(&dir);
        let outside = dir.path().join("elsewhere.log").to_string_lossy().to_string();
        let result = resolve_destination(Some(&ContainerLogs::Path(outside)), &run, &run.join("logs"));
        assert!(matches!(result, Err(RunnerError::PathEscape(_))));
    }

    #[test]
    fn test_sibling_prefix_is_not_inside() {
        let dir = tempfile::tempdir().unwrap();
        let run = run_dir(&dir);
        let setting = ContainerLogs::Path("../r1-other/containers.log".to_string());
        assert!(resolve_destination(Some(&setting), &run, &run.join("logs")).is_err());
    }

    #[tokio::test]
    async fn test_stop_without_start_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut capture = ContainerLogCapture::new(dir.path().join("containers.log"));
        capture.stop().await;
        capture.stop().await;
        assert_eq!(capture.active_streams(), 0);
        assert!(!capture.path().exists());
    }
}
