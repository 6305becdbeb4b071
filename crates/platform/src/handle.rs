//! Live container handles exposing `logs -f` streams

use async_trait::async_trait;
use std::io;
use std::pin::Pin;
use std::process::Stdio;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};
use tokio::process::{Child, ChildStdout, Command};

use itrun_common::{ContainerHandle, LogStream, PlatformError, PlatformResult};

use crate::runtime::ContainerRuntime;

/// A container started by [`crate::DockerPlatform`]
#[derive(Debug, Clone)]
pub struct DockerContainer {
    runtime: ContainerRuntime,
    id: String,
}

impl DockerContainer {
    pub fn new(runtime: ContainerRuntime, id: impl Into<String>) -> Self {
        Self {
            runtime,
            id: id.into(),
        }
    }
}

#[async_trait]
impl ContainerHandle for DockerContainer {
    fn id(&self) -> &str {
        &self.id
    }

    async fn open_logs(&self) -> Option<PlatformResult<LogStream>> {
        Some(ChildLogStream::follow(self.runtime, &self.id).map(|s| Box::new(s) as LogStream))
    }
}

/// stdout of a `logs -f` process. Dropping the stream kills the process.
struct ChildLogStream {
    _child: Child,
    stdout: ChildStdout,
}

impl ChildLogStream {
    fn follow(runtime: ContainerRuntime, id: &str) -> PlatformResult<Self> {
        // `sh` only merges stderr into stdout; the id is passed as $0, never interpolated
        let script = format!("exec {} logs -f \"$0\" 2>&1", runtime.command());
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(script)
            .arg(id)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PlatformError::LogStream(id.to_string()))?;

        Ok(Self { _child: child, stdout })
    }
}

impl AsyncRead for ChildLogStream {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        Pin::new(&mut this.stdout).poll_read(cx, buf)
    }
}
